//! Kiln - a native C/C++ build tool
//!
//! This crate provides the core library functionality for kiln:
//! toolchain discovery, usage-requirement propagation between targets,
//! and Ninja build graph generation.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

pub use builder::{BuildGraph, BuildOptions, Resolver, Synthesizer, Toolchain};
pub use core::{
    manifest::Manifest, registry::TargetRegistry, target::Target, BuildContext, BuildMode,
};
