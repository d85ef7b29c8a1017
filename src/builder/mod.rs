//! C/C++ build graph generation.
//!
//! This module models compiler toolchains, resolves targets against one
//! of them, and writes the result as a Ninja build file.

pub mod header_probe;
pub mod ninja;
pub mod options;
pub mod toolchain;

pub use header_probe::HeaderCache;
pub use ninja::{BuildEdge, BuildGraph, Rule, SynthesisError, Synthesizer};
pub use options::{BuildOptions, Library, OutputLayout, ResolvedSurface, Resolver};
pub use toolchain::{
    discover_system_toolchains, select_toolchain, DiscoveryError, HostProbe, Installation,
    SystemProbe, Toolchain, ToolchainFamily,
};
