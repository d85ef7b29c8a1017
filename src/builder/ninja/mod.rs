//! Ninja build file generation.
//!
//! [`Synthesizer`] turns resolved [`BuildOptions`](crate::builder::options::BuildOptions)
//! into rules and edges of a [`BuildGraph`], which renders itself as
//! `build.ninja` text.

pub mod graph;
pub mod synth;
pub mod writer;

pub use graph::{BuildEdge, BuildGraph, Rule, SynthesisError};
pub use synth::{LinkKind, Synthesizer};
pub use writer::{escape_path, quote_arg};

/// File name of the generated build description inside the build dir.
pub const NINJA_FILE: &str = "build.ninja";
