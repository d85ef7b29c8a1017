//! High-level operations.
//!
//! This module contains the implementation of kiln commands.

pub mod compile_commands;
pub mod generate;
pub mod inspect;
pub mod project;

pub use compile_commands::{compile_commands, write_compile_commands, CompileCommand};
pub use generate::{generate, GenerateOptions, GenerateReport};
pub use inspect::{
    format_target_flags, format_toolchains, list_toolchains, target_flags, FlagsOptions,
    TargetFlags, ToolchainStatus,
};
pub use project::{Project, ProjectOptions};
