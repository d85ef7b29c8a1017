//! Command implementations

pub mod flags;
pub mod generate;
pub mod toolchains;
