//! Shared utilities

pub mod config;
pub mod fs;
pub mod ordered;
pub mod process;

pub use config::Config;
pub use ordered::UniqueVec;
