//! Core data structures for kiln.
//!
//! This module contains the foundational types used throughout kiln:
//! - Build context (mode, language standards, version floors)
//! - Platforms, architectures and version gating
//! - Targets, the registry that holds them, and the manifest they come from

pub mod context;
pub mod errors;
pub mod manifest;
pub mod platform;
pub mod registry;
pub mod target;
pub mod version;

pub use context::{BuildContext, BuildMode, CStandard, CxxStandard, MinimumVersions, WarningLevel};
pub use errors::ResolveError;
pub use manifest::{find_manifest, Manifest, MANIFEST_NAME};
pub use platform::{Architecture, Platform};
pub use registry::TargetRegistry;
pub use target::{DeclaredSurface, Define, Language, Target, TargetKind, Visibility};
pub use version::{meets_minimum, parse_version_lenient, Version};
