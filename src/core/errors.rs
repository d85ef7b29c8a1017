//! Target resolution errors.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::target::TargetKind;

/// Error while turning declared targets into resolved build options.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum ResolveError {
    #[error("target `{target}` depends on `{dependency}`, which is not defined")]
    #[diagnostic(
        code(kiln::resolve::unknown_dependency),
        help("declare a target named `{dependency}` in Kiln.toml or remove it from `{target}`")
    )]
    UnknownDependency { target: String, dependency: String },

    #[error("dependency cycle detected: {}", .path.join(" -> "))]
    #[diagnostic(
        code(kiln::resolve::cycle),
        help("targets cannot depend on themselves, directly or through other targets")
    )]
    Cycle { path: Vec<String> },

    #[error("target `{target}` is a {kind} and cannot be used as {operation}")]
    #[diagnostic(code(kiln::resolve::incompatible_kind))]
    IncompatibleKind {
        target: String,
        kind: TargetKind,
        operation: &'static str,
    },

    #[error("{kind} target `{target}` has no source files")]
    #[diagnostic(
        code(kiln::resolve::no_sources),
        help("add source files to `{target}` or make it a header-only target")
    )]
    NoSources { target: String, kind: TargetKind },

    #[error("imported target `{target}` has no artifact path")]
    #[diagnostic(
        code(kiln::resolve::missing_imported_artifact),
        help("set `path` on `{target}` to the prebuilt library")
    )]
    MissingImportedArtifact { target: String },

    #[error("no target named `{name}`")]
    #[diagnostic(
        code(kiln::resolve::unknown_target),
        help("run `kiln flags` with one of the targets declared in Kiln.toml")
    )]
    UnknownTarget { name: String },

    #[error("target `{name}` is defined more than once")]
    #[diagnostic(code(kiln::resolve::duplicate_target))]
    DuplicateTarget { name: String },
}

impl ResolveError {
    /// The target the error should be reported against.
    pub fn target(&self) -> &str {
        match self {
            ResolveError::UnknownDependency { target, .. }
            | ResolveError::IncompatibleKind { target, .. }
            | ResolveError::NoSources { target, .. }
            | ResolveError::MissingImportedArtifact { target } => target,
            ResolveError::Cycle { path } => path.first().map(String::as_str).unwrap_or(""),
            ResolveError::UnknownTarget { name } | ResolveError::DuplicateTarget { name } => name,
        }
    }
}
