//! Target definitions.
//!
//! A target is one buildable (or importable) unit: an executable, a
//! library, or a header-only bundle. It declares a public surface that
//! propagates to its dependents and a private surface that does not.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Kind of target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    /// Executable binary
    #[default]
    #[serde(alias = "bin", alias = "exe", alias = "executable")]
    Binary,
    /// Headers and usage requirements only; nothing is compiled
    #[serde(alias = "header")]
    HeaderOnly,
    /// Static library archive (.a / .lib)
    #[serde(alias = "static", alias = "staticlib")]
    StaticLibrary,
    /// Shared library linked by consumers (.so / .dylib / .dll + import lib)
    #[serde(alias = "shared", alias = "sharedlib")]
    SharedLibrary,
    /// Shared library loaded at runtime; never on a consumer's link line
    #[serde(alias = "dynamic", alias = "plugin")]
    DynamicLibrary,
    /// Prebuilt static library
    ImportedStaticLibrary,
    /// Prebuilt shared library (or its import library)
    ImportedSharedLibrary,
    /// Prebuilt runtime-loaded library
    ImportedDynamicLibrary,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Binary => "binary",
            TargetKind::HeaderOnly => "header-only",
            TargetKind::StaticLibrary => "static-library",
            TargetKind::SharedLibrary => "shared-library",
            TargetKind::DynamicLibrary => "dynamic-library",
            TargetKind::ImportedStaticLibrary => "imported-static-library",
            TargetKind::ImportedSharedLibrary => "imported-shared-library",
            TargetKind::ImportedDynamicLibrary => "imported-dynamic-library",
        }
    }

    /// Whether kiln compiles and links/archives this target itself.
    pub fn is_buildable(&self) -> bool {
        matches!(
            self,
            TargetKind::Binary
                | TargetKind::StaticLibrary
                | TargetKind::SharedLibrary
                | TargetKind::DynamicLibrary
        )
    }

    pub fn is_imported(&self) -> bool {
        matches!(
            self,
            TargetKind::ImportedStaticLibrary
                | TargetKind::ImportedSharedLibrary
                | TargetKind::ImportedDynamicLibrary
        )
    }

    /// Whether consumers pass this target's artifact to their linker.
    pub fn is_linkable(&self) -> bool {
        matches!(
            self,
            TargetKind::StaticLibrary
                | TargetKind::SharedLibrary
                | TargetKind::ImportedStaticLibrary
                | TargetKind::ImportedSharedLibrary
        )
    }

    /// Whether this target is only needed next to the consumer at runtime.
    pub fn is_runtime_only(&self) -> bool {
        matches!(
            self,
            TargetKind::DynamicLibrary | TargetKind::ImportedDynamicLibrary
        )
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source language of a target or a single source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    #[default]
    #[serde(alias = "cpp", alias = "cxx", alias = "c++")]
    Cxx,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
        }
    }

    /// Language of a source file, judged by extension. `None` for
    /// extensions neither compiler claims; the owning target's language
    /// decides those.
    pub fn for_source(path: &Path) -> Option<Language> {
        match path.extension().and_then(|e| e.to_str())? {
            "c" => Some(Language::C),
            "cc" | "cpp" | "cxx" | "c++" | "C" | "cp" | "CPP" | "ixx" | "cppm" => {
                Some(Language::Cxx)
            }
            _ => None,
        }
    }
}

/// A preprocessor define.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Define {
    /// Simple flag: FOO
    Flag(String),
    /// Key-value: FOO=bar
    KeyValue { name: String, value: String },
}

impl Define {
    pub fn flag(name: impl Into<String>) -> Self {
        Define::Flag(name.into())
    }

    pub fn key_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Define::KeyValue {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Render with a family-specific prefix (`-D` or `/D`).
    pub fn render(&self, prefix: &str) -> String {
        match self {
            Define::Flag(name) => format!("{}{}", prefix, name),
            Define::KeyValue { name, value } => format!("{}{}={}", prefix, name, value),
        }
    }
}

impl From<&str> for Define {
    fn from(s: &str) -> Self {
        Define::Flag(s.to_string())
    }
}

/// Visibility of a declared requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Propagates to dependents
    Public,
    /// Internal only
    Private,
}

/// The requirements a target declares at one visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclaredSurface {
    pub dependencies: Vec<String>,
    pub sources: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub defines: Vec<Define>,
    pub flags: Vec<String>,
    /// System or external libraries, by name (`pthread`) or path.
    pub libraries: Vec<String>,
    pub library_dirs: Vec<PathBuf>,
}

impl DeclaredSurface {
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
            && self.sources.is_empty()
            && self.include_dirs.is_empty()
            && self.defines.is_empty()
            && self.flags.is_empty()
            && self.libraries.is_empty()
            && self.library_dirs.is_empty()
    }
}

/// A named build target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: TargetKind,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub public: DeclaredSurface,
    #[serde(default)]
    pub private: DeclaredSurface,
    /// Location of the prebuilt artifact for imported kinds.
    #[serde(default)]
    pub imported_path: Option<PathBuf>,
}

impl Target {
    pub fn new(name: impl Into<String>, kind: TargetKind) -> Self {
        Target {
            name: name.into(),
            description: String::new(),
            kind,
            language: Language::default(),
            public: DeclaredSurface::default(),
            private: DeclaredSurface::default(),
            imported_path: None,
        }
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, TargetKind::Binary)
    }

    pub fn static_library(name: impl Into<String>) -> Self {
        Self::new(name, TargetKind::StaticLibrary)
    }

    pub fn shared_library(name: impl Into<String>) -> Self {
        Self::new(name, TargetKind::SharedLibrary)
    }

    pub fn dynamic_library(name: impl Into<String>) -> Self {
        Self::new(name, TargetKind::DynamicLibrary)
    }

    pub fn header_only(name: impl Into<String>) -> Self {
        Self::new(name, TargetKind::HeaderOnly)
    }

    /// A prebuilt library found at `path`.
    pub fn imported(name: impl Into<String>, kind: TargetKind, path: impl Into<PathBuf>) -> Self {
        let mut target = Self::new(name, kind);
        target.imported_path = Some(path.into());
        target
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Add private source files.
    pub fn with_sources(mut self, sources: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.private
            .sources
            .extend(sources.into_iter().map(Into::into));
        self
    }

    /// Add interface sources, compiled into every consumer.
    pub fn with_public_sources(
        mut self,
        sources: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        self.public
            .sources
            .extend(sources.into_iter().map(Into::into));
        self
    }

    pub fn public_dep(mut self, name: impl Into<String>) -> Self {
        self.public.dependencies.push(name.into());
        self
    }

    pub fn private_dep(mut self, name: impl Into<String>) -> Self {
        self.private.dependencies.push(name.into());
        self
    }

    pub fn public_include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.public.include_dirs.push(dir.into());
        self
    }

    pub fn private_include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.private.include_dirs.push(dir.into());
        self
    }

    pub fn public_define(mut self, define: impl Into<Define>) -> Self {
        self.public.defines.push(define.into());
        self
    }

    pub fn private_define(mut self, define: impl Into<Define>) -> Self {
        self.private.defines.push(define.into());
        self
    }

    pub fn public_flag(mut self, flag: impl Into<String>) -> Self {
        self.public.flags.push(flag.into());
        self
    }

    pub fn private_flag(mut self, flag: impl Into<String>) -> Self {
        self.private.flags.push(flag.into());
        self
    }

    pub fn public_library(mut self, lib: impl Into<String>) -> Self {
        self.public.libraries.push(lib.into());
        self
    }

    pub fn private_library(mut self, lib: impl Into<String>) -> Self {
        self.private.libraries.push(lib.into());
        self
    }

    pub fn surface(&self, visibility: Visibility) -> &DeclaredSurface {
        match visibility {
            Visibility::Public => &self.public,
            Visibility::Private => &self.private,
        }
    }

    /// All direct dependencies, public first, in declaration order.
    pub fn dependencies(&self) -> impl Iterator<Item = (&str, Visibility)> {
        self.public
            .dependencies
            .iter()
            .map(|d| (d.as_str(), Visibility::Public))
            .chain(
                self.private
                    .dependencies
                    .iter()
                    .map(|d| (d.as_str(), Visibility::Private)),
            )
    }

    /// Whether any source file is declared at either visibility.
    pub fn has_sources(&self) -> bool {
        !self.public.sources.is_empty() || !self.private.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(TargetKind::StaticLibrary.is_linkable());
        assert!(TargetKind::ImportedSharedLibrary.is_linkable());
        assert!(!TargetKind::DynamicLibrary.is_linkable());
        assert!(TargetKind::DynamicLibrary.is_runtime_only());
        assert!(!TargetKind::HeaderOnly.is_buildable());
        assert!(TargetKind::ImportedStaticLibrary.is_imported());
    }

    #[test]
    fn test_kind_deserialize_aliases() {
        #[derive(Deserialize)]
        struct Holder {
            kind: TargetKind,
        }
        let h: Holder = toml::from_str(r#"kind = "static""#).unwrap();
        assert_eq!(h.kind, TargetKind::StaticLibrary);
        let h: Holder = toml::from_str(r#"kind = "imported-shared-library""#).unwrap();
        assert_eq!(h.kind, TargetKind::ImportedSharedLibrary);
    }

    #[test]
    fn test_language_for_source() {
        assert_eq!(Language::for_source(Path::new("a/b.c")), Some(Language::C));
        assert_eq!(Language::for_source(Path::new("a/b.cpp")), Some(Language::Cxx));
        assert_eq!(Language::for_source(Path::new("a/b.cc")), Some(Language::Cxx));
        assert_eq!(Language::for_source(Path::new("a/b.inc")), None);
        assert_eq!(Language::for_source(Path::new("a/Makefile")), None);
    }

    #[test]
    fn test_define_render() {
        assert_eq!(Define::flag("FOO").render("-D"), "-DFOO");
        assert_eq!(Define::key_value("N", "1").render("/D"), "/DN=1");
    }

    #[test]
    fn test_target_builder() {
        let target = Target::binary("app")
            .with_sources(["src/main.cpp"])
            .public_dep("core")
            .private_dep("util")
            .private_define("APP_INTERNAL");

        assert_eq!(target.kind, TargetKind::Binary);
        assert!(target.has_sources());
        let deps: Vec<_> = target.dependencies().collect();
        assert_eq!(
            deps,
            vec![("core", Visibility::Public), ("util", Visibility::Private)]
        );
        assert!(target.public.defines.is_empty());
    }
}
