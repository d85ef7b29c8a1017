//! `Kiln.toml` parsing.
//!
//! ```toml
//! [project]
//! name = "demo"
//!
//! [[target]]
//! name = "core"
//! kind = "static-library"
//! sources = ["src/core/*.cpp"]
//! public.include_dirs = ["include"]
//!
//! [[target]]
//! name = "app"
//! sources = ["src/main.cpp"]
//! private.dependencies = ["core"]
//! ```
//!
//! Paths in the manifest are relative to the project root. When a
//! registry is built, every path is rewritten relative to the build
//! directory, which is where Ninja runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::registry::TargetRegistry;
use crate::core::target::{DeclaredSurface, Define, Language, Target, TargetKind};
use crate::util::fs::{glob_files, relative_path};

pub const MANIFEST_NAME: &str = "Kiln.toml";

/// Parsed project manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub project: ProjectMeta,
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetManifest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectMeta {
    pub name: Option<String>,
    /// Build directory, relative to the project root.
    pub build_dir: Option<PathBuf>,
}

/// A `[[target]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: TargetKind,
    #[serde(default)]
    pub language: Language,
    /// Private source patterns; shorthand for `private.sources`.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub public: SurfaceManifest,
    #[serde(default)]
    pub private: SurfaceManifest,
    /// Prebuilt artifact for imported kinds.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// One visibility section of a target table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SurfaceManifest {
    pub dependencies: Vec<String>,
    /// Glob patterns.
    pub sources: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    pub defines: Vec<Define>,
    pub flags: Vec<String>,
    pub libraries: Vec<String>,
    pub library_dirs: Vec<PathBuf>,
}

impl Manifest {
    /// Load a manifest from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Expand source globs under `root` and build a registry whose paths
    /// are relative to `build_dir`.
    pub fn to_registry(&self, root: &Path, build_dir: &Path) -> Result<TargetRegistry> {
        let mut registry = TargetRegistry::new();
        for tm in &self.targets {
            let target = tm
                .to_target(root, build_dir)
                .with_context(|| format!("invalid target `{}`", tm.name))?;
            registry.insert(target)?;
        }
        Ok(registry)
    }
}

impl TargetManifest {
    fn to_target(&self, root: &Path, build_dir: &Path) -> Result<Target> {
        let mut private = self.private.to_surface(root, build_dir)?;
        let own_sources: Vec<PathBuf> = glob_files(root, &self.sources)?
            .iter()
            .map(|p| relative_path(build_dir, p))
            .collect();
        // Top-level `sources` come first; they are the common case.
        private.sources.splice(0..0, own_sources);

        Ok(Target {
            name: self.name.clone(),
            description: self.description.clone(),
            kind: self.kind,
            language: self.language,
            public: self.public.to_surface(root, build_dir)?,
            private,
            imported_path: self
                .path
                .as_ref()
                .map(|p| relative_path(build_dir, &root.join(p))),
        })
    }
}

impl SurfaceManifest {
    fn to_surface(&self, root: &Path, build_dir: &Path) -> Result<DeclaredSurface> {
        let rebase = |p: &PathBuf| relative_path(build_dir, &root.join(p));
        Ok(DeclaredSurface {
            dependencies: self.dependencies.clone(),
            sources: glob_files(root, &self.sources)?
                .iter()
                .map(|p| relative_path(build_dir, p))
                .collect(),
            include_dirs: self.include_dirs.iter().map(rebase).collect(),
            defines: self.defines.clone(),
            flags: self.flags.clone(),
            libraries: self.libraries.clone(),
            library_dirs: self.library_dirs.iter().map(rebase).collect(),
        })
    }
}

/// Find `Kiln.toml` in `start` or any parent directory.
pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(MANIFEST_NAME))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
[project]
name = "demo"

[[target]]
name = "core"
kind = "static-library"
sources = ["src/core/*.cpp"]
public.include_dirs = ["include"]
public.defines = ["CORE_DEFINE", { name = "CORE_LEVEL", value = "2" }]

[[target]]
name = "app"
sources = ["src/main.cpp"]
private.dependencies = ["core"]
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.project.name.as_deref(), Some("demo"));
        assert_eq!(manifest.targets.len(), 2);
        assert_eq!(manifest.targets[0].kind, TargetKind::StaticLibrary);
        assert_eq!(manifest.targets[1].kind, TargetKind::Binary);
        assert_eq!(
            manifest.targets[0].public.defines[1],
            Define::key_value("CORE_LEVEL", "2")
        );
    }

    #[test]
    fn test_to_registry_rebases_paths() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("src/core")).unwrap();
        std::fs::write(root.join("src/core/a.cpp"), "").unwrap();
        std::fs::write(root.join("src/core/b.cpp"), "").unwrap();
        std::fs::write(root.join("src/main.cpp"), "").unwrap();

        let manifest = Manifest::parse(MANIFEST).unwrap();
        let registry = manifest.to_registry(root, &root.join("build")).unwrap();

        let core = registry.get("core").unwrap();
        assert_eq!(
            core.private.sources,
            vec![
                PathBuf::from("../src/core/a.cpp"),
                PathBuf::from("../src/core/b.cpp")
            ]
        );
        assert_eq!(core.public.include_dirs, vec![PathBuf::from("../include")]);

        let app = registry.get("app").unwrap();
        assert_eq!(app.private.dependencies, vec!["core".to_string()]);
    }

    #[test]
    fn test_duplicate_target_is_rejected() {
        let manifest = Manifest::parse(
            r#"
[[target]]
name = "x"
[[target]]
name = "x"
"#,
        )
        .unwrap();
        let tmp = TempDir::new().unwrap();
        assert!(manifest.to_registry(tmp.path(), tmp.path()).is_err());
    }

    #[test]
    fn test_find_manifest_walks_up() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_NAME), "").unwrap();
        let nested = tmp.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(
            find_manifest(&nested),
            Some(tmp.path().join(MANIFEST_NAME))
        );
    }
}
