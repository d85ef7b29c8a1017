//! Target resolution: from declared targets to `BuildOptions`.
//!
//! Propagation follows one law. For a target T with direct dependencies D:
//!
//! - `PUBLIC(T)  = declared_public(T)  ∪ ⋃ PUBLIC(d) for public d`
//! - `PRIVATE(T) = declared_private(T) ∪ ⋃ PUBLIC(d) for every d`
//!
//! A dependency's private surface never reaches its consumers. Linkable
//! dependencies additionally export their own artifact, so a consumer's
//! link line picks up every library it transitively needs through public
//! edges.
//!
//! Unions keep first-seen order (own items, then public dependencies,
//! then private dependencies, each in declaration order), which makes
//! the resulting command lines deterministic. Libraries keep their last
//! occurrence instead, and a target's own artifact precedes the libraries
//! it re-exports, so every archive on a link line comes before the
//! archives it needs.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rayon::prelude::*;
use tracing::debug;

use crate::builder::toolchain::Toolchain;
use crate::core::context::{BuildContext, BuildMode};
use crate::core::errors::ResolveError;
use crate::core::platform::{Architecture, Platform};
use crate::core::registry::TargetRegistry;
use crate::core::target::{DeclaredSurface, Define, Language, Target, TargetKind};
use crate::util::ordered::UniqueVec;

/// A library on (or beside) a consumer's link line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Library {
    /// System or external library by name or path (`pthread`, `ws2_32`).
    System(String),
    /// Artifact of another target, passed to the linker by path.
    Artifact { target: String, path: PathBuf },
    /// Runtime-loaded library; must exist before the consumer links but is
    /// never passed to the linker.
    Runtime { target: String, path: PathBuf },
}

impl Library {
    pub fn is_runtime(&self) -> bool {
        matches!(self, Library::Runtime { .. })
    }
}

/// Merged requirements at one visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSurface {
    pub sources: UniqueVec<PathBuf>,
    pub include_dirs: UniqueVec<PathBuf>,
    pub defines: UniqueVec<Define>,
    pub flags: UniqueVec<String>,
    pub libraries: UniqueVec<Library>,
    pub library_dirs: UniqueVec<PathBuf>,
}

impl ResolvedSurface {
    fn from_declared(declared: &DeclaredSurface) -> Self {
        ResolvedSurface {
            sources: declared.sources.iter().cloned().collect(),
            include_dirs: declared.include_dirs.iter().cloned().collect(),
            defines: declared.defines.iter().cloned().collect(),
            flags: declared.flags.iter().cloned().collect(),
            libraries: declared
                .libraries
                .iter()
                .cloned()
                .map(Library::System)
                .collect(),
            library_dirs: declared.library_dirs.iter().cloned().collect(),
        }
    }

    /// Union `other` into `self`, keeping first-seen order.
    fn absorb(&mut self, other: &ResolvedSurface) {
        self.sources.extend_from(other.sources.iter().cloned());
        self.include_dirs.extend_from(other.include_dirs.iter().cloned());
        self.defines.extend_from(other.defines.iter().cloned());
        self.flags.extend_from(other.flags.iter().cloned());
        self.libraries.extend_last(other.libraries.iter().cloned());
        self.library_dirs.extend_from(other.library_dirs.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
            && self.include_dirs.is_empty()
            && self.defines.is_empty()
            && self.flags.is_empty()
            && self.libraries.is_empty()
            && self.library_dirs.is_empty()
    }
}

/// Where build outputs go, relative to the build directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub obj_dir: PathBuf,
    pub lib_dir: PathBuf,
    pub bin_dir: PathBuf,
}

impl Default for OutputLayout {
    fn default() -> Self {
        OutputLayout {
            obj_dir: PathBuf::from("obj"),
            lib_dir: PathBuf::from("lib"),
            bin_dir: PathBuf::from("bin"),
        }
    }
}

impl OutputLayout {
    /// `obj/<target>/<source>.<ext>`
    pub fn object_path(&self, toolchain: &Toolchain, target: &str, source: &Path) -> PathBuf {
        self.obj_dir.join(target).join(toolchain.object_name(source))
    }

    /// Primary artifact of a buildable target.
    pub fn artifact_path(
        &self,
        toolchain: &Toolchain,
        kind: TargetKind,
        name: &str,
    ) -> Option<PathBuf> {
        let file = toolchain.artifact_name(kind, name)?;
        let dir = match kind {
            TargetKind::StaticLibrary => &self.lib_dir,
            _ => &self.bin_dir,
        };
        Some(dir.join(file))
    }

    /// Import library of a shared library, where the platform has them.
    pub fn import_library_path(
        &self,
        toolchain: &Toolchain,
        kind: TargetKind,
        name: &str,
    ) -> Option<PathBuf> {
        if !matches!(kind, TargetKind::SharedLibrary | TargetKind::DynamicLibrary) {
            return None;
        }
        toolchain
            .import_library_name(name)
            .map(|file| self.lib_dir.join(file))
    }
}

/// Fully resolved compile and link inputs for one target.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub target: String,
    pub kind: TargetKind,
    pub language: Language,
    pub toolchain: Arc<Toolchain>,
    pub platform: Platform,
    pub arch: Architecture,
    pub mode: BuildMode,
    pub sources: UniqueVec<PathBuf>,
    /// Primary artifact first, then any import library.
    pub outputs: UniqueVec<PathBuf>,
    pub public: ResolvedSurface,
    pub private: ResolvedSurface,
}

impl BuildOptions {
    pub fn primary_output(&self) -> Option<&Path> {
        self.outputs.first().map(PathBuf::as_path)
    }

    /// Import library written by the link step, if any.
    pub fn import_library(&self) -> Option<&Path> {
        self.outputs.get(1).map(PathBuf::as_path)
    }

    pub fn compile_include_dirs(&self) -> UniqueVec<PathBuf> {
        self.private
            .include_dirs
            .iter()
            .chain(self.public.include_dirs.iter())
            .cloned()
            .collect()
    }

    pub fn compile_defines(&self) -> UniqueVec<Define> {
        self.private
            .defines
            .iter()
            .chain(self.public.defines.iter())
            .cloned()
            .collect()
    }

    pub fn compile_flags(&self) -> UniqueVec<String> {
        self.private
            .flags
            .iter()
            .chain(self.public.flags.iter())
            .cloned()
            .collect()
    }

    /// Libraries contributed by targets (own and transitive), excluding
    /// runtime-only entries.
    pub fn resolved_libraries(&self) -> UniqueVec<Library> {
        let mut libraries = UniqueVec::new();
        libraries.extend_last(
            self.private
                .libraries
                .iter()
                .chain(self.public.libraries.iter())
                .filter(|lib| !lib.is_runtime())
                .cloned(),
        );
        libraries
    }

    /// Everything the link step passes to the linker: resolved libraries,
    /// then this mode's runtime libraries, then toolchain base libraries.
    pub fn link_libraries(&self) -> UniqueVec<Library> {
        let tc = &self.toolchain;
        let mut libraries = self.resolved_libraries();
        libraries.extend_last(
            tc.mode_libraries
                .get(self.mode)
                .iter()
                .chain(tc.libraries.iter())
                .cloned()
                .map(Library::System),
        );
        libraries
    }

    pub fn link_library_dirs(&self) -> UniqueVec<PathBuf> {
        self.private
            .library_dirs
            .iter()
            .chain(self.public.library_dirs.iter())
            .cloned()
            .collect()
    }

    /// Paths of dependency artifacts the link step reads.
    pub fn link_inputs(&self) -> Vec<PathBuf> {
        self.resolved_libraries()
            .into_iter()
            .filter_map(|lib| match lib {
                Library::Artifact { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Runtime-only libraries that must be built before this target links.
    pub fn runtime_dependencies(&self) -> Vec<PathBuf> {
        self.private
            .libraries
            .iter()
            .chain(self.public.libraries.iter())
            .filter_map(|lib| match lib {
                Library::Runtime { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect::<UniqueVec<_>>()
            .into_vec()
    }

    /// Fail unless this target's kind is one of `allowed`.
    pub fn require_kind(
        &self,
        allowed: &[TargetKind],
        operation: &'static str,
    ) -> Result<(), ResolveError> {
        if allowed.contains(&self.kind) {
            Ok(())
        } else {
            Err(ResolveError::IncompatibleKind {
                target: self.target.clone(),
                kind: self.kind,
                operation,
            })
        }
    }
}

/// Per-target result shared between resolutions.
#[derive(Debug)]
struct ResolvedNode {
    public: ResolvedSurface,
    private: ResolvedSurface,
    /// What consumers absorb: `public` plus this target's own artifact.
    exported: ResolvedSurface,
    outputs: UniqueVec<PathBuf>,
}

/// Depth-first walk state for one resolution.
#[derive(Default)]
struct Walk {
    stack: Vec<String>,
    on_stack: HashSet<String>,
}

/// Resolves targets of one registry against one toolchain and mode.
///
/// Results are memoised, so resolving many targets that share
/// dependencies visits each dependency once. The memo is behind a lock,
/// which lets [`Resolver::resolve_all`] work in parallel.
pub struct Resolver<'a> {
    registry: &'a TargetRegistry,
    toolchain: Arc<Toolchain>,
    mode: BuildMode,
    layout: OutputLayout,
    memo: RwLock<HashMap<String, Arc<ResolvedNode>>>,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a TargetRegistry, toolchain: Arc<Toolchain>, ctx: &BuildContext) -> Self {
        Resolver {
            registry,
            toolchain,
            mode: ctx.mode,
            layout: OutputLayout::default(),
            memo: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn registry(&self) -> &'a TargetRegistry {
        self.registry
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn toolchain(&self) -> &Arc<Toolchain> {
        &self.toolchain
    }

    /// Resolve one target by name.
    pub fn resolve(&self, name: &str) -> Result<BuildOptions, ResolveError> {
        let mut walk = Walk::default();
        let node = self.visit(name, None, &mut walk)?;
        let target = self
            .registry
            .get(name)
            .ok_or_else(|| ResolveError::UnknownTarget {
                name: name.to_string(),
            })?;

        let mut sources = UniqueVec::new();
        sources.extend_from(node.private.sources.iter().cloned());
        sources.extend_from(node.public.sources.iter().cloned());

        debug!(
            "resolved `{}`: {} source(s), {} include dir(s), {} librar(ies)",
            name,
            sources.len(),
            node.private.include_dirs.len() + node.public.include_dirs.len(),
            node.private.libraries.len() + node.public.libraries.len()
        );

        Ok(BuildOptions {
            target: target.name.clone(),
            kind: target.kind,
            language: target.language,
            toolchain: Arc::clone(&self.toolchain),
            platform: self.toolchain.platform,
            arch: self.toolchain.arch,
            mode: self.mode,
            sources,
            outputs: node.outputs.clone(),
            public: node.public.clone(),
            private: node.private.clone(),
        })
    }

    /// Resolve several targets in parallel. Each result is independent:
    /// one target failing does not affect the others.
    pub fn resolve_all<S>(&self, names: &[S]) -> Vec<(String, Result<BuildOptions, ResolveError>)>
    where
        S: AsRef<str> + Sync,
    {
        names
            .par_iter()
            .map(|name| (name.as_ref().to_string(), self.resolve(name.as_ref())))
            .collect()
    }

    fn visit(
        &self,
        name: &str,
        referrer: Option<&str>,
        walk: &mut Walk,
    ) -> Result<Arc<ResolvedNode>, ResolveError> {
        if walk.on_stack.contains(name) {
            let start = walk.stack.iter().position(|n| n == name).unwrap_or(0);
            let mut path = walk.stack[start..].to_vec();
            path.push(name.to_string());
            return Err(ResolveError::Cycle { path });
        }

        if let Some(node) = self.cached(name) {
            return Ok(node);
        }

        let target = self.registry.get(name).ok_or_else(|| match referrer {
            Some(referrer) => ResolveError::UnknownDependency {
                target: referrer.to_string(),
                dependency: name.to_string(),
            },
            None => ResolveError::UnknownTarget {
                name: name.to_string(),
            },
        })?;
        self.check_target(target)?;

        walk.stack.push(name.to_string());
        walk.on_stack.insert(name.to_string());
        let merged = self.merge_dependencies(target, walk);
        walk.stack.pop();
        walk.on_stack.remove(name);
        let (public, private) = merged?;

        let outputs = self.outputs_of(target);
        let mut exported = public.clone();
        if let Some(own) = self.own_library(target, &outputs) {
            let mut libraries = UniqueVec::new();
            libraries.push(own);
            libraries.extend_last(public.libraries.iter().cloned());
            exported.libraries = libraries;
        }

        let node = Arc::new(ResolvedNode {
            public,
            private,
            exported,
            outputs,
        });

        let mut memo = self
            .memo
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Another thread may have finished first; keep one canonical node.
        Ok(Arc::clone(
            memo.entry(name.to_string()).or_insert(node),
        ))
    }

    fn cached(&self, name: &str) -> Option<Arc<ResolvedNode>> {
        let memo = self
            .memo
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        memo.get(name).cloned()
    }

    fn merge_dependencies(
        &self,
        target: &Target,
        walk: &mut Walk,
    ) -> Result<(ResolvedSurface, ResolvedSurface), ResolveError> {
        let mut public = ResolvedSurface::from_declared(&target.public);
        let mut private = ResolvedSurface::from_declared(&target.private);

        for dep in &target.public.dependencies {
            let node = self.visit(dep, Some(&target.name), walk)?;
            public.absorb(&node.exported);
            private.absorb(&node.exported);
        }
        for dep in &target.private.dependencies {
            let node = self.visit(dep, Some(&target.name), walk)?;
            private.absorb(&node.exported);
        }

        Ok((public, private))
    }

    fn check_target(&self, target: &Target) -> Result<(), ResolveError> {
        if target.kind.is_buildable() && !target.has_sources() {
            return Err(ResolveError::NoSources {
                target: target.name.clone(),
                kind: target.kind,
            });
        }
        if target.kind.is_imported() && target.imported_path.is_none() {
            return Err(ResolveError::MissingImportedArtifact {
                target: target.name.clone(),
            });
        }
        Ok(())
    }

    fn outputs_of(&self, target: &Target) -> UniqueVec<PathBuf> {
        let mut outputs = UniqueVec::new();
        if target.kind.is_imported() {
            outputs.extend_from(target.imported_path.iter().cloned());
            return outputs;
        }
        let tc = &self.toolchain;
        outputs.extend_from(self.layout.artifact_path(tc, target.kind, &target.name));
        outputs.extend_from(
            self.layout
                .import_library_path(tc, target.kind, &target.name),
        );
        outputs
    }

    /// The library entry consumers of `target` receive.
    fn own_library(&self, target: &Target, outputs: &UniqueVec<PathBuf>) -> Option<Library> {
        let path = match target.kind {
            // Consumers link against the import library where there is one.
            TargetKind::SharedLibrary => outputs.last(),
            _ => outputs.first(),
        }?
        .clone();
        let kind = target.kind;
        let target = target.name.clone();
        if kind.is_runtime_only() {
            Some(Library::Runtime { target, path })
        } else if kind.is_linkable() {
            Some(Library::Artifact { target, path })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::test_fixtures::{clang_install, msvc_install};
    use crate::builder::toolchain::{clang_toolchain, msvc_toolchain};

    fn linux() -> Arc<Toolchain> {
        Arc::new(clang_toolchain(
            &clang_install(Platform::Linux),
            &BuildContext::default(),
        ))
    }

    fn registry(targets: Vec<Target>) -> TargetRegistry {
        TargetRegistry::from_targets(targets).unwrap()
    }

    #[test]
    fn test_private_items_do_not_leak() {
        let reg = registry(vec![
            Target::static_library("lib")
                .with_sources(["lib.cpp"])
                .public_include("lib/include")
                .private_include("lib/src")
                .private_define("LIB_INTERNAL"),
            Target::binary("app").with_sources(["main.cpp"]).private_dep("lib"),
        ]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        let app = resolver.resolve("app").unwrap();

        let includes = app.compile_include_dirs();
        assert!(includes.contains(&PathBuf::from("lib/include")));
        assert!(!includes.contains(&PathBuf::from("lib/src")));
        assert!(!app.compile_defines().contains(&Define::flag("LIB_INTERNAL")));
        assert!(app.public.is_empty());
    }

    #[test]
    fn test_public_chain_propagates() {
        let reg = registry(vec![
            Target::header_only("a").public_define("A"),
            Target::header_only("b").public_dep("a").public_define("B"),
            Target::static_library("c")
                .with_sources(["c.cpp"])
                .public_dep("b"),
        ]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        let c = resolver.resolve("c").unwrap();
        assert_eq!(
            c.public.defines.as_slice(),
            &[Define::flag("B"), Define::flag("A")]
        );
    }

    #[test]
    fn test_private_edge_stops_propagation() {
        let reg = registry(vec![
            Target::header_only("a").public_define("A"),
            Target::static_library("b")
                .with_sources(["b.cpp"])
                .private_dep("a"),
            Target::binary("app").with_sources(["m.cpp"]).private_dep("b"),
        ]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());

        let b = resolver.resolve("b").unwrap();
        assert!(b.private.defines.contains(&Define::flag("A")));
        assert!(!b.public.defines.contains(&Define::flag("A")));

        let app = resolver.resolve("app").unwrap();
        assert!(!app.compile_defines().contains(&Define::flag("A")));
        // b's artifact still reaches app's link line.
        assert_eq!(app.link_inputs(), vec![PathBuf::from("lib/libb.a")]);
    }

    #[test]
    fn test_diamond_is_deduplicated() {
        let reg = registry(vec![
            Target::header_only("base").public_include("base/include"),
            Target::header_only("left").public_dep("base"),
            Target::header_only("right").public_dep("base"),
            Target::binary("app")
                .with_sources(["m.cpp"])
                .private_dep("left")
                .private_dep("right"),
        ]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        let app = resolver.resolve("app").unwrap();
        assert_eq!(
            app.compile_include_dirs().as_slice(),
            &[PathBuf::from("base/include")]
        );
    }

    #[test]
    fn test_cycle_is_reported_with_path() {
        let reg = registry(vec![
            Target::static_library("a")
                .with_sources(["a.c"])
                .public_dep("b"),
            Target::static_library("b")
                .with_sources(["b.c"])
                .public_dep("a"),
        ]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        assert_eq!(
            resolver.resolve("a").unwrap_err(),
            ResolveError::Cycle {
                path: vec!["a".into(), "b".into(), "a".into()]
            }
        );
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let reg = registry(vec![Target::header_only("a").public_dep("a")]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        assert_eq!(
            resolver.resolve("a").unwrap_err(),
            ResolveError::Cycle {
                path: vec!["a".into(), "a".into()]
            }
        );
    }

    #[test]
    fn test_unknown_dependency_names_referrer() {
        let reg = registry(vec![Target::binary("app")
            .with_sources(["m.cpp"])
            .private_dep("ghost")]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        assert_eq!(
            resolver.resolve("app").unwrap_err(),
            ResolveError::UnknownDependency {
                target: "app".into(),
                dependency: "ghost".into()
            }
        );
        assert!(matches!(
            resolver.resolve("nope"),
            Err(ResolveError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn test_buildable_without_sources_fails() {
        let reg = registry(vec![
            Target::static_library("empty"),
            Target::binary("app").with_sources(["m.cpp"]).private_dep("empty"),
        ]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        assert!(matches!(
            resolver.resolve("app"),
            Err(ResolveError::NoSources { ref target, .. }) if target == "empty"
        ));
    }

    #[test]
    fn test_imported_library_needs_path() {
        let reg = registry(vec![Target::new("ext", TargetKind::ImportedStaticLibrary)]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        assert_eq!(
            resolver.resolve("ext").unwrap_err(),
            ResolveError::MissingImportedArtifact {
                target: "ext".into()
            }
        );
    }

    #[test]
    fn test_imported_library_is_linked() {
        let reg = registry(vec![
            Target::imported("zlib", TargetKind::ImportedStaticLibrary, "/opt/z/libz.a")
                .public_include("/opt/z/include"),
            Target::binary("app").with_sources(["m.c"]).private_dep("zlib"),
        ]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        let app = resolver.resolve("app").unwrap();
        assert_eq!(app.link_inputs(), vec![PathBuf::from("/opt/z/libz.a")]);
        assert!(app
            .compile_include_dirs()
            .contains(&PathBuf::from("/opt/z/include")));
    }

    #[test]
    fn test_dynamic_library_is_runtime_only() {
        let reg = registry(vec![
            Target::dynamic_library("plugin").with_sources(["p.cpp"]),
            Target::binary("app")
                .with_sources(["m.cpp"])
                .private_dep("plugin"),
        ]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        let app = resolver.resolve("app").unwrap();
        assert!(app.link_inputs().is_empty());
        assert_eq!(
            app.runtime_dependencies(),
            vec![PathBuf::from("bin/libplugin.so")]
        );
        assert!(!app.link_libraries().iter().any(Library::is_runtime));
    }

    #[test]
    fn test_msvc_shared_library_exports_import_lib() {
        let ctx = BuildContext::default();
        let tc = Arc::new(msvc_toolchain(&msvc_install(Architecture::X64), &ctx));
        let reg = registry(vec![
            Target::shared_library("core").with_sources(["core.cpp"]),
            Target::binary("app").with_sources(["m.cpp"]).private_dep("core"),
        ]);
        let resolver = Resolver::new(&reg, tc, &ctx);

        let core = resolver.resolve("core").unwrap();
        assert_eq!(core.primary_output(), Some(Path::new("bin/core.dll")));
        assert_eq!(core.import_library(), Some(Path::new("lib/core.lib")));

        let app = resolver.resolve("app").unwrap();
        assert_eq!(app.link_inputs(), vec![PathBuf::from("lib/core.lib")]);
    }

    #[test]
    fn test_link_libraries_order() {
        let ctx = BuildContext::default().with_mode(BuildMode::Release);
        let tc = Arc::new(msvc_toolchain(&msvc_install(Architecture::X64), &ctx));
        let reg = registry(vec![Target::binary("app")
            .with_sources(["m.cpp"])
            .private_library("ws2_32")]);
        let resolver = Resolver::new(&reg, tc, &ctx);
        let app = resolver.resolve("app").unwrap();

        let libs: Vec<Library> = app.link_libraries().into_vec();
        assert_eq!(libs[0], Library::System("ws2_32".into()));
        let position = |name: &str| {
            libs.iter()
                .position(|l| *l == Library::System(name.into()))
                .unwrap()
        };
        assert!(position("ucrt.lib") < position("kernel32"));
    }

    #[test]
    fn test_static_chain_links_dependents_first() {
        let reg = registry(vec![
            Target::static_library("util").with_sources(["util.c"]),
            Target::static_library("core")
                .with_sources(["core.c"])
                .public_dep("util"),
            Target::binary("app").with_sources(["main.c"]).private_dep("core"),
        ]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        let app = resolver.resolve("app").unwrap();
        assert_eq!(
            app.link_inputs(),
            vec![PathBuf::from("lib/libcore.a"), PathBuf::from("lib/libutil.a")]
        );

        // System libraries come after every archive that may need them.
        let libs = app.link_libraries().into_vec();
        let util = libs
            .iter()
            .position(|l| matches!(l, Library::Artifact { target, .. } if target == "util"))
            .unwrap();
        let pthread = libs
            .iter()
            .position(|l| *l == Library::System("pthread".into()))
            .unwrap();
        assert!(util < pthread);
    }

    #[test]
    fn test_shared_archive_moves_behind_its_users() {
        let reg = registry(vec![
            Target::static_library("util").with_sources(["util.c"]),
            Target::static_library("core")
                .with_sources(["core.c"])
                .public_dep("util"),
            Target::static_library("net")
                .with_sources(["net.c"])
                .public_dep("core")
                .public_library("ssl"),
            Target::binary("app")
                .with_sources(["main.c"])
                .private_dep("util")
                .private_dep("net"),
        ]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        let app = resolver.resolve("app").unwrap();
        assert_eq!(
            app.link_inputs(),
            vec![
                PathBuf::from("lib/libnet.a"),
                PathBuf::from("lib/libcore.a"),
                PathBuf::from("lib/libutil.a"),
            ]
        );
        let libs = app.resolved_libraries().into_vec();
        let net = libs
            .iter()
            .position(|l| matches!(l, Library::Artifact { target, .. } if target == "net"))
            .unwrap();
        let ssl = libs
            .iter()
            .position(|l| *l == Library::System("ssl".into()))
            .unwrap();
        assert!(net < ssl);
    }

    #[test]
    fn test_release_app_with_private_core_on_msvc() {
        let ctx = BuildContext::default().with_mode(BuildMode::Release);
        let tc = Arc::new(msvc_toolchain(&msvc_install(Architecture::X64), &ctx));
        let reg = registry(vec![
            Target::static_library("core")
                .with_sources(["a.cpp"])
                .public_include("include")
                .public_define("CORE_DEFINE"),
            Target::binary("app").with_sources(["main.cpp"]).private_dep("core"),
        ]);
        let resolver = Resolver::new(&reg, tc, &ctx);
        let app = resolver.resolve("app").unwrap();

        assert_eq!(app.mode, BuildMode::Release);
        assert_eq!(app.platform, Platform::Windows);
        assert_eq!(app.arch, Architecture::X64);
        assert!(app.private.include_dirs.contains(&PathBuf::from("include")));
        assert!(app.private.defines.contains(&Define::flag("CORE_DEFINE")));
        assert!(app.public.is_empty());

        let libs = app.link_libraries();
        for runtime in ["vcruntime.lib", "ucrt.lib", "msvcrt.lib"] {
            assert!(libs.contains(&Library::System(runtime.into())), "{}", runtime);
        }
        assert!(!libs.contains(&Library::System("ucrtd.lib".into())));
        assert!(libs.contains(&Library::Artifact {
            target: "core".into(),
            path: PathBuf::from("lib/core.lib"),
        }));
    }

    #[test]
    fn test_require_kind() {
        let reg = registry(vec![Target::header_only("h")]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        let h = resolver.resolve("h").unwrap();
        assert!(matches!(
            h.require_kind(&[TargetKind::Binary], "an executable link"),
            Err(ResolveError::IncompatibleKind { .. })
        ));
    }

    #[test]
    fn test_resolve_all_is_independent_per_target() {
        let reg = registry(vec![
            Target::static_library("ok").with_sources(["ok.c"]),
            Target::binary("bad").with_sources(["m.c"]).private_dep("ghost"),
        ]);
        let resolver = Resolver::new(&reg, linux(), &BuildContext::default());
        let results = resolver.resolve_all(&["ok", "bad"]);
        assert_eq!(results[0].0, "ok");
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let reg = registry(vec![
            Target::header_only("x").public_define("X").public_include("x"),
            Target::header_only("y").public_define("Y").public_include("y"),
            Target::binary("app")
                .with_sources(["m.cpp"])
                .private_dep("y")
                .private_dep("x"),
        ]);
        let first = Resolver::new(&reg, linux(), &BuildContext::default())
            .resolve("app")
            .unwrap();
        let second = Resolver::new(&reg, linux(), &BuildContext::default())
            .resolve("app")
            .unwrap();
        assert_eq!(first.compile_defines(), second.compile_defines());
        assert_eq!(
            first.compile_defines().as_slice(),
            &[Define::flag("Y"), Define::flag("X")]
        );
    }
}
