//! Turning resolved targets into rules and edges.
//!
//! Rules carry everything that does not depend on the build mode or the
//! target: tool paths, base options, language standard, global defines,
//! and system include/library directories. Edges bind the rest through
//! variables, so Debug and Release graphs share identical rule blocks.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::builder::ninja::graph::{BuildEdge, BuildGraph, Rule, SynthesisError};
use crate::builder::ninja::writer::{escape_value, join_args, quote_arg};
use crate::builder::options::{BuildOptions, Library, OutputLayout, Resolver};
use crate::builder::toolchain::{DependencyStyle, Toolchain};
use crate::core::context::BuildMode;
use crate::core::errors::ResolveError;
use crate::core::platform::Platform;
use crate::core::target::{Language, TargetKind};

pub const RULE_CC: &str = "cc";
pub const RULE_CXX: &str = "cxx";
pub const RULE_LINK_SHARED: &str = "link_shared";
pub const RULE_LINK_EXE: &str = "link_exe";
pub const RULE_ARCHIVE: &str = "archive";
/// Copies runtime libraries next to the binaries that load them. Only
/// emitted for toolchains that deploy any.
pub const RULE_COPY: &str = "copy";

/// Which link rule an edge uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Executable,
    SharedLibrary,
}

impl LinkKind {
    fn rule(&self) -> &'static str {
        match self {
            LinkKind::Executable => RULE_LINK_EXE,
            LinkKind::SharedLibrary => RULE_LINK_SHARED,
        }
    }

    fn allowed_kinds(&self) -> &'static [TargetKind] {
        match self {
            LinkKind::Executable => &[TargetKind::Binary],
            LinkKind::SharedLibrary => &[TargetKind::SharedLibrary, TargetKind::DynamicLibrary],
        }
    }

    fn operation(&self) -> &'static str {
        match self {
            LinkKind::Executable => "an executable link",
            LinkKind::SharedLibrary => "a shared library link",
        }
    }
}

/// Emits rules and edges for one toolchain.
pub struct Synthesizer {
    toolchain: Arc<Toolchain>,
    layout: OutputLayout,
}

impl Synthesizer {
    pub fn new(toolchain: Arc<Toolchain>, layout: OutputLayout) -> Self {
        Synthesizer { toolchain, layout }
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// The five rules every graph for this toolchain uses, plus `copy`
    /// when the toolchain deploys runtime libraries in any mode.
    pub fn emit_rule_set(&self) -> Vec<Rule> {
        let tc = &*self.toolchain;
        let syntax = tc.syntax();

        let defines: Vec<String> = tc.defines.iter().map(|d| syntax.define(d)).collect();
        let includes: Vec<String> = tc
            .system_include_dirs
            .iter()
            .map(|d| syntax.include(d))
            .collect();
        let compile_switch = match syntax.dependency_style {
            DependencyStyle::Msvc => "/c",
            // `DEPFILE` is also the rule's `depfile`, which Ninja reads
            // verbatim; only the command sees it quoted.
            DependencyStyle::Gcc => "-MD -MF \"$DEPFILE\" -c",
        };
        let compile = |tool: &Path, lang_flags: &[String]| {
            let mut args = vec![tool.display().to_string()];
            args.extend(tc.compiler_options.iter().cloned());
            args.extend(lang_flags.iter().cloned());
            args.extend(defines.iter().cloned());
            args.extend(includes.iter().cloned());
            format!(
                "{} $DEFINES $INCLUDES $FLAGS {} $in {}",
                baked(args),
                compile_switch,
                syntax.compile_output
            )
        };
        let cc = compile(&tc.compiler, &tc.c_flags);
        let cxx = compile(&tc.cxx_compiler, &tc.cxx_flags);

        let lib_dirs: Vec<String> = tc.library_dirs.iter().map(|d| syntax.lib_dir(d)).collect();
        let libs: Vec<String> = tc.libraries.iter().map(|l| syntax.library(l)).collect();
        let link = |extra: &[&str], implib: Option<&str>| {
            let mut head = vec![tc.linker.display().to_string()];
            head.extend(extra.iter().map(|s| s.to_string()));
            head.extend(tc.linker_options.iter().cloned());
            let mut command = format!("{} $LDFLAGS $in {}", baked(head), syntax.link_output);
            if let Some(implib) = implib {
                command.push(' ');
                command.push_str(implib);
            }
            // Toolchain libraries go last: a single-pass linker only
            // resolves symbols against libraries that follow their users.
            command.push_str(" $LIBDIRS");
            for baked_args in [baked(&lib_dirs), "$LIBS".to_string(), baked(&libs)] {
                if !baked_args.is_empty() {
                    command.push(' ');
                    command.push_str(&baked_args);
                }
            }
            command
        };

        let (shared_flag, implib) = if tc.family.is_msvc() {
            ("/DLL", Some("/IMPLIB:$IMPLIB"))
        } else if tc.has_import_libs {
            ("-shared", Some("-Wl,/IMPLIB:$IMPLIB"))
        } else {
            ("-shared", None)
        };
        let link_exe = link(&[], None);
        let link_shared = link(&[shared_flag], implib);

        let archiver = baked(
            std::iter::once(tc.archiver.display().to_string())
                .chain(tc.archiver_options.iter().cloned()),
        );
        let archive = if tc.family.is_msvc() {
            format!("{} $ARFLAGS /OUT:$out $in", archiver)
        } else if tc.platform == Platform::Windows {
            format!("{} rcs $ARFLAGS $out $in", archiver)
        } else {
            // ar appends to an existing archive; start from scratch.
            format!("rm -f $out && {} rcs $ARFLAGS $out $in", archiver)
        };

        let with_deps = |rule: Rule| match syntax.dependency_style {
            DependencyStyle::Msvc => rule.with_deps(DependencyStyle::Msvc),
            DependencyStyle::Gcc => rule
                .with_depfile("$DEPFILE")
                .with_deps(DependencyStyle::Gcc),
        };

        let mut rules = vec![
            with_deps(Rule::new(RULE_CC, cc, "CC $out")),
            with_deps(Rule::new(RULE_CXX, cxx, "CXX $out")),
            Rule::new(RULE_LINK_SHARED, link_shared, "LINK $out"),
            Rule::new(RULE_LINK_EXE, link_exe, "LINK $out"),
            Rule::new(RULE_ARCHIVE, archive, "AR $out"),
        ];
        let deploys = BuildMode::ALL
            .iter()
            .any(|mode| !tc.deploy_libraries.get(*mode).is_empty());
        if deploys {
            let copy = if tc.platform == Platform::Windows {
                "cmd /c copy /Y $in $out >NUL"
            } else {
                "cp -f $in $out"
            };
            rules.push(Rule::new(RULE_COPY, copy, "COPY $out"));
        }
        rules
    }

    pub fn object_path(&self, options: &BuildOptions, source: &Path) -> PathBuf {
        self.layout
            .object_path(&self.toolchain, &options.target, source)
    }

    /// Compile `source` into its object file.
    pub fn emit_compile_edge(&self, source: &Path, options: &BuildOptions) -> BuildEdge {
        let tc = &*self.toolchain;
        let syntax = tc.syntax();
        let object = self.object_path(options, source);
        let rule = match Language::for_source(source).unwrap_or(options.language) {
            Language::C => RULE_CC,
            Language::Cxx => RULE_CXX,
        };

        let defines = tc
            .mode_defines
            .get(options.mode)
            .iter()
            .chain(options.compile_defines().iter())
            .map(|d| syntax.define(d))
            .collect::<Vec<_>>();
        let includes = options
            .compile_include_dirs()
            .iter()
            .map(|d| syntax.include(d))
            .collect::<Vec<_>>();
        let flags = tc
            .mode_compiler_options
            .get(options.mode)
            .iter()
            .chain(options.compile_flags().iter())
            .cloned()
            .collect::<Vec<_>>();

        let mut edge = BuildEdge::new(rule, object.clone())
            .input(source)
            .bind("DEFINES", join_args(defines))
            .bind("INCLUDES", join_args(includes))
            .bind("FLAGS", join_args(flags));
        if syntax.dependency_style == DependencyStyle::Gcc {
            let mut depfile = object.into_os_string();
            depfile.push(".d");
            edge = edge.with_depfile(depfile);
        }
        edge
    }

    /// Link `objects` into an executable or shared library at `output`.
    pub fn emit_link_edge(
        &self,
        kind: LinkKind,
        output: &Path,
        objects: &[PathBuf],
        options: &BuildOptions,
    ) -> Result<BuildEdge, SynthesisError> {
        options.require_kind(kind.allowed_kinds(), kind.operation())?;
        let tc = &*self.toolchain;
        let syntax = tc.syntax();

        let lib_dirs = options
            .link_library_dirs()
            .iter()
            .map(|d| syntax.lib_dir(d))
            .collect::<Vec<_>>();
        let libs = options
            .resolved_libraries()
            .iter()
            .filter_map(|lib| match lib {
                Library::System(name) => Some(name.clone()),
                Library::Artifact { path, .. } => Some(path.display().to_string()),
                Library::Runtime { .. } => None,
            })
            .chain(tc.mode_libraries.get(options.mode).iter().cloned())
            .map(|l| syntax.library(&l))
            .collect::<Vec<_>>();

        let mut edge = BuildEdge::new(kind.rule(), output)
            .inputs(objects.iter().cloned())
            .implicit_inputs(options.link_inputs())
            .order_only_inputs(options.runtime_dependencies())
            .bind("LIBDIRS", join_args(lib_dirs))
            .bind("LIBS", join_args(libs))
            .bind("LDFLAGS", join_args(tc.mode_linker_options.get(options.mode)));

        if kind == LinkKind::SharedLibrary {
            if let Some(implib) = options.import_library() {
                edge = edge
                    .implicit_output(implib)
                    .bind("IMPLIB", quote_arg(&implib.display().to_string()));
            }
        }
        Ok(edge)
    }

    /// Archive `objects` into a static library at `output`.
    pub fn emit_archive_edge(
        &self,
        output: &Path,
        objects: &[PathBuf],
        options: &BuildOptions,
    ) -> Result<BuildEdge, SynthesisError> {
        options.require_kind(&[TargetKind::StaticLibrary], "a static archive")?;
        Ok(BuildEdge::new(RULE_ARCHIVE, output)
            .inputs(objects.iter().cloned())
            .bind(
                "ARFLAGS",
                join_args(self.toolchain.mode_archiver_options.get(options.mode)),
            ))
    }

    /// Copy this mode's runtime libraries (the ASan DLL for MSVC Debug)
    /// into the binary directory, where the loader finds them.
    pub fn emit_deploy_edges(&self, options: &BuildOptions) -> Vec<BuildEdge> {
        self.toolchain
            .deploy_libraries
            .get(options.mode)
            .iter()
            .filter_map(|library| {
                let file = library.file_name()?;
                Some(BuildEdge::new(RULE_COPY, self.layout.bin_dir.join(file)).input(library.clone()))
            })
            .collect()
    }

    /// Every edge one target needs. Header-only and imported targets
    /// produce nothing.
    pub fn synthesize_target(
        &self,
        options: &BuildOptions,
        graph: &mut BuildGraph,
    ) -> Result<(), SynthesisError> {
        if !options.kind.is_buildable() {
            return Ok(());
        }
        for rule in self.emit_rule_set() {
            graph.add_rule(rule)?;
        }

        let mut objects = Vec::with_capacity(options.sources.len());
        for source in options.sources.iter() {
            let edge = self.emit_compile_edge(source, options);
            objects.extend(edge.outputs.iter().cloned());
            graph.add_edge(edge)?;
        }

        let output = options.primary_output().ok_or_else(|| {
            SynthesisError::Resolve(ResolveError::NoSources {
                target: options.target.clone(),
                kind: options.kind,
            })
        })?;
        let edge = match options.kind {
            TargetKind::StaticLibrary => self.emit_archive_edge(output, &objects, options)?,
            kind => {
                let link_kind = match kind {
                    TargetKind::SharedLibrary | TargetKind::DynamicLibrary => {
                        LinkKind::SharedLibrary
                    }
                    _ => LinkKind::Executable,
                };
                let mut deployed = Vec::new();
                for copy in self.emit_deploy_edges(options) {
                    deployed.extend(copy.outputs.iter().cloned());
                    graph.add_edge(copy)?;
                }
                self.emit_link_edge(link_kind, output, &objects, options)?
                    .order_only_inputs(deployed)
            }
        };
        graph.add_edge(edge)?;

        debug!(
            "synthesized `{}`: {} object(s) -> {}",
            options.target,
            objects.len(),
            output.display()
        );
        Ok(())
    }

    /// Synthesize `requested` targets (all targets when empty) and the
    /// targets they depend on.
    ///
    /// Targets are resolved and synthesized in parallel into separate
    /// fragments, then merged in dependency order. A failing target is
    /// reported and left out, together with everything that depends on it;
    /// the rest of the graph is still produced.
    pub fn synthesize_all(
        &self,
        resolver: &Resolver<'_>,
        requested: &[String],
    ) -> (BuildGraph, Vec<(String, SynthesisError)>) {
        let registry = resolver.registry();
        let mut graph = BuildGraph::new();
        let mut failures = Vec::new();
        for rule in self.emit_rule_set() {
            if let Err(e) = graph.add_rule(rule) {
                failures.push((String::new(), e));
            }
        }

        let order: Vec<String> = match registry.build_order() {
            Ok(order) => order.into_iter().map(|t| t.name.clone()).collect(),
            // Cycles are reported per target by the resolver.
            Err(_) => registry.names().map(str::to_string).collect(),
        };
        let wanted = closure(resolver, requested);
        let names: Vec<String> = order
            .into_iter()
            .filter(|n| wanted.as_ref().map_or(true, |w| w.contains(n)))
            .collect();

        let fragments: Vec<(String, Result<(BuildOptions, BuildGraph), SynthesisError>)> = names
            .par_iter()
            .map(|name| {
                let result = resolver
                    .resolve(name)
                    .map_err(SynthesisError::from)
                    .and_then(|options| {
                        let mut fragment = BuildGraph::new();
                        self.synthesize_target(&options, &mut fragment)?;
                        Ok((options, fragment))
                    });
                (name.clone(), result)
            })
            .collect();

        let mut failed: HashSet<String> = HashSet::new();
        for (name, result) in fragments {
            let merged = result.and_then(|(options, fragment)| {
                let target = registry.get(&name);
                if let Some(dep) = target
                    .into_iter()
                    .flat_map(|t| t.dependencies())
                    .map(|(dep, _)| dep)
                    .find(|dep| failed.contains(*dep))
                {
                    return Err(SynthesisError::DependencyFailed {
                        target: name.clone(),
                        dependency: dep.to_string(),
                    });
                }
                graph.merge(fragment)?;
                Ok(options)
            });
            match merged {
                Ok(options) => {
                    let is_default = requested.is_empty() || requested.contains(&name);
                    if is_default && options.kind.is_buildable() {
                        if let Some(output) = options.primary_output() {
                            graph.add_default(output);
                        }
                    }
                }
                Err(e) => {
                    warn!("target `{}` failed: {}", name, e);
                    failed.insert(name.clone());
                    failures.push((name, e));
                }
            }
        }

        (graph, failures)
    }
}

/// Requested targets plus everything they reach; `None` means all.
fn closure(resolver: &Resolver<'_>, requested: &[String]) -> Option<HashSet<String>> {
    if requested.is_empty() {
        return None;
    }
    let registry = resolver.registry();
    let mut seen = HashSet::new();
    let mut stack: Vec<String> = requested.to_vec();
    while let Some(name) = stack.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        if let Some(target) = registry.get(&name) {
            stack.extend(target.dependencies().map(|(dep, _)| dep.to_string()));
        }
    }
    Some(seen)
}

/// Quote, join and `$`-escape arguments baked into a rule command.
fn baked<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    escape_value(&join_args(args))
}
