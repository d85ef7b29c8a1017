//! Implementation of `kiln generate`.
//!
//! Loads the project, picks a toolchain, resolves targets and writes
//! `build.ninja` (plus `compile_commands.json` on request) into the build
//! directory.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

use crate::builder::ninja::{SynthesisError, Synthesizer, NINJA_FILE};
use crate::builder::options::{OutputLayout, Resolver};
use crate::builder::toolchain::HostProbe;
use crate::core::platform::Architecture;
use crate::ops::compile_commands::write_compile_commands;
use crate::ops::project::{validate_target_filter, Project, ProjectOptions};
use crate::util::fs::{ensure_dir, write_if_changed};

/// Options for generating a build.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub project: ProjectOptions,

    /// Toolchain name or family
    pub toolchain: Option<String>,

    /// Target architecture
    pub arch: Option<Architecture>,

    /// Targets to generate (all when empty)
    pub targets: Vec<String>,

    /// Also write compile_commands.json
    pub compile_commands: bool,
}

/// What a generate run produced.
#[derive(Debug)]
pub struct GenerateReport {
    pub ninja_path: PathBuf,
    /// False when an identical `build.ninja` was already on disk.
    pub written: bool,
    pub toolchain: String,
    pub edges: usize,
    pub defaults: usize,
    pub compile_commands: Option<PathBuf>,
    /// Targets that could not be synthesized.
    pub failures: Vec<(String, SynthesisError)>,
}

impl GenerateReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Generate `build.ninja` for a project.
///
/// Per-target failures do not abort the run: the rest of the graph is
/// still written and the failures are returned in the report.
pub fn generate(opts: &GenerateOptions, probe: &dyn HostProbe) -> Result<GenerateReport> {
    let project = Project::load(&opts.project)?;
    let registry = project.registry()?;
    validate_target_filter(&registry, &opts.targets)?;

    let toolchain = project.select_toolchain(probe, opts.toolchain.as_deref(), opts.arch)?;
    info!(
        "generating {} build with {}",
        project.ctx.mode, toolchain.description
    );

    let resolver = Resolver::new(&registry, toolchain.clone(), &project.ctx);
    let synthesizer = Synthesizer::new(toolchain.clone(), OutputLayout::default());
    let (graph, failures) = synthesizer.synthesize_all(&resolver, &opts.targets);

    for (target, error) in &failures {
        warn!("target `{}`: {}", target, error);
    }

    ensure_dir(&project.build_dir)?;
    let ninja_path = project.build_dir.join(NINJA_FILE);
    let written = write_if_changed(&ninja_path, &graph.to_ninja())?;
    if written {
        info!("wrote {}", ninja_path.display());
    } else {
        info!("{} is up to date", ninja_path.display());
    }

    let compile_commands = if opts.compile_commands || project.config.build.compile_commands {
        Some(write_compile_commands(&graph, &project.build_dir)?)
    } else {
        None
    };

    Ok(GenerateReport {
        ninja_path,
        written,
        toolchain: toolchain.name.clone(),
        edges: graph.edges().len(),
        defaults: graph.defaults().len(),
        compile_commands,
        failures,
    })
}
