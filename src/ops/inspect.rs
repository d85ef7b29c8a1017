//! Reports for `kiln toolchains` and `kiln flags`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::builder::ninja::{LinkKind, Synthesizer};
use crate::builder::options::{OutputLayout, Resolver};
use crate::builder::toolchain::{select_toolchain, HostProbe, Toolchain};
use crate::core::platform::Architecture;
use crate::core::target::TargetKind;
use crate::ops::project::{validate_target_filter, Project, ProjectOptions};

/// One discovered toolchain and whether it can be used.
#[derive(Debug, Clone)]
pub struct ToolchainStatus {
    pub name: String,
    pub description: String,
    pub family: String,
    pub platform: String,
    pub arch: String,
    pub version: String,
    pub cross: bool,
    pub compiler: PathBuf,
    pub valid: bool,
    /// Why the toolchain is unusable; empty when valid.
    pub message: String,
    /// Picked when no `--toolchain` is given.
    pub is_default: bool,
}

impl ToolchainStatus {
    fn new(tc: &Toolchain, valid: bool, message: String) -> Self {
        ToolchainStatus {
            name: tc.name.clone(),
            description: tc.description.clone(),
            family: tc.family.to_string(),
            platform: tc.platform.to_string(),
            arch: tc.arch.to_string(),
            version: tc.version.to_string(),
            cross: tc.is_cross_compiler,
            compiler: tc.cxx_compiler.clone(),
            valid,
            message,
            is_default: false,
        }
    }
}

/// Every toolchain candidate, valid or not.
pub fn list_toolchains(
    project: &ProjectOptions,
    probe: &dyn HostProbe,
) -> Result<Vec<ToolchainStatus>> {
    let project = Project::load(project)?;
    let probed = project.probe_toolchains(probe)?;

    let valid: Vec<Toolchain> = probed
        .iter()
        .filter(|(_, v)| v.is_ok())
        .map(|(tc, _)| tc.clone())
        .collect();
    let default_name = select_toolchain(&valid, None, None).map(|tc| tc.name.clone());

    Ok(probed
        .iter()
        .map(|(tc, validation)| {
            let mut status = match validation {
                Ok(()) => ToolchainStatus::new(tc, true, String::new()),
                Err(e) => ToolchainStatus::new(tc, false, e.to_string()),
            };
            status.is_default = default_name.as_deref() == Some(tc.name.as_str());
            status
        })
        .collect())
}

pub fn format_toolchains(toolchains: &[ToolchainStatus], verbose: bool) -> String {
    let mut output = String::new();
    if toolchains.is_empty() {
        output.push_str("No toolchains found.\n");
        return output;
    }

    for tc in toolchains {
        let status = if tc.valid { "[OK]" } else { "[!!]" };
        let default = if tc.is_default { " (default)" } else { "" };
        let _ = writeln!(output, "  {} {}{}", status, tc.name, default);
        let _ = writeln!(output, "      {}", tc.description);
        if verbose {
            let _ = writeln!(
                output,
                "      {} {} for {}-{}{}",
                tc.family,
                tc.version,
                tc.platform,
                tc.arch,
                if tc.cross { " (cross)" } else { "" }
            );
            let _ = writeln!(output, "      Compiler: {}", tc.compiler.display());
        }
        if !tc.valid {
            let _ = writeln!(output, "      {}", tc.message);
        }
    }
    output
}

/// Options for `kiln flags`.
#[derive(Debug, Clone, Default)]
pub struct FlagsOptions {
    pub project: ProjectOptions,
    pub toolchain: Option<String>,
    pub arch: Option<Architecture>,
    pub target: String,
}

/// The command-line fragments one target compiles and links with.
#[derive(Debug, Clone, Default)]
pub struct TargetFlags {
    pub target: String,
    pub kind: String,
    pub toolchain: String,
    pub mode: String,
    pub defines: String,
    pub includes: String,
    pub flags: String,
    pub library_dirs: String,
    pub libraries: String,
    pub link_flags: String,
    pub outputs: Vec<PathBuf>,
}

/// Resolve one target and render its compile and link fragments exactly
/// as they appear in `build.ninja`.
pub fn target_flags(opts: &FlagsOptions, probe: &dyn HostProbe) -> Result<TargetFlags> {
    let project = Project::load(&opts.project)?;
    let registry = project.registry()?;
    validate_target_filter(&registry, std::slice::from_ref(&opts.target))?;

    let toolchain = project.select_toolchain(probe, opts.toolchain.as_deref(), opts.arch)?;
    let resolver = Resolver::new(&registry, toolchain.clone(), &project.ctx);
    let options = resolver.resolve(&opts.target)?;
    let synthesizer = Synthesizer::new(toolchain.clone(), OutputLayout::default());

    let source = options
        .sources
        .first()
        .cloned()
        .unwrap_or_else(|| PathBuf::from("source.cpp"));
    let compile = synthesizer.emit_compile_edge(&source, &options);

    let link = match (options.kind, options.primary_output()) {
        (TargetKind::StaticLibrary, Some(out)) => {
            Some(synthesizer.emit_archive_edge(out, &[], &options)?)
        }
        (TargetKind::SharedLibrary | TargetKind::DynamicLibrary, Some(out)) => {
            Some(synthesizer.emit_link_edge(LinkKind::SharedLibrary, out, &[], &options)?)
        }
        (TargetKind::Binary, Some(out)) => {
            Some(synthesizer.emit_link_edge(LinkKind::Executable, out, &[], &options)?)
        }
        (kind, _) if kind.is_buildable() => {
            bail!("target `{}` has no output", opts.target)
        }
        _ => None,
    };
    let link_var = |name: &str| {
        link.as_ref()
            .and_then(|edge| edge.binding(name))
            .unwrap_or_default()
            .to_string()
    };

    Ok(TargetFlags {
        target: options.target.clone(),
        kind: options.kind.as_str().to_string(),
        toolchain: toolchain.name.clone(),
        mode: options.mode.to_string(),
        defines: compile.binding("DEFINES").unwrap_or_default().to_string(),
        includes: compile.binding("INCLUDES").unwrap_or_default().to_string(),
        flags: compile.binding("FLAGS").unwrap_or_default().to_string(),
        library_dirs: link_var("LIBDIRS"),
        libraries: link_var("LIBS"),
        link_flags: if options.kind == TargetKind::StaticLibrary {
            link_var("ARFLAGS")
        } else {
            link_var("LDFLAGS")
        },
        outputs: options.outputs.iter().cloned().collect(),
    })
}

pub fn format_target_flags(flags: &TargetFlags) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} ({}, {} mode, {})",
        flags.target, flags.kind, flags.mode, flags.toolchain
    );
    let line = |out: &mut String, label: &str, value: &str| {
        if !value.is_empty() {
            let _ = writeln!(out, "  {:<9} {}", label, value);
        }
    };
    line(&mut output, "defines:", &flags.defines);
    line(&mut output, "includes:", &flags.includes);
    line(&mut output, "flags:", &flags.flags);
    line(&mut output, "libdirs:", &flags.library_dirs);
    line(&mut output, "libs:", &flags.libraries);
    line(&mut output, "ldflags:", &flags.link_flags);
    for out in &flags.outputs {
        line(&mut output, "output:", &display(out));
    }
    output
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
