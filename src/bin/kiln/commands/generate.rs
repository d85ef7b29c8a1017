//! `kiln generate` command

use anyhow::{bail, Result};

use crate::cli::GenerateArgs;
use kiln::builder::SystemProbe;
use kiln::ops::{generate, GenerateOptions};

pub fn execute(args: GenerateArgs) -> Result<()> {
    let opts = GenerateOptions {
        project: args.project.to_options(),
        toolchain: args.select.toolchain,
        arch: args.select.arch,
        targets: args.targets,
        compile_commands: args.compile_commands,
    };

    let report = generate(&opts, &SystemProbe)?;

    println!(
        "Generated {} ({} edges, {} default outputs, toolchain {})",
        report.ninja_path.display(),
        report.edges,
        report.defaults,
        report.toolchain
    );
    if let Some(path) = &report.compile_commands {
        println!("Wrote {}", path.display());
    }

    if !report.is_success() {
        for (target, error) in &report.failures {
            eprintln!("  {}: {}", target, error);
        }
        bail!("{} target(s) could not be generated", report.failures.len());
    }
    Ok(())
}
