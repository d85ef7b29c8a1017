//! `kiln flags` command

use anyhow::Result;

use crate::cli::FlagsArgs;
use kiln::builder::SystemProbe;
use kiln::ops::{format_target_flags, target_flags, FlagsOptions};

pub fn execute(args: FlagsArgs) -> Result<()> {
    let opts = FlagsOptions {
        project: args.project.to_options(),
        toolchain: args.select.toolchain,
        arch: args.select.arch,
        target: args.target,
    };
    let flags = target_flags(&opts, &SystemProbe)?;
    print!("{}", format_target_flags(&flags));
    Ok(())
}
