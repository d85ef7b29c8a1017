//! `kiln toolchains` command

use anyhow::Result;

use crate::cli::ToolchainsArgs;
use kiln::builder::SystemProbe;
use kiln::ops::{format_toolchains, list_toolchains};

pub fn execute(args: ToolchainsArgs, verbose: bool) -> Result<()> {
    let toolchains = list_toolchains(&args.project.to_options(), &SystemProbe)?;
    print!("{}", format_toolchains(&toolchains, verbose));
    Ok(())
}
