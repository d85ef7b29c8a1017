//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use kiln::core::{Architecture, BuildMode};
use kiln::ops::ProjectOptions;
use kiln::util::config::global_config_path;

/// Kiln - a native C/C++ build tool that generates Ninja builds
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write build.ninja for the current project
    Generate(GenerateArgs),

    /// List discovered toolchains
    Toolchains(ToolchainsArgs),

    /// Show compile/link flags for a target
    Flags(FlagsArgs),
}

/// Where the project is and how to configure it.
#[derive(Args)]
pub struct ProjectArgs {
    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long = "directory", value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Build directory, relative to the project root
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Build in release mode
    #[arg(long, conflicts_with = "mode")]
    pub release: bool,

    /// Build mode: debug, develop or release
    #[arg(long)]
    pub mode: Option<BuildMode>,

    /// Ignore ~/.kiln/config.toml
    #[arg(long)]
    pub no_global_config: bool,
}

impl ProjectArgs {
    pub fn to_options(&self) -> ProjectOptions {
        let mode = if self.release {
            Some(BuildMode::Release)
        } else {
            self.mode
        };
        ProjectOptions {
            project_root: self.directory.clone(),
            build_dir: self.build_dir.clone(),
            mode,
            global_config: if self.no_global_config {
                None
            } else {
                global_config_path()
            },
        }
    }
}

/// Which toolchain to use.
#[derive(Args)]
pub struct ToolchainSelectArgs {
    /// Toolchain name or family (msvc, clang, clang-cl)
    #[arg(long)]
    pub toolchain: Option<String>,

    /// Target architecture (x64, arm64)
    #[arg(long)]
    pub arch: Option<Architecture>,
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Targets to generate (defaults to all targets)
    pub targets: Vec<String>,

    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(flatten)]
    pub select: ToolchainSelectArgs,

    /// Also write compile_commands.json
    #[arg(long)]
    pub compile_commands: bool,
}

#[derive(Args)]
pub struct ToolchainsArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Args)]
pub struct FlagsArgs {
    /// Target to show flags for
    pub target: String,

    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(flatten)]
    pub select: ToolchainSelectArgs,
}
