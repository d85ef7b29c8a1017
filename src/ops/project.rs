//! Loading a project: manifest, layered configuration, toolchains.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::builder::toolchain::{
    discover_system_toolchains, probe_toolchains, select_toolchain, DiscoveryError, HostProbe,
    Toolchain,
};
use crate::core::context::{BuildContext, BuildMode};
use crate::core::manifest::{find_manifest, Manifest, MANIFEST_NAME};
use crate::core::platform::{Architecture, Platform};
use crate::core::registry::TargetRegistry;
use crate::util::config::{global_config_path, load_config, project_config_path, Config};

/// Default build directory, relative to the project root.
pub const DEFAULT_BUILD_DIR: &str = "build";

/// How to locate and configure a project.
#[derive(Debug, Clone, Default)]
pub struct ProjectOptions {
    /// Directory to search for `Kiln.toml` from (default: current dir)
    pub project_root: Option<PathBuf>,

    /// Build directory override (relative paths are under the project root)
    pub build_dir: Option<PathBuf>,

    /// Build mode override
    pub mode: Option<BuildMode>,

    /// User-wide config file; `None` skips it
    pub global_config: Option<PathBuf>,
}

impl ProjectOptions {
    /// Options that read `~/.kiln/config.toml`.
    pub fn with_global_config() -> Self {
        ProjectOptions {
            global_config: global_config_path(),
            ..Default::default()
        }
    }
}

/// A loaded project.
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: Manifest,
    pub config: Config,
    pub ctx: BuildContext,
    /// Absolute build directory; Ninja runs here.
    pub build_dir: PathBuf,
}

impl Project {
    pub fn load(opts: &ProjectOptions) -> Result<Self> {
        let start = match &opts.project_root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("failed to get current directory")?,
        };
        let start = start
            .canonicalize()
            .with_context(|| format!("project directory not found: {}", start.display()))?;
        let Some(manifest_path) = find_manifest(&start) else {
            bail!(
                "could not find `{}` in `{}` or any parent directory",
                MANIFEST_NAME,
                start.display()
            );
        };
        let root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| start.clone());

        let manifest = Manifest::load(&manifest_path)?;
        let config = load_config(opts.global_config.as_deref(), &project_config_path(&root))?;
        let mut ctx = config.build_context()?;
        if let Some(mode) = opts.mode {
            ctx = ctx.with_mode(mode);
        }

        let build_dir = opts
            .build_dir
            .clone()
            .or_else(|| config.build.build_dir.clone())
            .or_else(|| manifest.project.build_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_DIR));
        let build_dir = root.join(build_dir);

        debug!(
            "project at {} ({} mode, build dir {})",
            root.display(),
            ctx.mode,
            build_dir.display()
        );

        Ok(Project {
            root,
            manifest_path,
            manifest,
            config,
            ctx,
            build_dir,
        })
    }

    /// Targets with paths rebased onto the build directory.
    pub fn registry(&self) -> Result<TargetRegistry> {
        self.manifest.to_registry(&self.root, &self.build_dir)
    }

    /// Every candidate toolchain with its validation result.
    pub fn probe_toolchains(
        &self,
        probe: &dyn HostProbe,
    ) -> Result<Vec<(Toolchain, Result<(), DiscoveryError>)>> {
        let configured = self
            .config
            .installations(Platform::host()?, Architecture::host()?)?;
        Ok(probe_toolchains(&self.ctx, &configured, probe)?)
    }

    /// Valid toolchains, configured ones first.
    pub fn toolchains(&self, probe: &dyn HostProbe) -> Result<Vec<Toolchain>> {
        let configured = self
            .config
            .installations(Platform::host()?, Architecture::host()?)?;
        Ok(discover_system_toolchains(&self.ctx, &configured, probe)?)
    }

    /// Pick the toolchain to build with.
    pub fn select_toolchain(
        &self,
        probe: &dyn HostProbe,
        name: Option<&str>,
        arch: Option<Architecture>,
    ) -> Result<Arc<Toolchain>> {
        let toolchains = self.toolchains(probe)?;
        match select_toolchain(&toolchains, name, arch) {
            Some(tc) => Ok(Arc::new(tc.clone())),
            None if toolchains.is_empty() => bail!(
                "no usable C/C++ toolchain found\n\
                 help: install clang, run from a Developer Command Prompt, \
                 or add a [[toolchain]] entry to .kiln/config.toml"
            ),
            None => bail!(
                "no toolchain matches `{}`{}\n\
                 available toolchains: {}",
                name.unwrap_or("*"),
                arch.map(|a| format!(" for {}", a)).unwrap_or_default(),
                toolchains
                    .iter()
                    .map(|t| t.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// Fail with the list of known targets if any `requested` is unknown.
pub fn validate_target_filter(registry: &TargetRegistry, requested: &[String]) -> Result<()> {
    for name in requested {
        if !registry.contains(name) {
            let known: Vec<&str> = registry.names().collect();
            bail!(
                "unknown target `{}`\n\
                 available targets: {}",
                name,
                if known.is_empty() {
                    "(none)".to_string()
                } else {
                    known.join(", ")
                }
            );
        }
    }
    Ok(())
}
