//! Configuration file support for kiln.
//!
//! kiln reads two configuration file locations:
//! - Global: `~/.kiln/config.toml` - User-wide defaults
//! - Project: `.kiln/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. Command-line flags
//! take precedence over both.
//!
//! ```toml
//! [build]
//! mode = "release"
//! cxx_std = "c++20"
//! warning_level = "w4"
//!
//! [minimum_versions]
//! clang = "18"
//!
//! [[toolchain]]
//! family = "clang"
//! compiler = "/opt/llvm/bin/clang"
//! archiver = "/opt/llvm/bin/llvm-ar"
//! version = "20.1.2"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::toolchain::{
    ClangInstallation, DiscoveryError, Installation, MsvcInstallation, ToolchainFamily,
    WindowsSdk,
};
use crate::core::context::{
    BuildContext, BuildMode, CStandard, CxxStandard, MinimumVersions, WarningLevel,
};
use crate::core::platform::{Architecture, Platform};
use crate::core::version::{parse_version_lenient, Version};

/// Name of the per-user and per-project configuration directory.
pub const CONFIG_DIR: &str = ".kiln";

/// kiln configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Version floors for discovered toolchains
    pub minimum_versions: MinimumVersionsConfig,

    /// Explicit toolchain installations, tried before host probing
    #[serde(rename = "toolchain")]
    pub toolchains: Vec<ToolchainEntry>,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Default build mode (debug, develop, release)
    pub mode: Option<BuildMode>,

    pub c_std: Option<CStandard>,

    pub cxx_std: Option<CxxStandard>,

    pub warning_level: Option<WarningLevel>,

    pub exceptions: Option<bool>,

    pub rtti: Option<bool>,

    /// Whether Develop mode optimizes lightly or matches Debug
    pub develop_optimization: Option<bool>,

    /// Build directory, relative to the project root
    pub build_dir: Option<PathBuf>,

    /// Always emit compile_commands.json
    #[serde(default)]
    pub compile_commands: bool,
}

/// `[minimum_versions]`: version strings such as `"14.38"` or `"20"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimumVersionsConfig {
    pub msvc: Option<String>,
    pub visual_studio: Option<String>,
    pub windows_sdk: Option<String>,
    pub clang: Option<String>,
    pub apple_clang: Option<String>,
}

/// One `[[toolchain]]` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainEntry {
    pub name: Option<String>,

    /// `msvc`, `clang`, `clang-linux`, `clang-macos` or `clang-ios`
    pub family: Option<ToolchainFamily>,

    /// Compiler version, e.g. `"20.1.2"` or `"14.38.33130"`
    pub version: Option<String>,

    /// Target platform (defaults to the host, or the family's platform)
    pub platform: Option<Platform>,

    /// Target architecture (defaults to the host's)
    pub arch: Option<Architecture>,

    /// Architecture the compiler runs on (defaults to the host's)
    pub host_arch: Option<Architecture>,

    pub include_dirs: Vec<PathBuf>,

    pub library_dirs: Vec<PathBuf>,

    pub asan: bool,

    // Clang
    pub compiler: Option<PathBuf>,
    pub cxx_compiler: Option<PathBuf>,
    pub archiver: Option<PathBuf>,
    pub stripper: Option<PathBuf>,
    pub apple: bool,
    pub sysroot: Option<PathBuf>,
    pub deployment_target: Option<String>,

    // MSVC
    /// `VC/Tools/MSVC/<version>` directory
    pub tools_dir: Option<PathBuf>,
    pub visual_studio_version: Option<String>,
    /// Windows SDK root, e.g. `C:/Program Files (x86)/Windows Kits/10`
    pub sdk_root: Option<PathBuf>,
    /// Windows SDK version directory, e.g. `10.0.22621.0`
    pub sdk_version: Option<String>,
}

impl ToolchainEntry {
    fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.compiler.as_ref().map(|c| c.display().to_string()))
            .or_else(|| self.tools_dir.as_ref().map(|t| t.display().to_string()))
            .unwrap_or_else(|| "<unnamed>".to_string())
    }

    fn invalid(&self, reason: impl Into<String>) -> DiscoveryError {
        DiscoveryError::InvalidInstallation {
            name: self.label(),
            reason: reason.into(),
        }
    }

    fn parse_version(&self, field: &str, text: &str) -> Result<Version, DiscoveryError> {
        parse_version_lenient(text)
            .ok_or_else(|| self.invalid(format!("`{}` is not a version: `{}`", field, text)))
    }

    /// Turn the entry into an installation, filling defaults from the host.
    pub fn to_installation(
        &self,
        host: Platform,
        host_arch: Architecture,
    ) -> Result<Installation, DiscoveryError> {
        let family = self
            .family
            .ok_or_else(|| self.invalid("missing `family`"))?;
        let version_text = self
            .version
            .as_deref()
            .ok_or_else(|| self.invalid("missing `version`"))?;
        let version = self.parse_version("version", version_text)?;
        let compiler_host = self.host_arch.unwrap_or(host_arch);
        let target_arch = self.arch.unwrap_or(compiler_host);

        if family.is_msvc() {
            return self.to_msvc(version, compiler_host, target_arch);
        }

        let platform = self.platform.unwrap_or(match family {
            ToolchainFamily::ClangLinux => Platform::Linux,
            ToolchainFamily::ClangMacOS => Platform::MacOS,
            ToolchainFamily::ClangIOS => Platform::IOS,
            _ => host,
        });
        let compiler = self
            .compiler
            .clone()
            .ok_or_else(|| self.invalid("missing `compiler`"))?;
        let archiver = self
            .archiver
            .clone()
            .ok_or_else(|| self.invalid("missing `archiver`"))?;

        Ok(Installation::Clang(ClangInstallation {
            name: self.name.clone(),
            cxx_compiler: self
                .cxx_compiler
                .clone()
                .unwrap_or_else(|| compiler.clone()),
            compiler,
            archiver,
            stripper: self.stripper.clone(),
            version,
            apple: self.apple,
            platform,
            host_arch: compiler_host,
            target_arch,
            sysroot: self.sysroot.clone(),
            deployment_target: self.deployment_target.clone(),
            has_asan: self.asan,
            extra_include_dirs: self.include_dirs.clone(),
            extra_library_dirs: self.library_dirs.clone(),
        }))
    }

    fn to_msvc(
        &self,
        version: Version,
        host_arch: Architecture,
        target_arch: Architecture,
    ) -> Result<Installation, DiscoveryError> {
        let tools_dir = self
            .tools_dir
            .clone()
            .ok_or_else(|| self.invalid("missing `tools_dir`"))?;
        let visual_studio_version = self
            .visual_studio_version
            .as_deref()
            .map(|v| self.parse_version("visual_studio_version", v))
            .transpose()?;
        let sdk = match (&self.sdk_root, &self.sdk_version) {
            (Some(root), Some(dir)) => Some(WindowsSdk {
                root: root.clone(),
                version_dir: dir.clone(),
                version: self.parse_version("sdk_version", dir)?,
            }),
            (None, None) => None,
            _ => return Err(self.invalid("`sdk_root` and `sdk_version` must be set together")),
        };

        Ok(Installation::Msvc(MsvcInstallation {
            name: self.name.clone(),
            tools_dir,
            version,
            visual_studio_version,
            sdk,
            host_arch,
            target_arch,
            has_asan: self.asan,
            extra_include_dirs: self.include_dirs.clone(),
            extra_library_dirs: self.library_dirs.clone(),
        }))
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Merge another config into this one (other takes precedence).
    ///
    /// Toolchain entries accumulate, with `other`'s tried first.
    pub fn merge(&mut self, other: Config) {
        // Build settings
        if other.build.mode.is_some() {
            self.build.mode = other.build.mode;
        }
        if other.build.c_std.is_some() {
            self.build.c_std = other.build.c_std;
        }
        if other.build.cxx_std.is_some() {
            self.build.cxx_std = other.build.cxx_std;
        }
        if other.build.warning_level.is_some() {
            self.build.warning_level = other.build.warning_level;
        }
        if other.build.exceptions.is_some() {
            self.build.exceptions = other.build.exceptions;
        }
        if other.build.rtti.is_some() {
            self.build.rtti = other.build.rtti;
        }
        if other.build.develop_optimization.is_some() {
            self.build.develop_optimization = other.build.develop_optimization;
        }
        if other.build.build_dir.is_some() {
            self.build.build_dir = other.build.build_dir;
        }

        // Version floors
        if other.minimum_versions.msvc.is_some() {
            self.minimum_versions.msvc = other.minimum_versions.msvc;
        }
        if other.minimum_versions.visual_studio.is_some() {
            self.minimum_versions.visual_studio = other.minimum_versions.visual_studio;
        }
        if other.minimum_versions.windows_sdk.is_some() {
            self.minimum_versions.windows_sdk = other.minimum_versions.windows_sdk;
        }
        if other.minimum_versions.clang.is_some() {
            self.minimum_versions.clang = other.minimum_versions.clang;
        }
        if other.minimum_versions.apple_clang.is_some() {
            self.minimum_versions.apple_clang = other.minimum_versions.apple_clang;
        }
        if other.build.compile_commands {
            self.build.compile_commands = true;
        }

        let mut toolchains = other.toolchains;
        toolchains.append(&mut self.toolchains);
        self.toolchains = toolchains;
    }

    /// The immutable build context these settings describe.
    pub fn build_context(&self) -> Result<BuildContext> {
        let defaults = BuildContext::default();
        let build = &self.build;
        Ok(BuildContext {
            mode: build.mode.unwrap_or(defaults.mode),
            c_std: build.c_std.unwrap_or(defaults.c_std),
            cxx_std: build.cxx_std.unwrap_or(defaults.cxx_std),
            warning_level: build.warning_level.unwrap_or(defaults.warning_level),
            exceptions: build.exceptions.unwrap_or(defaults.exceptions),
            rtti: build.rtti.unwrap_or(defaults.rtti),
            develop_optimization: build
                .develop_optimization
                .unwrap_or(defaults.develop_optimization),
            minimum_versions: self.minimum_versions()?,
        })
    }

    fn minimum_versions(&self) -> Result<MinimumVersions> {
        let mut mins = MinimumVersions::default();
        let cfg = &self.minimum_versions;
        for (key, text, slot) in [
            ("msvc", &cfg.msvc, &mut mins.msvc),
            ("visual_studio", &cfg.visual_studio, &mut mins.visual_studio),
            ("windows_sdk", &cfg.windows_sdk, &mut mins.windows_sdk),
            ("clang", &cfg.clang, &mut mins.clang),
            ("apple_clang", &cfg.apple_clang, &mut mins.apple_clang),
        ] {
            if let Some(text) = text {
                match parse_version_lenient(text) {
                    Some(v) => *slot = v,
                    None => bail!("invalid version `{}` for minimum_versions.{}", text, key),
                }
            }
        }
        Ok(mins)
    }

    /// Configured toolchain installations, in priority order.
    pub fn installations(
        &self,
        host: Platform,
        host_arch: Architecture,
    ) -> Result<Vec<Installation>> {
        self.toolchains
            .iter()
            .map(|entry| {
                entry
                    .to_installation(host, host_arch)
                    .map_err(anyhow::Error::from)
            })
            .collect()
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.kiln/config.toml)
/// 2. Global config (~/.kiln/config.toml)
/// 3. Defaults
///
/// A broken global file is skipped with a warning; a broken project file
/// is an error.
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_path.filter(|p| p.exists()) {
        match Config::load(global_path) {
            Ok(global) => config.merge(global),
            Err(e) => tracing::warn!("ignoring global config: {:#}", e),
        }
    }

    if project_path.exists() {
        config.merge(Config::load(project_path)?);
    }

    Ok(config)
}

/// Get the global kiln config directory (~/.kiln).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(CONFIG_DIR))
}

/// Get the global config path (~/.kiln/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.kiln/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR).join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.build.mode.is_none());
        assert!(config.toolchains.is_empty());
        assert_eq!(config.build_context().unwrap(), BuildContext::default());
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[build]
mode = "release"
cxx_std = "c++17"
warning_level = "w4"
exceptions = true

[minimum_versions]
clang = "18"
msvc = "14.30"
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        let ctx = config.build_context().unwrap();
        assert_eq!(ctx.mode, BuildMode::Release);
        assert_eq!(ctx.cxx_std, CxxStandard::Cxx17);
        assert_eq!(ctx.warning_level, WarningLevel::W4);
        assert!(ctx.exceptions);
        assert!(ctx.rtti);
        assert_eq!(ctx.minimum_versions.clang, Version::new(18, 0, 0));
        assert_eq!(ctx.minimum_versions.msvc, Version::new(14, 30, 0));
    }

    #[test]
    fn test_bad_minimum_version_is_an_error() {
        let mut config = Config::default();
        config.minimum_versions.clang = Some("latest".to_string());
        let err = config.build_context().unwrap_err();
        assert!(err.to_string().contains("minimum_versions.clang"));
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.build.mode = Some(BuildMode::Debug);
        base.build.rtti = Some(false);
        base.toolchains.push(ToolchainEntry {
            name: Some("global".into()),
            ..Default::default()
        });

        let mut override_cfg = Config::default();
        override_cfg.build.mode = Some(BuildMode::Release);
        override_cfg.toolchains.push(ToolchainEntry {
            name: Some("project".into()),
            ..Default::default()
        });

        base.merge(override_cfg);

        assert_eq!(base.build.mode, Some(BuildMode::Release));
        assert_eq!(base.build.rtti, Some(false)); // Not overridden
        let names: Vec<_> = base.toolchains.iter().map(|t| t.label()).collect();
        assert_eq!(names, ["project", "global"]);
    }

    #[test]
    fn test_load_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("global.toml");
        let project_path = tmp.path().join("project.toml");

        std::fs::write(&global_path, "[build]\nmode = \"debug\"\nc_std = \"c17\"\n").unwrap();
        std::fs::write(&project_path, "[build]\nmode = \"release\"\n").unwrap();

        let config = load_config(Some(&global_path), &project_path).unwrap();
        assert_eq!(config.build.mode, Some(BuildMode::Release));
        assert_eq!(config.build.c_std, Some(CStandard::C17));
    }

    #[test]
    fn test_broken_global_is_skipped_but_project_fails() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("global.toml");
        let project_path = tmp.path().join("project.toml");
        std::fs::write(&global_path, "[build\n").unwrap();

        let config = load_config(Some(&global_path), &project_path).unwrap();
        assert!(config.build.mode.is_none());

        std::fs::write(&project_path, "[build]\nmode = 3\n").unwrap();
        assert!(load_config(Some(&global_path), &project_path).is_err());
    }

    #[test]
    fn test_clang_toolchain_entry() {
        let config: Config = toml::from_str(
            r#"
[[toolchain]]
name = "llvm20"
family = "clang"
compiler = "/opt/llvm/bin/clang"
archiver = "/opt/llvm/bin/llvm-ar"
version = "20.1"
arch = "arm64"
"#,
        )
        .unwrap();

        let installs = config
            .installations(Platform::Linux, Architecture::X64)
            .unwrap();
        let Installation::Clang(clang) = &installs[0] else {
            panic!("expected clang, got {:?}", installs[0]);
        };
        assert_eq!(clang.name.as_deref(), Some("llvm20"));
        assert_eq!(clang.cxx_compiler, PathBuf::from("/opt/llvm/bin/clang"));
        assert_eq!(clang.version, Version::new(20, 1, 0));
        assert_eq!(clang.platform, Platform::Linux);
        assert_eq!(clang.host_arch, Architecture::X64);
        assert_eq!(clang.target_arch, Architecture::Arm64);
    }

    #[test]
    fn test_msvc_toolchain_entry() {
        let config: Config = toml::from_str(
            r#"
[[toolchain]]
family = "msvc"
version = "14.38.33130"
tools_dir = "C:/VS/VC/Tools/MSVC/14.38.33130"
visual_studio_version = "17.8"
sdk_root = "C:/Program Files (x86)/Windows Kits/10"
sdk_version = "10.0.22621.0"
"#,
        )
        .unwrap();

        let installs = config
            .installations(Platform::Windows, Architecture::X64)
            .unwrap();
        let Installation::Msvc(msvc) = &installs[0] else {
            panic!("expected msvc");
        };
        assert_eq!(msvc.version, Version::new(14, 38, 33130));
        assert_eq!(msvc.sdk.as_ref().unwrap().version, Version::new(10, 0, 22621));
        assert_eq!(msvc.target_arch, Architecture::X64);
    }

    #[test]
    fn test_incomplete_toolchain_entry() {
        let entry = ToolchainEntry {
            name: Some("broken".into()),
            family: Some(ToolchainFamily::Clang),
            version: Some("20".into()),
            ..Default::default()
        };
        assert_eq!(
            entry.to_installation(Platform::Linux, Architecture::X64),
            Err(DiscoveryError::InvalidInstallation {
                name: "broken".into(),
                reason: "missing `compiler`".into()
            })
        );
    }
}
