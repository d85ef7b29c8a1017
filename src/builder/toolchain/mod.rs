//! Toolchain model for C/C++ compilers.
//!
//! A `Toolchain` is plain data: tool paths, file-naming conventions, base
//! option lists, and per-build-mode tables. Everything family-specific
//! about spelling a command line lives in `FlagSyntax`, so consumers never
//! branch on the compiler family to format an include directory or a
//! library.
//!
//! Toolchain discovery priority:
//! 1. `[[toolchain]]` entries from `.kiln/config.toml` or `~/.kiln/config.toml`
//! 2. Host probing (Developer Command Prompt environment, `clang` on PATH)

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use miette::Diagnostic as MietteDiagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::header_probe::HeaderCache;
use crate::core::context::{BuildContext, BuildMode};
use crate::core::platform::{Architecture, Platform};
use crate::core::target::{Define, TargetKind};
use crate::core::version::{meets_minimum, Version};
use crate::util::fs::nest_path;

mod clang;
mod discover;
mod msvc;
mod probe;

pub use clang::{clang_toolchain, ClangInstallation};
pub use discover::{discover_system_toolchains, probe_toolchains, select_toolchain};
pub use msvc::{msvc_toolchain, MsvcInstallation, WindowsSdk};
pub use probe::{FixedProbe, HostProbe, Installation, SystemProbe};

/// Errors raised while discovering or validating toolchains.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum DiscoveryError {
    #[error("host `{os}/{arch}` is not supported")]
    #[diagnostic(
        code(kiln::toolchain::unsupported_host),
        help("kiln runs on Windows, Linux and macOS hosts with x64 or arm64 CPUs")
    )]
    UnsupportedHost { os: String, arch: String },

    #[error("{component} {found} in `{toolchain}` is older than the required {minimum}")]
    #[diagnostic(
        code(kiln::toolchain::below_minimum_version),
        help("install a newer {component} or lower `[minimum_versions]` in .kiln/config.toml")
    )]
    BelowMinimumVersion {
        toolchain: String,
        component: &'static str,
        found: Version,
        minimum: Version,
    },

    #[error("toolchain `{toolchain}` requires the {sdk}, which was not found")]
    #[diagnostic(code(kiln::toolchain::missing_sdk))]
    MissingSdk { toolchain: String, sdk: &'static str },

    #[error("invalid toolchain installation `{name}`: {reason}")]
    #[diagnostic(code(kiln::toolchain::invalid_installation))]
    InvalidInstallation { name: String, reason: String },
}

/// Closed set of supported compiler families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolchainFamily {
    Msvc,
    /// Clang without a platform-specific flavour (e.g. clang on Windows).
    Clang,
    ClangLinux,
    #[serde(rename = "clang-macos")]
    ClangMacOS,
    #[serde(rename = "clang-ios")]
    ClangIOS,
}

impl ToolchainFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainFamily::Msvc => "msvc",
            ToolchainFamily::Clang => "clang",
            ToolchainFamily::ClangLinux => "clang-linux",
            ToolchainFamily::ClangMacOS => "clang-macos",
            ToolchainFamily::ClangIOS => "clang-ios",
        }
    }

    pub fn is_msvc(&self) -> bool {
        matches!(self, ToolchainFamily::Msvc)
    }

    pub fn is_clang(&self) -> bool {
        !self.is_msvc()
    }

    /// Clang family for code targeting `platform`.
    pub fn clang_for(platform: Platform) -> Self {
        match platform {
            Platform::Linux => ToolchainFamily::ClangLinux,
            Platform::MacOS => ToolchainFamily::ClangMacOS,
            Platform::IOS => ToolchainFamily::ClangIOS,
            Platform::Windows => ToolchainFamily::Clang,
        }
    }

    /// Command-line spelling used by this family.
    pub fn syntax(&self) -> &'static FlagSyntax {
        if self.is_msvc() {
            &MSVC_SYNTAX
        } else {
            &GNU_SYNTAX
        }
    }
}

impl fmt::Display for ToolchainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolchainFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "msvc" => Ok(ToolchainFamily::Msvc),
            "clang" => Ok(ToolchainFamily::Clang),
            "clang-linux" => Ok(ToolchainFamily::ClangLinux),
            "clang-macos" => Ok(ToolchainFamily::ClangMacOS),
            "clang-ios" => Ok(ToolchainFamily::ClangIOS),
            _ => Err(format!(
                "unknown toolchain family `{}`, expected one of: msvc, clang, clang-linux, clang-macos, clang-ios",
                s
            )),
        }
    }
}

/// How the compiler reports header dependencies to Ninja.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyStyle {
    /// `/showIncludes` parsed by Ninja (`deps = msvc`).
    Msvc,
    /// Makefile-style depfile (`deps = gcc`).
    Gcc,
}

impl DependencyStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyStyle::Msvc => "msvc",
            DependencyStyle::Gcc => "gcc",
        }
    }
}

/// How a bare library name is turned into a linker argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryStyle {
    /// `foo` -> `foo.lib`
    Msvc,
    /// `foo` -> `-lfoo`
    Gnu,
}

/// Family-specific command-line spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSyntax {
    pub include_prefix: &'static str,
    pub define_prefix: &'static str,
    pub lib_dir_prefix: &'static str,
    /// Object output, with `$out` standing for the path.
    pub compile_output: &'static str,
    /// Linker output, with `$out` standing for the path.
    pub link_output: &'static str,
    pub library_style: LibraryStyle,
    pub dependency_style: DependencyStyle,
}

pub static MSVC_SYNTAX: FlagSyntax = FlagSyntax {
    include_prefix: "/I",
    define_prefix: "/D",
    lib_dir_prefix: "/LIBPATH:",
    compile_output: "/Fo$out",
    link_output: "/OUT:$out",
    library_style: LibraryStyle::Msvc,
    dependency_style: DependencyStyle::Msvc,
};

pub static GNU_SYNTAX: FlagSyntax = FlagSyntax {
    include_prefix: "-I",
    define_prefix: "-D",
    lib_dir_prefix: "-L",
    compile_output: "-o $out",
    link_output: "-o $out",
    library_style: LibraryStyle::Gnu,
    dependency_style: DependencyStyle::Gcc,
};

impl FlagSyntax {
    pub fn include(&self, dir: &Path) -> String {
        format!("{}{}", self.include_prefix, dir.display())
    }

    pub fn define(&self, define: &Define) -> String {
        define.render(self.define_prefix)
    }

    pub fn lib_dir(&self, dir: &Path) -> String {
        format!("{}{}", self.lib_dir_prefix, dir.display())
    }

    /// Format a library given by name or path.
    ///
    /// Anything that already looks like a file or a flag is passed through.
    pub fn library(&self, lib: &str) -> String {
        let looks_like_path = lib.contains('/') || lib.contains('\\');
        match self.library_style {
            LibraryStyle::Msvc => {
                if looks_like_path || lib.to_ascii_lowercase().ends_with(".lib") {
                    lib.to_string()
                } else {
                    format!("{}.lib", lib)
                }
            }
            LibraryStyle::Gnu => {
                let is_file = [".a", ".so", ".dylib", ".tbd"]
                    .iter()
                    .any(|ext| lib.ends_with(ext))
                    || lib.contains(".so.");
                if looks_like_path || is_file || lib.starts_with('-') {
                    lib.to_string()
                } else {
                    format!("-l{}", lib)
                }
            }
        }
    }
}

/// One value per build mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeTable<T> {
    pub debug: T,
    pub develop: T,
    pub release: T,
}

impl<T> ModeTable<T> {
    pub fn new(debug: T, develop: T, release: T) -> Self {
        ModeTable {
            debug,
            develop,
            release,
        }
    }

    pub fn get(&self, mode: BuildMode) -> &T {
        match mode {
            BuildMode::Debug => &self.debug,
            BuildMode::Develop => &self.develop,
            BuildMode::Release => &self.release,
        }
    }
}

/// A fully described compiler installation for one target platform and
/// architecture.
///
/// Built once by [`msvc_toolchain`] or [`clang_toolchain`] and shared
/// behind an `Arc`; nothing mutates it afterwards except the header-probe
/// cache, which is internally synchronised.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub name: String,
    pub description: String,
    pub family: ToolchainFamily,
    pub platform: Platform,
    pub arch: Architecture,
    pub host_arch: Architecture,
    pub is_cross_compiler: bool,

    pub version: Version,
    /// Apple Clang reports Xcode-aligned versions.
    pub apple_clang: bool,
    pub visual_studio_version: Option<Version>,
    pub sdk_version: Option<Version>,
    pub sysroot: Option<PathBuf>,

    pub bin_dir: PathBuf,
    pub compiler: PathBuf,
    pub cxx_compiler: PathBuf,
    pub linker: PathBuf,
    pub archiver: PathBuf,
    pub stripper: Option<PathBuf>,

    pub object_extension: &'static str,
    pub static_lib_extension: &'static str,
    pub shared_lib_extension: &'static str,
    /// Empty on platforms where executables carry no extension.
    pub executable_extension: &'static str,
    pub import_lib_extension: &'static str,
    pub static_lib_prefix: &'static str,
    pub shared_lib_prefix: &'static str,
    pub export_marker: &'static str,
    pub import_marker: &'static str,
    pub has_import_libs: bool,
    pub has_asan: bool,

    pub defines: Vec<Define>,
    pub libraries: Vec<String>,
    pub system_include_dirs: Vec<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
    pub c_flags: Vec<String>,
    pub cxx_flags: Vec<String>,
    pub compiler_options: Vec<String>,
    pub linker_options: Vec<String>,
    pub archiver_options: Vec<String>,
    pub stripper_options: Vec<String>,

    pub mode_defines: ModeTable<Vec<Define>>,
    pub mode_libraries: ModeTable<Vec<String>>,
    pub mode_compiler_options: ModeTable<Vec<String>>,
    pub mode_linker_options: ModeTable<Vec<String>>,
    pub mode_archiver_options: ModeTable<Vec<String>>,
    /// Runtime libraries to copy next to binaries, per mode.
    pub deploy_libraries: ModeTable<Vec<PathBuf>>,

    pub(crate) header_cache: HeaderCache,
}

impl Toolchain {
    pub fn syntax(&self) -> &'static FlagSyntax {
        self.family.syntax()
    }

    /// File name of the artifact a target of `kind` produces, if any.
    pub fn artifact_name(&self, kind: TargetKind, name: &str) -> Option<String> {
        match kind {
            TargetKind::Binary => Some(if self.executable_extension.is_empty() {
                name.to_string()
            } else {
                format!("{}.{}", name, self.executable_extension)
            }),
            TargetKind::StaticLibrary => Some(format!(
                "{}{}.{}",
                self.static_lib_prefix, name, self.static_lib_extension
            )),
            TargetKind::SharedLibrary | TargetKind::DynamicLibrary => Some(format!(
                "{}{}.{}",
                self.shared_lib_prefix, name, self.shared_lib_extension
            )),
            _ => None,
        }
    }

    /// Import library written alongside a shared library, where the
    /// platform uses them.
    pub fn import_library_name(&self, name: &str) -> Option<String> {
        self.has_import_libs
            .then(|| format!("{}.{}", name, self.import_lib_extension))
    }

    /// Object file path for `source`, relative to the target's object dir.
    ///
    /// The source extension is kept (`main.cpp` -> `main.cpp.obj`) so
    /// `foo.c` and `foo.cpp` in one target do not collide.
    pub fn object_name(&self, source: &Path) -> PathBuf {
        let mut nested = nest_path(source).into_os_string();
        nested.push(".");
        nested.push(self.object_extension);
        PathBuf::from(nested)
    }

    /// Check version floors and required SDKs.
    pub fn validate(&self, ctx: &BuildContext) -> Result<(), DiscoveryError> {
        let mins = &ctx.minimum_versions;
        let (component, minimum) = match self.family {
            ToolchainFamily::Msvc => ("MSVC", &mins.msvc),
            _ if self.apple_clang => ("Apple Clang", &mins.apple_clang),
            _ => ("Clang", &mins.clang),
        };
        self.require_version(component, &self.version, minimum)?;

        match self.family {
            ToolchainFamily::Msvc => {
                if let Some(vs) = &self.visual_studio_version {
                    self.require_version("Visual Studio", vs, &mins.visual_studio)?;
                }
                let sdk = self.sdk_version.as_ref().ok_or(DiscoveryError::MissingSdk {
                    toolchain: self.name.clone(),
                    sdk: "Windows SDK",
                })?;
                self.require_version("Windows SDK", sdk, &mins.windows_sdk)?;
            }
            ToolchainFamily::ClangIOS => {
                if self.sysroot.is_none() {
                    return Err(DiscoveryError::MissingSdk {
                        toolchain: self.name.clone(),
                        sdk: "iPhoneOS SDK",
                    });
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// `validate` as a `(valid, message)` pair for reporting.
    pub fn validation(&self, ctx: &BuildContext) -> (bool, String) {
        match self.validate(ctx) {
            Ok(()) => (true, String::new()),
            Err(e) => (false, e.to_string()),
        }
    }

    fn require_version(
        &self,
        component: &'static str,
        found: &Version,
        minimum: &Version,
    ) -> Result<(), DiscoveryError> {
        if meets_minimum(found, minimum) {
            Ok(())
        } else {
            Err(DiscoveryError::BelowMinimumVersion {
                toolchain: self.name.clone(),
                component,
                found: found.clone(),
                minimum: minimum.clone(),
            })
        }
    }
}

/// Defines every toolchain adds per mode.
pub(crate) fn common_mode_defines() -> ModeTable<Vec<Define>> {
    ModeTable::new(
        vec![Define::flag("DEBUG"), Define::flag("KILN_DEBUG")],
        vec![Define::flag("DEBUG"), Define::flag("KILN_DEVELOP")],
        vec![Define::flag("NDEBUG"), Define::flag("KILN_RELEASE")],
    )
}

pub(crate) fn arch_define(arch: Architecture) -> Define {
    match arch {
        Architecture::X64 => Define::flag("KILN_ARCH_X64"),
        Architecture::Arm64 => Define::flag("KILN_ARCH_ARM64"),
    }
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
