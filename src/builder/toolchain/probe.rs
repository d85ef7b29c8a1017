//! Host probing: finding compiler installations on this machine.
//!
//! Probing is the only part of discovery that touches the filesystem,
//! the environment, or spawns processes. It hands back already-located
//! installations; turning them into toolchains and validating them is
//! done elsewhere, so tests substitute a [`FixedProbe`].

use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use regex::Regex;
use tracing::{debug, warn};

use crate::builder::toolchain::clang::{clang_toolchain, ClangInstallation};
use crate::builder::toolchain::msvc::{
    host_dir_name, msvc_toolchain, MsvcInstallation, WindowsSdk, ASAN_LIBRARIES,
};
use crate::builder::toolchain::Toolchain;
use crate::core::context::BuildContext;
use crate::core::platform::{Architecture, Platform};
use crate::core::version::{parse_version_lenient, Version};
use crate::util::fs::normalize_path;
use crate::util::process::{find_executable, ProcessBuilder};

/// A compiler installation located on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Installation {
    Msvc(MsvcInstallation),
    Clang(ClangInstallation),
}

impl Installation {
    /// Short label for log messages.
    pub fn label(&self) -> String {
        match self {
            Installation::Msvc(m) => m
                .name
                .clone()
                .unwrap_or_else(|| format!("msvc {} ({})", m.version, m.bin_dir().display())),
            Installation::Clang(c) => c
                .name
                .clone()
                .unwrap_or_else(|| format!("clang {} ({})", c.version, c.compiler.display())),
        }
    }

    pub fn to_toolchain(&self, ctx: &BuildContext) -> Toolchain {
        match self {
            Installation::Msvc(m) => msvc_toolchain(m, ctx),
            Installation::Clang(c) => clang_toolchain(c, ctx),
        }
    }
}

/// Source of compiler installations.
pub trait HostProbe: Send + Sync {
    /// Installations usable on `host`. Failures are logged and skipped.
    fn probe(&self, host: Platform, host_arch: Architecture) -> Vec<Installation>;
}

/// A probe that returns a fixed list.
#[derive(Debug, Clone, Default)]
pub struct FixedProbe {
    installations: Vec<Installation>,
}

impl FixedProbe {
    pub fn new(installations: Vec<Installation>) -> Self {
        FixedProbe { installations }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl HostProbe for FixedProbe {
    fn probe(&self, _host: Platform, _host_arch: Architecture) -> Vec<Installation> {
        self.installations.clone()
    }
}

/// Probe the real machine.
///
/// On Windows this reads the environment a Developer Command Prompt sets
/// up; elsewhere it looks for `clang` on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl HostProbe for SystemProbe {
    fn probe(&self, host: Platform, host_arch: Architecture) -> Vec<Installation> {
        match host {
            Platform::Windows => probe_msvc_environment(host_arch),
            _ => probe_clang(host, host_arch),
        }
    }
}

/// Host/target directory pairs shipped by MSVC.
pub const MSVC_HOST_TARGET_PAIRS: [(Architecture, Architecture); 4] = [
    (Architecture::X64, Architecture::X64),
    (Architecture::X64, Architecture::Arm64),
    (Architecture::Arm64, Architecture::Arm64),
    (Architecture::Arm64, Architecture::X64),
];

fn probe_msvc_environment(host_arch: Architecture) -> Vec<Installation> {
    let Ok(tools_dir) = env::var("VCToolsInstallDir") else {
        debug!("VCToolsInstallDir is not set; run kiln from a Developer Command Prompt to use MSVC");
        return Vec::new();
    };
    let tools_dir = PathBuf::from(tools_dir.trim_end_matches(['\\', '/']));

    let version_text = env::var("VCToolsVersion").ok().or_else(|| {
        tools_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    });
    let Some(version) = version_text.as_deref().and_then(parse_version_lenient) else {
        warn!(
            "could not determine the MSVC version for {}; skipping",
            tools_dir.display()
        );
        return Vec::new();
    };

    let visual_studio_version = env::var("VisualStudioVersion")
        .ok()
        .and_then(|v| parse_version_lenient(&v));
    let sdk = probe_windows_sdk();
    if sdk.is_none() {
        debug!("WindowsSdkDir/WindowsSDKVersion not set");
    }

    MSVC_HOST_TARGET_PAIRS
        .iter()
        .filter(|(host, _)| *host == host_arch)
        .filter_map(|&(host, target)| {
            let bin_dir = tools_dir
                .join("bin")
                .join(host_dir_name(host))
                .join(target.msvc_dir());
            if !bin_dir.join("cl.exe").is_file() {
                debug!("no cl.exe in {}", bin_dir.display());
                return None;
            }
            let lib_dir = tools_dir.join("lib").join(target.msvc_dir());
            let has_asan = ASAN_LIBRARIES.iter().all(|lib| lib_dir.join(lib).is_file());
            Some(Installation::Msvc(MsvcInstallation {
                name: None,
                tools_dir: tools_dir.clone(),
                version: version.clone(),
                visual_studio_version: visual_studio_version.clone(),
                sdk: sdk.clone(),
                host_arch: host,
                target_arch: target,
                has_asan,
                extra_include_dirs: Vec::new(),
                extra_library_dirs: Vec::new(),
            }))
        })
        .collect()
}

fn probe_windows_sdk() -> Option<WindowsSdk> {
    let root = env::var("WindowsSdkDir").ok()?;
    let version_dir = env::var("WindowsSDKVersion").ok()?;
    let version_dir = version_dir.trim().trim_end_matches(['\\', '/']).to_string();
    let version = parse_version_lenient(&version_dir)?;
    Some(WindowsSdk {
        root: PathBuf::from(root.trim_end_matches(['\\', '/'])),
        version_dir,
        version,
    })
}

/// Clang executables looked up on PATH, newest first after the default.
const CLANG_CANDIDATES: [&str; 4] = ["clang", "clang-22", "clang-21", "clang-20"];

fn probe_clang(host: Platform, host_arch: Architecture) -> Vec<Installation> {
    let mut seen = HashSet::new();
    let found: Vec<PathBuf> = CLANG_CANDIDATES
        .iter()
        .filter_map(|name| find_executable(name))
        .filter(|path| seen.insert(normalize_path(path)))
        .collect();

    if found.is_empty() {
        debug!("no clang found on PATH");
    }

    found
        .par_iter()
        .filter_map(|compiler| probe_clang_binary(compiler, host, host_arch))
        .map(Installation::Clang)
        .collect()
}

fn probe_clang_binary(
    compiler: &Path,
    host: Platform,
    host_arch: Architecture,
) -> Option<ClangInstallation> {
    let macros = match ProcessBuilder::new(compiler)
        .args(["-dM", "-E", "-x", "c", "-"])
        .stdin("")
        .exec_stdout()
    {
        Ok(out) => out,
        Err(e) => {
            warn!("failed to query {}: {:#}", compiler.display(), e);
            return None;
        }
    };

    let Some(identity) = parse_clang_macros(&macros) else {
        warn!(
            "{} did not report a clang version; skipping",
            compiler.display()
        );
        return None;
    };

    let suffix = compiler
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("clang"))
        .unwrap_or("");
    let cxx_compiler = sibling(compiler, &format!("clang++{}", suffix))
        .or_else(|| find_executable("clang++"))
        .unwrap_or_else(|| compiler.to_path_buf());

    let Some(archiver) = sibling(compiler, &format!("llvm-ar{}", suffix))
        .or_else(|| find_executable("llvm-ar"))
        .or_else(|| find_executable("ar"))
    else {
        warn!("no archiver found for {}; skipping", compiler.display());
        return None;
    };
    let stripper = find_executable("llvm-strip").or_else(|| find_executable("strip"));

    let sysroot = if host == Platform::MacOS {
        ProcessBuilder::new("xcrun")
            .arg("--show-sdk-path")
            .exec_stdout()
            .ok()
            .map(|s| PathBuf::from(s.trim()))
            .filter(|p| !p.as_os_str().is_empty())
    } else {
        None
    };

    debug!(
        "found {} {} at {}",
        if identity.apple { "Apple Clang" } else { "Clang" },
        identity.version,
        compiler.display()
    );

    Some(ClangInstallation {
        name: None,
        compiler: compiler.to_path_buf(),
        cxx_compiler,
        archiver,
        stripper,
        version: identity.version,
        apple: identity.apple,
        platform: host,
        host_arch,
        target_arch: host_arch,
        sysroot,
        deployment_target: None,
        has_asan: false,
        extra_include_dirs: Vec::new(),
        extra_library_dirs: Vec::new(),
    })
}

fn sibling(path: &Path, name: &str) -> Option<PathBuf> {
    let candidate = path.parent()?.join(name);
    candidate.is_file().then_some(candidate)
}

/// Version information recovered from a clang macro dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClangIdentity {
    pub version: Version,
    pub apple: bool,
}

/// Parse `clang -dM -E` output.
///
/// Returns `None` when `__clang_major__` is absent (e.g. the binary is
/// really gcc).
pub fn parse_clang_macros(text: &str) -> Option<ClangIdentity> {
    let re = Regex::new(
        r"(?m)^#define\s+(__clang_major__|__clang_minor__|__clang_patchlevel__|__apple_build_version__)\s+(\d+)",
    )
    .ok()?;

    let mut major = None;
    let mut minor = 0;
    let mut patch = 0;
    let mut apple = false;
    for cap in re.captures_iter(text) {
        let value: u64 = cap[2].parse().ok()?;
        match &cap[1] {
            "__clang_major__" => major = Some(value),
            "__clang_minor__" => minor = value,
            "__clang_patchlevel__" => patch = value,
            _ => apple = true,
        }
    }

    Some(ClangIdentity {
        version: Version::new(major?, minor, patch),
        apple,
    })
}
