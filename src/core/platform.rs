//! Target operating systems and CPU architectures.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::builder::toolchain::DiscoveryError;

/// Operating system a toolchain produces code for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Windows,
    #[serde(alias = "darwin")]
    MacOS,
    IOS,
}

impl Platform {
    /// Detect the platform kiln itself is running on.
    pub fn host() -> Result<Platform, DiscoveryError> {
        match std::env::consts::OS {
            "linux" => Ok(Platform::Linux),
            "windows" => Ok(Platform::Windows),
            "macos" => Ok(Platform::MacOS),
            other => Err(DiscoveryError::UnsupportedHost {
                os: other.to_string(),
                arch: std::env::consts::ARCH.to_string(),
            }),
        }
    }

    pub fn is_apple(&self) -> bool {
        matches!(self, Platform::MacOS | Platform::IOS)
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::MacOS => "macos",
            Platform::IOS => "ios",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(Platform::Linux),
            "windows" | "win32" => Ok(Platform::Windows),
            "macos" | "darwin" => Ok(Platform::MacOS),
            "ios" => Ok(Platform::IOS),
            _ => Err(format!(
                "unknown platform `{}`, expected one of: linux, windows, macos, ios",
                s
            )),
        }
    }
}

/// CPU architecture a toolchain produces code for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[serde(alias = "x86_64", alias = "amd64")]
    X64,
    #[serde(alias = "aarch64")]
    Arm64,
}

impl Architecture {
    /// Detect the architecture kiln itself is running on.
    pub fn host() -> Result<Architecture, DiscoveryError> {
        match std::env::consts::ARCH {
            "x86_64" => Ok(Architecture::X64),
            "aarch64" => Ok(Architecture::Arm64),
            other => Err(DiscoveryError::UnsupportedHost {
                os: std::env::consts::OS.to_string(),
                arch: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::X64 => "x64",
            Architecture::Arm64 => "arm64",
        }
    }

    /// Directory name MSVC uses for this architecture (`x64`, `arm64`).
    pub fn msvc_dir(&self) -> &'static str {
        self.as_str()
    }

    /// Architecture component of an LLVM target triple.
    pub fn llvm_name(&self) -> &'static str {
        match self {
            Architecture::X64 => "x86_64",
            Architecture::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x64" | "x86_64" | "amd64" => Ok(Architecture::X64),
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            _ => Err(format!(
                "unknown architecture `{}`, expected x64 or arm64",
                s
            )),
        }
    }
}
