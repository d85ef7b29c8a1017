//! Build context - the immutable settings every build step reads.
//!
//! A `BuildContext` is assembled once (defaults, then config files, then
//! command-line overrides) and then passed by reference into toolchain
//! construction, resolution, and synthesis. Nothing mutates it afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::version::Version;

/// Build mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Unoptimized, full debug info, runtime checks.
    Debug,
    /// Debug runtime with light optimization.
    #[default]
    Develop,
    /// Optimized, link-time code generation.
    Release,
}

impl BuildMode {
    pub const ALL: [BuildMode; 3] = [BuildMode::Debug, BuildMode::Develop, BuildMode::Release];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Debug => "debug",
            BuildMode::Develop => "develop",
            BuildMode::Release => "release",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(BuildMode::Debug),
            "develop" | "dev" => Ok(BuildMode::Develop),
            "release" => Ok(BuildMode::Release),
            _ => Err(format!(
                "invalid build mode `{}`, valid values: debug, develop, release",
                s
            )),
        }
    }
}

/// C language standard.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum CStandard {
    #[serde(rename = "c99", alias = "99")]
    C99,
    #[default]
    #[serde(rename = "c11", alias = "11")]
    C11,
    #[serde(rename = "c17", alias = "17", alias = "c18", alias = "18")]
    C17,
}

impl CStandard {
    /// Get the standard as a compiler flag value (e.g., "c11").
    pub fn as_flag_value(&self) -> &'static str {
        match self {
            CStandard::C99 => "c99",
            CStandard::C11 => "c11",
            CStandard::C17 => "c17",
        }
    }
}

impl fmt::Display for CStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag_value())
    }
}

impl FromStr for CStandard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "99" | "c99" => Ok(CStandard::C99),
            "11" | "c11" => Ok(CStandard::C11),
            "17" | "c17" | "18" | "c18" => Ok(CStandard::C17),
            _ => Err(format!(
                "invalid C standard `{}`, valid values: c99, c11, c17",
                s
            )),
        }
    }
}

/// C++ language standard.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum CxxStandard {
    #[serde(rename = "c++14", alias = "14")]
    Cxx14,
    #[serde(rename = "c++17", alias = "17")]
    Cxx17,
    #[default]
    #[serde(rename = "c++20", alias = "20")]
    Cxx20,
    #[serde(rename = "c++23", alias = "23")]
    Cxx23,
}

impl CxxStandard {
    /// Get the standard as a compiler flag value (e.g., "c++17").
    pub fn as_flag_value(&self) -> &'static str {
        match self {
            CxxStandard::Cxx14 => "c++14",
            CxxStandard::Cxx17 => "c++17",
            CxxStandard::Cxx20 => "c++20",
            CxxStandard::Cxx23 => "c++23",
        }
    }

    /// Get the MSVC-style standard flag value ("c++latest" for C++23).
    pub fn as_msvc_flag_value(&self) -> &'static str {
        match self {
            CxxStandard::Cxx14 => "c++14",
            CxxStandard::Cxx17 => "c++17",
            CxxStandard::Cxx20 => "c++20",
            CxxStandard::Cxx23 => "c++latest",
        }
    }
}

impl fmt::Display for CxxStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag_value())
    }
}

impl FromStr for CxxStandard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "14" | "c++14" | "cpp14" => Ok(CxxStandard::Cxx14),
            "17" | "c++17" | "cpp17" => Ok(CxxStandard::Cxx17),
            "20" | "c++20" | "cpp20" => Ok(CxxStandard::Cxx20),
            "23" | "c++23" | "cpp23" => Ok(CxxStandard::Cxx23),
            _ => Err(format!(
                "invalid C++ standard `{}`, valid values: c++14, c++17, c++20, c++23",
                s
            )),
        }
    }
}

/// Compiler warning level, ordered from quietest to loudest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    W0,
    W1,
    W2,
    #[default]
    W3,
    W4,
    All,
}

impl WarningLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningLevel::W0 => "w0",
            WarningLevel::W1 => "w1",
            WarningLevel::W2 => "w2",
            WarningLevel::W3 => "w3",
            WarningLevel::W4 => "w4",
            WarningLevel::All => "all",
        }
    }
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WarningLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "0" | "w0" => Ok(WarningLevel::W0),
            "1" | "w1" => Ok(WarningLevel::W1),
            "2" | "w2" => Ok(WarningLevel::W2),
            "3" | "w3" => Ok(WarningLevel::W3),
            "4" | "w4" => Ok(WarningLevel::W4),
            "all" | "wall" => Ok(WarningLevel::All),
            _ => Err(format!(
                "invalid warning level `{}`, valid values: w0, w1, w2, w3, w4, all",
                s
            )),
        }
    }
}

/// Minimum acceptable versions, per toolchain component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimumVersions {
    pub msvc: Version,
    pub visual_studio: Version,
    pub windows_sdk: Version,
    pub clang: Version,
    /// Apple Clang versions track Xcode, not upstream LLVM.
    pub apple_clang: Version,
}

impl Default for MinimumVersions {
    fn default() -> Self {
        MinimumVersions {
            msvc: Version::new(14, 38, 0),
            visual_studio: Version::new(17, 0, 0),
            windows_sdk: Version::new(10, 0, 18362),
            clang: Version::new(20, 0, 0),
            apple_clang: Version::new(16, 3, 0),
        }
    }
}

/// Immutable global build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub mode: BuildMode,
    pub c_std: CStandard,
    pub cxx_std: CxxStandard,
    pub warning_level: WarningLevel,
    pub exceptions: bool,
    pub rtti: bool,
    /// When false, Develop mode uses exactly Debug's optimization flags.
    pub develop_optimization: bool,
    pub minimum_versions: MinimumVersions,
}

impl Default for BuildContext {
    fn default() -> Self {
        BuildContext {
            mode: BuildMode::default(),
            c_std: CStandard::default(),
            cxx_std: CxxStandard::default(),
            warning_level: WarningLevel::default(),
            exceptions: false,
            rtti: true,
            develop_optimization: true,
            minimum_versions: MinimumVersions::default(),
        }
    }
}

impl BuildContext {
    /// A copy of this context building in `mode`.
    pub fn with_mode(&self, mode: BuildMode) -> Self {
        BuildContext {
            mode,
            ..self.clone()
        }
    }

    pub fn is_release(&self) -> bool {
        self.mode == BuildMode::Release
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_mode_parse() {
        assert_eq!("release".parse::<BuildMode>().unwrap(), BuildMode::Release);
        assert_eq!("Dev".parse::<BuildMode>().unwrap(), BuildMode::Develop);
        assert!("fast".parse::<BuildMode>().is_err());
    }

    #[test]
    fn test_standards_parse() {
        assert_eq!("17".parse::<CxxStandard>().unwrap(), CxxStandard::Cxx17);
        assert_eq!("c18".parse::<CStandard>().unwrap(), CStandard::C17);
        assert_eq!(CxxStandard::Cxx23.as_msvc_flag_value(), "c++latest");
    }

    #[test]
    fn test_warning_levels_are_ordered() {
        assert!(WarningLevel::W0 < WarningLevel::W3);
        assert!(WarningLevel::W4 < WarningLevel::All);
    }

    #[test]
    fn test_with_mode_leaves_original_untouched() {
        let ctx = BuildContext::default();
        let release = ctx.with_mode(BuildMode::Release);
        assert_eq!(ctx.mode, BuildMode::Develop);
        assert!(release.is_release());
        assert_eq!(release.cxx_std, ctx.cxx_std);
    }

    #[test]
    fn test_default_minimums() {
        let mins = MinimumVersions::default();
        assert_eq!(mins.msvc, Version::new(14, 38, 0));
        assert_eq!(mins.clang, Version::new(20, 0, 0));
    }
}
