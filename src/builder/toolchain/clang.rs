//! Clang toolchain construction (Linux, macOS, iOS and plain clang).

use std::path::PathBuf;

use crate::builder::header_probe::HeaderCache;
use crate::builder::toolchain::{
    arch_define, common_mode_defines, strings, ModeTable, Toolchain, ToolchainFamily,
};
use crate::core::context::{BuildContext, WarningLevel};
use crate::core::platform::{Architecture, Platform};
use crate::core::target::Define;
use crate::core::version::Version;

/// A located clang installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClangInstallation {
    pub name: Option<String>,
    pub compiler: PathBuf,
    pub cxx_compiler: PathBuf,
    pub archiver: PathBuf,
    pub stripper: Option<PathBuf>,
    pub version: Version,
    /// Apple's fork, versioned alongside Xcode.
    pub apple: bool,
    /// Platform the produced code runs on.
    pub platform: Platform,
    pub host_arch: Architecture,
    pub target_arch: Architecture,
    pub sysroot: Option<PathBuf>,
    /// Minimum OS version for Apple platforms.
    pub deployment_target: Option<String>,
    pub has_asan: bool,
    pub extra_include_dirs: Vec<PathBuf>,
    pub extra_library_dirs: Vec<PathBuf>,
}

const DEFAULT_MACOS_DEPLOYMENT_TARGET: &str = "11.0";
const DEFAULT_IOS_DEPLOYMENT_TARGET: &str = "15.0";

/// LLVM target triple for a platform/architecture pair.
pub fn target_triple(platform: Platform, arch: Architecture) -> String {
    match (platform, arch) {
        (Platform::Linux, Architecture::X64) => "x86_64-unknown-linux-gnu".to_string(),
        (Platform::Linux, Architecture::Arm64) => "aarch64-unknown-linux-gnu".to_string(),
        (Platform::MacOS, arch) => format!("{}-apple-macos", arch.llvm_name()),
        (Platform::IOS, arch) => format!("{}-apple-ios", arch.llvm_name()),
        (Platform::Windows, Architecture::X64) => "x86_64-pc-windows-msvc".to_string(),
        (Platform::Windows, Architecture::Arm64) => "aarch64-pc-windows-msvc".to_string(),
    }
}

/// Build the toolchain for one clang installation.
pub fn clang_toolchain(install: &ClangInstallation, ctx: &BuildContext) -> Toolchain {
    let platform = install.platform;
    let arch = install.target_arch;
    let family = ToolchainFamily::clang_for(platform);
    let is_cross = install.host_arch != arch;
    let windows = platform.is_windows();
    let apple = platform.is_apple();

    let name = install
        .name
        .clone()
        .unwrap_or_else(|| format!("{}-{}-{}", family, install.version, arch));
    let vendor = if install.apple { "Apple Clang" } else { "Clang" };
    let mut description = format!("{} {} targeting {}-{}", vendor, install.version, platform, arch);
    if is_cross {
        description.push_str(&format!(" (cross from {})", install.host_arch));
    }

    let mut defines = vec![
        Define::flag(match platform {
            Platform::Linux => "KILN_PLATFORM_LINUX",
            Platform::MacOS => "KILN_PLATFORM_MACOS",
            Platform::IOS => "KILN_PLATFORM_IOS",
            Platform::Windows => "KILN_PLATFORM_WIN32",
        }),
        arch_define(arch),
    ];
    if windows {
        defines.push(Define::flag("_WIN32"));
    }

    // Options that belong on both the compile and the link line.
    let mut target_options = Vec::new();
    if is_cross {
        target_options.push(format!("--target={}", target_triple(platform, arch)));
    }
    match platform {
        Platform::MacOS => target_options.push(format!(
            "-mmacosx-version-min={}",
            install
                .deployment_target
                .as_deref()
                .unwrap_or(DEFAULT_MACOS_DEPLOYMENT_TARGET)
        )),
        Platform::IOS => target_options.push(format!(
            "-miphoneos-version-min={}",
            install
                .deployment_target
                .as_deref()
                .unwrap_or(DEFAULT_IOS_DEPLOYMENT_TARGET)
        )),
        _ => {}
    }
    if let Some(sysroot) = &install.sysroot {
        let flag = if apple { "-isysroot" } else { "--sysroot" };
        target_options.push(flag.to_string());
        target_options.push(sysroot.display().to_string());
    }

    let mut compiler_options = target_options.clone();
    compiler_options.extend(strings(warning_flags(ctx.warning_level)));
    compiler_options.push("-fvisibility=hidden".to_string());
    if !windows {
        compiler_options.push("-fPIC".to_string());
    }

    let c_flags = vec![format!("-std={}", ctx.c_std.as_flag_value())];
    let mut cxx_flags = vec![format!("-std={}", ctx.cxx_std.as_flag_value())];
    if !ctx.exceptions {
        cxx_flags.push("-fno-exceptions".to_string());
    }
    if !ctx.rtti {
        cxx_flags.push("-fno-rtti".to_string());
    }

    let libraries = match platform {
        Platform::Linux => strings(&["pthread", "dl", "m"]),
        _ => Vec::new(),
    };

    let debug_opt = strings(&["-O0", "-g", "-fno-omit-frame-pointer"]);
    let mut debug_compile = debug_opt.clone();
    let mut debug_link = Vec::new();
    if install.has_asan {
        debug_compile.push("-fsanitize=address,undefined".to_string());
        debug_link.push("-fsanitize=address,undefined".to_string());
    }
    let develop_compile = if ctx.develop_optimization {
        strings(&["-O1", "-g"])
    } else {
        debug_opt
    };
    let mut release_compile = strings(&["-O2", "-flto=thin"]);
    if !apple {
        release_compile.extend(strings(&["-ffunction-sections", "-fdata-sections"]));
    }
    let release_link = match platform {
        Platform::MacOS | Platform::IOS => strings(&["-flto=thin", "-Wl,-dead_strip"]),
        Platform::Windows => strings(&["-flto=thin", "-Wl,/OPT:REF"]),
        Platform::Linux => strings(&["-flto=thin", "-Wl,--gc-sections"]),
    };

    let (object_extension, static_lib_extension, shared_lib_extension, executable_extension) =
        match platform {
            Platform::Windows => ("obj", "lib", "dll", "exe"),
            Platform::MacOS | Platform::IOS => ("o", "a", "dylib", ""),
            Platform::Linux => ("o", "a", "so", ""),
        };
    let lib_prefix = if windows { "" } else { "lib" };

    let stripper_options = match platform {
        Platform::MacOS | Platform::IOS => strings(&["-x"]),
        _ => strings(&["--strip-unneeded"]),
    };

    Toolchain {
        name,
        description,
        family,
        platform,
        arch,
        host_arch: install.host_arch,
        is_cross_compiler: is_cross,
        version: install.version.clone(),
        apple_clang: install.apple,
        visual_studio_version: None,
        sdk_version: None,
        sysroot: install.sysroot.clone(),
        bin_dir: install
            .compiler
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default(),
        compiler: install.compiler.clone(),
        cxx_compiler: install.cxx_compiler.clone(),
        // The driver links, so the platform linker picks up the runtime.
        linker: install.cxx_compiler.clone(),
        archiver: install.archiver.clone(),
        stripper: install.stripper.clone(),
        object_extension,
        static_lib_extension,
        shared_lib_extension,
        executable_extension,
        import_lib_extension: "lib",
        static_lib_prefix: lib_prefix,
        shared_lib_prefix: lib_prefix,
        export_marker: if windows {
            "__declspec(dllexport)"
        } else {
            "__attribute__((visibility(\"default\")))"
        },
        import_marker: if windows { "__declspec(dllimport)" } else { "" },
        has_import_libs: windows,
        has_asan: install.has_asan,
        defines,
        libraries,
        system_include_dirs: install.extra_include_dirs.clone(),
        library_dirs: install.extra_library_dirs.clone(),
        c_flags,
        cxx_flags,
        compiler_options,
        linker_options: target_options,
        archiver_options: Vec::new(),
        stripper_options,
        mode_defines: common_mode_defines(),
        mode_libraries: ModeTable::default(),
        mode_compiler_options: ModeTable::new(debug_compile, develop_compile, release_compile),
        mode_linker_options: ModeTable::new(debug_link, Vec::new(), release_link),
        mode_archiver_options: ModeTable::default(),
        deploy_libraries: ModeTable::default(),
        header_cache: HeaderCache::default(),
    }
}

fn warning_flags(level: WarningLevel) -> &'static [&'static str] {
    match level {
        WarningLevel::W0 => &["-w"],
        WarningLevel::W1 => &["-Wall"],
        WarningLevel::W2 => &["-Wall", "-Wextra"],
        WarningLevel::W3 => &["-Wall", "-Wextra", "-Wpedantic"],
        WarningLevel::W4 | WarningLevel::All => &["-Weverything"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::test_fixtures::clang_install;
    use crate::core::context::{BuildMode, CxxStandard};

    fn has(list: &[String], flag: &str) -> bool {
        list.iter().any(|f| f == flag)
    }

    #[test]
    fn test_linux_toolchain() {
        let tc = clang_toolchain(&clang_install(Platform::Linux), &BuildContext::default());
        assert_eq!(tc.family, ToolchainFamily::ClangLinux);
        assert!(has(&tc.compiler_options, "-fPIC"));
        assert!(has(&tc.compiler_options, "-fvisibility=hidden"));
        assert_eq!(tc.libraries, strings(&["pthread", "dl", "m"]));
        assert!(tc.defines.contains(&Define::flag("KILN_PLATFORM_LINUX")));
        assert!(has(
            tc.mode_linker_options.get(BuildMode::Release),
            "-Wl,--gc-sections"
        ));
        assert!(!tc.is_cross_compiler);
    }

    #[test]
    fn test_mode_tables() {
        let tc = clang_toolchain(&clang_install(Platform::Linux), &BuildContext::default());
        assert!(has(tc.mode_compiler_options.get(BuildMode::Debug), "-O0"));
        assert!(has(tc.mode_compiler_options.get(BuildMode::Develop), "-O1"));
        assert!(has(tc.mode_compiler_options.get(BuildMode::Release), "-O2"));
        assert!(has(
            tc.mode_compiler_options.get(BuildMode::Release),
            "-flto=thin"
        ));
        assert!(!has(&tc.compiler_options, "-O2"));
    }

    #[test]
    fn test_language_switches() {
        let ctx = BuildContext {
            cxx_std: CxxStandard::Cxx17,
            exceptions: false,
            rtti: false,
            ..BuildContext::default()
        };
        let tc = clang_toolchain(&clang_install(Platform::Linux), &ctx);
        assert!(has(&tc.cxx_flags, "-std=c++17"));
        assert!(has(&tc.cxx_flags, "-fno-exceptions"));
        assert!(has(&tc.cxx_flags, "-fno-rtti"));
        assert!(has(&tc.c_flags, "-std=c11"));
    }

    #[test]
    fn test_macos_toolchain() {
        let tc = clang_toolchain(&clang_install(Platform::MacOS), &BuildContext::default());
        assert_eq!(tc.family, ToolchainFamily::ClangMacOS);
        assert_eq!(tc.shared_lib_extension, "dylib");
        assert!(has(&tc.compiler_options, "-mmacosx-version-min=11.0"));
        assert!(has(
            tc.mode_linker_options.get(BuildMode::Release),
            "-Wl,-dead_strip"
        ));
        assert!(tc.defines.contains(&Define::flag("KILN_PLATFORM_MACOS")));
    }

    #[test]
    fn test_ios_uses_sysroot() {
        let mut install = clang_install(Platform::IOS);
        install.apple = true;
        install.target_arch = Architecture::Arm64;
        install.sysroot = Some(PathBuf::from("/SDKs/iPhoneOS.sdk"));
        let tc = clang_toolchain(&install, &BuildContext::default());
        assert_eq!(tc.family, ToolchainFamily::ClangIOS);
        assert!(has(&tc.compiler_options, "-isysroot"));
        assert!(has(&tc.compiler_options, "-miphoneos-version-min=15.0"));
        assert!(has(&tc.linker_options, "--target=arm64-apple-ios"));
        assert!(tc.is_cross_compiler);
    }

    #[test]
    fn test_warning_levels() {
        let ctx = BuildContext {
            warning_level: WarningLevel::W0,
            ..BuildContext::default()
        };
        let tc = clang_toolchain(&clang_install(Platform::Linux), &ctx);
        assert!(has(&tc.compiler_options, "-w"));
        assert!(!has(&tc.compiler_options, "-Wall"));
    }
}
