//! MSVC toolchain construction.

use std::path::PathBuf;

use crate::builder::header_probe::HeaderCache;
use crate::builder::toolchain::{
    arch_define, common_mode_defines, strings, ModeTable, Toolchain, ToolchainFamily,
};
use crate::core::context::{BuildContext, CStandard, WarningLevel};
use crate::core::platform::{Architecture, Platform};
use crate::core::target::Define;
use crate::core::version::Version;

/// A located Windows SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsSdk {
    /// e.g. `C:/Program Files (x86)/Windows Kits/10`
    pub root: PathBuf,
    /// Directory name under `Include/` and `Lib/`, e.g. `10.0.22621.0`.
    pub version_dir: String,
    pub version: Version,
}

/// One MSVC host/target pair of an installed Visual Studio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsvcInstallation {
    pub name: Option<String>,
    /// `VC/Tools/MSVC/<version>`
    pub tools_dir: PathBuf,
    pub version: Version,
    pub visual_studio_version: Option<Version>,
    pub sdk: Option<WindowsSdk>,
    pub host_arch: Architecture,
    pub target_arch: Architecture,
    /// AddressSanitizer runtime libraries are present in the lib dir.
    pub has_asan: bool,
    pub extra_include_dirs: Vec<PathBuf>,
    pub extra_library_dirs: Vec<PathBuf>,
}

/// `Hostx64`, `Hostarm64`.
pub fn host_dir_name(arch: Architecture) -> String {
    format!("Host{}", arch.msvc_dir())
}

impl MsvcInstallation {
    /// `bin/Host<host>/<target>` under the tools directory.
    pub fn bin_dir(&self) -> PathBuf {
        self.tools_dir
            .join("bin")
            .join(host_dir_name(self.host_arch))
            .join(self.target_arch.msvc_dir())
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.tools_dir.join("lib").join(self.target_arch.msvc_dir())
    }

    pub fn is_cross(&self) -> bool {
        self.host_arch != self.target_arch
    }
}

/// AddressSanitizer import libraries (x64 only).
pub const ASAN_LIBRARIES: [&str; 2] = [
    "clang_rt.asan_dbg_dynamic-x86_64.lib",
    "clang_rt.asan_dynamic_runtime_thunk-x86_64.lib",
];

/// AddressSanitizer runtime DLL deployed next to Debug binaries.
pub const ASAN_RUNTIME_DLL: &str = "clang_rt.asan_dbg_dynamic-x86_64.dll";

const WINDOWS_SYSTEM_LIBRARIES: [&str; 9] = [
    "kernel32", "user32", "shell32", "ole32", "oleaut32", "uuid", "comdlg32", "advapi32", "gdi32",
];

/// Build the toolchain for one MSVC installation.
pub fn msvc_toolchain(install: &MsvcInstallation, ctx: &BuildContext) -> Toolchain {
    let arch = install.target_arch;
    let bin_dir = install.bin_dir();
    let asan = install.has_asan && arch == Architecture::X64;

    let name = install
        .name
        .clone()
        .unwrap_or_else(|| format!("msvc-{}-{}", install.version, arch));
    let mut description = format!("MSVC {} targeting windows-{}", install.version, arch);
    if install.is_cross() {
        description.push_str(&format!(" (cross from {})", install.host_arch));
    }

    let mut defines: Vec<Define> = ["WIN32", "_WIN32", "__WINDOWS__", "WINVER=0x0A00"]
        .into_iter()
        .map(Define::flag)
        .collect();
    defines.push(Define::flag("KILN_PLATFORM_WIN32"));
    defines.push(arch_define(arch));

    let mut libraries = strings(&WINDOWS_SYSTEM_LIBRARIES);

    let mut compiler_options = strings(&["/nologo", "/utf-8", "/GS", "/Zi", "/FS", "/showIncludes"]);
    compiler_options.push(warning_flag(ctx.warning_level).to_string());

    match arch {
        Architecture::X64 => compiler_options.push("/arch:AVX2".to_string()),
        Architecture::Arm64 => {
            defines.push(Define::flag("USE_SOFT_INTRINSICS"));
            libraries.push("softintrin".to_string());
        }
    }

    let c_flags = match ctx.c_std {
        // MSVC has no C99 switch; its default mode is the closest match.
        CStandard::C99 => Vec::new(),
        std => vec![format!("/std:{}", std.as_flag_value())],
    };

    let mut cxx_flags = vec![
        "/Zc:__cplusplus".to_string(),
        format!("/std:{}", ctx.cxx_std.as_msvc_flag_value()),
    ];
    if ctx.exceptions {
        cxx_flags.push("/EHsc".to_string());
    } else {
        cxx_flags.push("/EHs-c-".to_string());
        defines.push(Define::key_value("_HAS_EXCEPTIONS", "0"));
    }
    if !ctx.rtti {
        cxx_flags.push("/GR-".to_string());
    }

    let machine = match arch {
        Architecture::X64 => "/MACHINE:X64",
        Architecture::Arm64 => "/MACHINE:ARM64",
    };
    let linker_options = strings(&["/nologo", "/DEBUG", machine]);

    let mut system_include_dirs = vec![install.tools_dir.join("include")];
    let mut library_dirs = vec![install.lib_dir()];
    if let Some(sdk) = &install.sdk {
        let include = sdk.root.join("Include").join(&sdk.version_dir);
        for sub in ["ucrt", "um", "shared", "winrt", "cppwinrt"] {
            system_include_dirs.push(include.join(sub));
        }
        let lib = sdk.root.join("Lib").join(&sdk.version_dir);
        for sub in ["ucrt", "um"] {
            library_dirs.push(lib.join(sub).join(arch.msvc_dir()));
        }
    }
    system_include_dirs.extend(install.extra_include_dirs.iter().cloned());
    library_dirs.extend(install.extra_library_dirs.iter().cloned());

    // /RTC1 and /fsanitize=address cannot be combined.
    let debug_opt = if asan {
        strings(&["/MDd", "/Od", "/Oy-", "/fsanitize=address"])
    } else {
        strings(&["/MDd", "/Od", "/Oy-", "/RTC1"])
    };
    let develop_opt = if ctx.develop_optimization {
        strings(&["/MDd", "/O1", "/Oy-"])
    } else {
        strings(&["/MDd", "/Od", "/Oy-", "/RTC1"])
    };
    let release_opt = strings(&["/MD", "/O2", "/GL"]);

    let debug_libs = strings(&["vcruntimed.lib", "ucrtd.lib", "msvcrtd.lib"]);
    let mut debug_mode_libs = debug_libs.clone();
    let mut deploy_debug = Vec::new();
    if asan {
        debug_mode_libs.extend(strings(&ASAN_LIBRARIES));
        deploy_debug.push(bin_dir.join(ASAN_RUNTIME_DLL));
    }

    Toolchain {
        name,
        description,
        family: ToolchainFamily::Msvc,
        platform: Platform::Windows,
        arch,
        host_arch: install.host_arch,
        is_cross_compiler: install.is_cross(),
        version: install.version.clone(),
        apple_clang: false,
        visual_studio_version: install.visual_studio_version.clone(),
        sdk_version: install.sdk.as_ref().map(|s| s.version.clone()),
        sysroot: None,
        compiler: bin_dir.join("cl.exe"),
        cxx_compiler: bin_dir.join("cl.exe"),
        linker: bin_dir.join("link.exe"),
        archiver: bin_dir.join("lib.exe"),
        stripper: None,
        bin_dir,
        object_extension: "obj",
        static_lib_extension: "lib",
        shared_lib_extension: "dll",
        executable_extension: "exe",
        import_lib_extension: "lib",
        static_lib_prefix: "",
        shared_lib_prefix: "",
        export_marker: "__declspec(dllexport)",
        import_marker: "__declspec(dllimport)",
        has_import_libs: true,
        has_asan: asan,
        defines,
        libraries,
        system_include_dirs,
        library_dirs,
        c_flags,
        cxx_flags,
        compiler_options,
        linker_options,
        archiver_options: strings(&["/nologo"]),
        stripper_options: Vec::new(),
        mode_defines: common_mode_defines(),
        mode_libraries: ModeTable::new(
            debug_mode_libs,
            debug_libs,
            strings(&["vcruntime.lib", "ucrt.lib", "msvcrt.lib"]),
        ),
        mode_compiler_options: ModeTable::new(debug_opt, develop_opt, release_opt),
        mode_linker_options: ModeTable::new(
            strings(&["/INCREMENTAL"]),
            strings(&["/INCREMENTAL"]),
            strings(&["/INCREMENTAL:NO", "/LTCG", "/OPT:REF", "/OPT:ICF"]),
        ),
        mode_archiver_options: ModeTable::new(Vec::new(), Vec::new(), strings(&["/LTCG"])),
        deploy_libraries: ModeTable::new(deploy_debug, Vec::new(), Vec::new()),
        header_cache: HeaderCache::default(),
    }
}

fn warning_flag(level: WarningLevel) -> &'static str {
    match level {
        WarningLevel::W0 => "/W0",
        WarningLevel::W1 => "/W1",
        WarningLevel::W2 => "/W2",
        WarningLevel::W3 => "/W3",
        WarningLevel::W4 => "/W4",
        WarningLevel::All => "/Wall",
    }
}
