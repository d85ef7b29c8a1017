//! Header availability probing.
//!
//! `Toolchain::has_header("foo.h")` compiles a one-line translation unit
//! that includes the header. Results are cached per toolchain; concurrent
//! callers asking about the same header wait on a single probe.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::debug;

use crate::builder::toolchain::{Toolchain, ToolchainFamily};
use crate::util::process::ProcessBuilder;

/// Per-toolchain cache of header probe results.
#[derive(Debug, Clone, Default)]
pub struct HeaderCache {
    entries: Arc<Mutex<HashMap<String, Arc<OnceLock<bool>>>>>,
}

impl HeaderCache {
    /// Return the cached answer for `header`, running `probe` at most once.
    pub fn get_or_probe(&self, header: &str, probe: impl FnOnce() -> bool) -> bool {
        let cell = {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            entries
                .entry(header.to_string())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone()
        };
        // The map lock is released; only callers for this header wait here.
        *cell.get_or_init(probe)
    }

    pub fn cached(&self, header: &str) -> Option<bool> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(header).and_then(|cell| cell.get().copied())
    }
}

impl Toolchain {
    /// Whether `header` can be included with this toolchain's system
    /// include directories, compiling for the toolchain's own target.
    ///
    /// Any failure to run the compiler counts as "not available".
    pub fn has_header(&self, header: &str) -> bool {
        self.header_cache
            .get_or_probe(header, || probe_header(self, header))
    }

    fn header_probe_command(&self, source: &Path, object: &Path) -> ProcessBuilder {
        let syntax = self.syntax();
        let includes = self.system_include_dirs.iter().map(|d| syntax.include(d));
        match self.family {
            ToolchainFamily::Msvc => ProcessBuilder::new(&self.cxx_compiler)
                .arg("/c")
                .args(self.compiler_options.iter())
                .args(self.cxx_flags.iter())
                .args(includes)
                .arg(source)
                .arg(format!("/Fo{}", object.display())),
            // Target triple, deployment floor and sysroot all live in
            // compiler_options.
            _ => ProcessBuilder::new(&self.cxx_compiler)
                .arg("-c")
                .args(self.compiler_options.iter())
                .args(self.cxx_flags.iter())
                .args(includes)
                .arg(source)
                .arg("-o")
                .arg(object),
        }
    }
}

fn probe_header(toolchain: &Toolchain, header: &str) -> bool {
    // The directory is removed when `dir` drops, on every return path.
    let dir = match tempfile::Builder::new().prefix("kiln-probe").tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            debug!("cannot create header probe directory: {}", e);
            return false;
        }
    };

    let source = dir.path().join("probe.cpp");
    let object = dir
        .path()
        .join(format!("probe.{}", toolchain.object_extension));
    if let Err(e) = std::fs::write(
        &source,
        format!("#include <{}>\nint main() {{ return 0; }}\n", header),
    ) {
        debug!("cannot write header probe source: {}", e);
        return false;
    }

    let cmd = toolchain
        .header_probe_command(&source, &object)
        .cwd(dir.path());
    let found = match cmd.exec() {
        Ok(output) => output.status.success(),
        Err(e) => {
            debug!("header probe `{}` failed to run: {:#}", cmd, e);
            false
        }
    };
    debug!(
        "header <{}> {} with {}",
        header,
        if found { "found" } else { "not found" },
        toolchain.name
    );
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::clang_toolchain;
    use crate::builder::toolchain::test_fixtures::clang_install;
    use crate::core::context::BuildContext;
    use crate::core::platform::{Architecture, Platform};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_cache_runs_probe_once() {
        let cache = HeaderCache::default();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            assert!(cache.get_or_probe("vector", || {
                calls.fetch_add(1, Ordering::SeqCst);
                true
            }));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached("vector"), Some(true));
        assert_eq!(cache.cached("map"), None);
    }

    #[test]
    fn test_concurrent_queries_share_one_probe() {
        let cache = HeaderCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        std::thread::scope(|s| {
            for _ in 0..8 {
                let cache = cache.clone();
                let calls = Arc::clone(&calls);
                s.spawn(move || {
                    cache.get_or_probe("thread", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        false
                    })
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_probe_compiles_for_the_toolchain_target() {
        let mut install = clang_install(Platform::MacOS);
        install.apple = true;
        install.deployment_target = Some("12.0".to_string());
        install.sysroot = Some("/sdk/MacOSX.sdk".into());
        let tc = clang_toolchain(&install, &BuildContext::default());

        let cmd = tc
            .header_probe_command(Path::new("probe.cpp"), Path::new("probe.o"))
            .to_string();
        assert!(cmd.contains(" -mmacosx-version-min=12.0"), "{}", cmd);
        assert_eq!(cmd.matches("-isysroot /sdk/MacOSX.sdk").count(), 1, "{}", cmd);

        let mut install = clang_install(Platform::Linux);
        install.target_arch = Architecture::Arm64;
        let tc = clang_toolchain(&install, &BuildContext::default());
        let cmd = tc
            .header_probe_command(Path::new("probe.cpp"), Path::new("probe.o"))
            .to_string();
        assert!(cmd.contains(" --target="), "{}", cmd);
    }

    #[test]
    fn test_missing_compiler_means_no_header() {
        let mut install = clang_install(Platform::Linux);
        install.cxx_compiler = "/nonexistent/kiln/clang++".into();
        let tc = clang_toolchain(&install, &BuildContext::default());
        assert!(!tc.has_header("stdio.h"));
        // Cached: the second query does not spawn again.
        assert_eq!(tc.header_cache.cached("stdio.h"), Some(false));
    }
}
