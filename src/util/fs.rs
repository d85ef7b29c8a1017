//! Filesystem utilities.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Write `contents` only when it differs from what is already on disk,
/// creating parent directories as needed.
///
/// Returns `true` when the file was (re)written. Leaving an identical
/// `build.ninja` untouched keeps its mtime, so Ninja does not consider
/// its own manifest dirty.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<bool> {
    if fs::read_to_string(path).is_ok_and(|existing| existing == contents) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))?;
    Ok(true)
}

fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Find files matching glob patterns relative to a base directory.
///
/// Plain paths without metacharacters are returned as-is even when the
/// file does not exist yet; a missing source is reported by the build,
/// not dropped here.
pub fn glob_files(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();

    for pattern in patterns {
        if !is_glob_pattern(pattern) {
            results.push(base.join(pattern));
            continue;
        }

        let full_pattern = base.join(pattern);
        let pattern_str = full_pattern.to_string_lossy();

        let mut matched = Vec::new();
        for entry in
            glob(&pattern_str).with_context(|| format!("invalid glob pattern: {}", pattern))?
        {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        matched.push(path);
                    }
                }
                Err(e) => {
                    tracing::warn!("glob error: {}", e);
                }
            }
        }
        if matched.is_empty() {
            tracing::warn!("source pattern `{}` matched no files", pattern);
        }
        matched.sort();
        results.extend(matched);
    }

    // Patterns are expanded in declaration order; duplicates keep the
    // first position.
    let mut seen = std::collections::HashSet::new();
    results.retain(|p| seen.insert(p.clone()));
    Ok(results)
}

/// Canonicalize a path, but don't fail if it doesn't exist yet.
/// Returns the path as-is if canonicalization fails.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Flatten a path into something safe to nest under an output directory.
///
/// Root and drive prefixes are dropped and `..` becomes `__`, so
/// `../src/main.cpp` maps to `__/src/main.cpp`.
pub fn nest_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => out.push("__"),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_glob_files() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("main.cpp"), "int main() {}").unwrap();
        fs::write(src.join("util.cpp"), "void util() {}").unwrap();
        fs::write(src.join("readme.txt"), "readme").unwrap();

        let files = glob_files(tmp.path(), &["src/**/*.cpp".to_string()]).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("main.cpp"));
    }

    #[test]
    fn test_glob_files_keeps_literal_paths() {
        let tmp = TempDir::new().unwrap();
        let files = glob_files(tmp.path(), &["src/missing.c".to_string()]).unwrap();
        assert_eq!(files, vec![tmp.path().join("src/missing.c")]);
    }

    #[test]
    fn test_glob_files_dedups_in_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.c"), "").unwrap();
        fs::write(tmp.path().join("b.c"), "").unwrap();

        let files =
            glob_files(tmp.path(), &["b.c".to_string(), "*.c".to_string()]).unwrap();
        assert_eq!(files, vec![tmp.path().join("b.c"), tmp.path().join("a.c")]);
    }

    #[test]
    fn test_write_if_changed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/build.ninja");

        assert!(write_if_changed(&path, "a").unwrap());
        assert!(!write_if_changed(&path, "a").unwrap());
        assert!(write_if_changed(&path, "b").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "b");
    }

    #[test]
    fn test_nest_path() {
        assert_eq!(
            nest_path(Path::new("../src/main.cpp")),
            PathBuf::from("__/src/main.cpp")
        );
        assert_eq!(nest_path(Path::new("./a/b.c")), PathBuf::from("a/b.c"));
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/p/build"), Path::new("/p/include")),
            PathBuf::from("../include")
        );
    }
}
