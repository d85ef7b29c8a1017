//! Running compilers and SDK helpers as subprocesses.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{bail, Context, Result};

/// A one-shot command: the host probe uses it to query compiler macros,
/// the header probe to run trial compilations.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
}

impl ProcessBuilder {
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        args.into_iter().fold(self, |cmd, a| cmd.arg(a))
    }

    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Bytes fed to the child's stdin, e.g. an empty translation unit for
    /// `clang -dM -E -`.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Run to completion, capturing both output streams.
    ///
    /// Without explicit input, stdin is null so a compiler reading `-`
    /// never waits on the terminal.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(match self.stdin {
                Some(_) => Stdio::piped(),
                None => Stdio::null(),
            });
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;
        if let (Some(data), Some(mut pipe)) = (&self.stdin, child.stdin.take()) {
            pipe.write_all(data)
                .with_context(|| format!("failed to write stdin of `{}`", self))?;
        }
        child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self))
    }

    /// Run and require a zero exit status; returns stdout as text.
    pub fn exec_stdout(&self) -> Result<String> {
        let output = self.exec()?;
        if !output.status.success() {
            bail!(
                "`{}` exited with {}\n{}",
                self,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl std::fmt::Display for ProcessBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Locate `name` on `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let pb = ProcessBuilder::new("clang").args(["-dM", "-E", "-x", "c", "-"]);
        assert_eq!(pb.to_string(), "clang -dM -E -x c -");
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let result = ProcessBuilder::new("kiln-definitely-not-a-real-program").exec();
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_stdout() {
        let out = ProcessBuilder::new("echo").arg("hello").exec_stdout().unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_is_forwarded() {
        let out = ProcessBuilder::new("cat").stdin("piped").exec_stdout().unwrap();
        assert_eq!(out, "piped");
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_reports_command() {
        let err = ProcessBuilder::new("sh")
            .args(["-c", "echo oops >&2; exit 3"])
            .exec_stdout()
            .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("`sh -c echo oops >&2; exit 3`"));
        assert!(message.contains("oops"));
    }
}
