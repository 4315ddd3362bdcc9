//! Synchronous invocation of external command-line tools.
//!
//! Every pipeline stage, packaging step, and container operation is one
//! blocking process run. Output is captured, forwarded to `tracing` line by
//! line, and attached to the error when the process exits nonzero. Nothing
//! is retried.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{HarnessError, Result};

/// Captured result of a finished tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Standard output from the process.
    pub stdout: String,
    /// Standard error from the process.
    pub stderr: String,
    /// Exit code returned by the process (-1 when killed by a signal).
    pub exit_code: i32,
}

impl ToolOutput {
    /// Returns stdout followed by stderr.
    #[must_use]
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !out.is_empty() && !out.ends_with('\n') && !self.stderr.is_empty() {
            out.push('\n');
        }
        out.push_str(&self.stderr);
        out
    }
}

/// An external program invoked by the harness.
#[derive(Debug, Clone)]
pub struct Tool {
    program: PathBuf,
}

impl Tool {
    /// Wraps a program name or path.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Returns the wrapped program.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns whether the program can be found on `PATH` (or at its path).
    #[must_use]
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    /// Runs the tool and fails on a nonzero exit.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Spawn` if the process cannot be started and
    /// `HarnessError::ToolFailed`, carrying the combined output, if it exits
    /// unsuccessfully.
    pub fn run<I, S>(&self, args: I) -> Result<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run_in(None, args)
    }

    /// Runs the tool with `dir` as its working directory.
    ///
    /// # Errors
    ///
    /// Same as [`Tool::run`].
    pub fn run_in<I, S>(&self, dir: Option<&Path>, args: I) -> Result<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .collect();
        let output = self.execute(dir, &args)?;

        if output.exit_code == 0 {
            return Ok(output);
        }

        tracing::warn!(
            program = %self.program.display(),
            exit_code = output.exit_code,
            "tool exited unsuccessfully"
        );
        Err(HarnessError::ToolFailed {
            program: self.program.display().to_string(),
            args: args.join(" "),
            status: (output.exit_code >= 0).then_some(output.exit_code),
            output: output.combined(),
        })
    }

    /// Runs the tool and returns its output whatever the exit code.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Spawn` if the process cannot be started.
    pub fn execute(&self, dir: Option<&Path>, args: &[String]) -> Result<ToolOutput> {
        tracing::info!(program = %self.program.display(), args = ?args, "running tool");

        let mut command = Command::new(&self.program);
        let _ = command.args(args);
        if let Some(dir) = dir {
            let _ = command.current_dir(dir);
        }

        let output = command.output().map_err(|e| HarnessError::Spawn {
            program: self.program.display().to_string(),
            source: e,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        forward(&self.program, "stdout", &stdout);
        forward(&self.program, "stderr", &stderr);

        Ok(ToolOutput {
            stdout,
            stderr,
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

fn forward(program: &Path, stream: &str, text: &str) {
    for line in text.lines() {
        tracing::debug!(target: "packtest::tool", program = %program.display(), stream, "{line}");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn successful_run_captures_both_streams() {
        let out = Tool::new("sh")
            .run(["-c", "echo out; echo err >&2"])
            .expect("run");
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.combined(), "out\nerr\n");
    }

    #[test]
    fn nonzero_exit_attaches_output() {
        let err = Tool::new("sh")
            .run(["-c", "echo 'unknown buildpack id' >&2; exit 1"])
            .unwrap_err();
        match err {
            HarnessError::ToolFailed { status, output, .. } => {
                assert_eq!(status, Some(1));
                assert!(output.contains("unknown buildpack id"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = Tool::new("/nonexistent/packtest-tool").run(["x"]).unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }

    #[test]
    fn run_in_uses_working_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = Tool::new("sh")
            .run_in(Some(dir.path()), ["-c", "pwd"])
            .expect("run");
        let reported = std::fs::canonicalize(out.stdout.trim()).expect("canon");
        assert_eq!(reported, std::fs::canonicalize(dir.path()).expect("canon"));
    }

    #[test]
    fn execute_does_not_fail_on_nonzero_exit() {
        let out = Tool::new("sh")
            .execute(None, &["-c".into(), "exit 3".into()])
            .expect("execute");
        assert_eq!(out.exit_code, 3);
    }

    #[test]
    fn sh_is_available() {
        assert!(Tool::new("sh").is_available());
        assert!(!Tool::new("packtest-definitely-missing").is_available());
    }
}
