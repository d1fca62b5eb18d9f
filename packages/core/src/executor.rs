//! Shell command execution.
//!
//! Every disk utility is invoked through a [`CommandRunner`], which makes the
//! command line the only contract between the reconciler and the operating
//! system. [`ShellRunner`] hands the line to `/bin/sh -c` so the templates in
//! [`crate::mount`] can chain commands and redirect output.

use std::process::{Command, Stdio};

use crate::error::{Error, IoResultExt, Result};

/// Shell used to interpret command templates.
pub const SHELL: &str = "/bin/sh";

/// Captured result of a finished shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    /// Exit code, or -1 if the process was killed by a signal.
    pub code: i32,
    /// Standard output with trailing whitespace removed.
    pub stdout: String,
    /// Standard error with trailing whitespace removed.
    pub stderr: String,
}

impl ShellOutput {
    /// Returns true if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Both output streams joined, for log messages.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    /// Converts a non-zero exit into [`Error::CommandExit`].
    pub fn check(self, command: &str) -> Result<ShellOutput> {
        if self.success() {
            return Ok(self);
        }
        Err(Error::CommandExit {
            command: command.to_string(),
            code: self.code,
            output: self.combined(),
        })
    }
}

/// Runs shell command lines.
///
/// Implementations block until the command finishes. No timeout is applied.
pub trait CommandRunner {
    /// Runs `command` and returns its output regardless of exit status.
    ///
    /// Only a failure to spawn the process is reported as an error.
    fn run(&self, command: &str) -> Result<ShellOutput>;

    /// Runs `command`, treating a non-zero exit as an error.
    fn run_checked(&self, command: &str) -> Result<ShellOutput> {
        self.run(command)?.check(command)
    }
}

/// Runs commands through `/bin/sh -c`.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<ShellOutput> {
        let output = Command::new(SHELL)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .command_context(command)?;

        Ok(ShellOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_keeps_successful_output() {
        let output = ShellOutput {
            code: 0,
            stdout: "ok".to_string(),
            stderr: String::new(),
        };
        assert_eq!(output.check("true").unwrap().stdout, "ok");
    }

    #[test]
    fn test_check_reports_exit_code_and_output() {
        let output = ShellOutput {
            code: 1,
            stdout: "volume identifier not available".to_string(),
            stderr: String::new(),
        };
        let err = output.check("echo x; false").unwrap_err();
        assert_eq!(
            err.to_string(),
            "command 'echo x; false' exited with code 1: volume identifier not available"
        );
    }

    #[test]
    fn test_combined_joins_streams() {
        let output = ShellOutput {
            code: 1,
            stdout: "out".to_string(),
            stderr: "err".to_string(),
        };
        assert_eq!(output.combined(), "out\nerr");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runner_reports_exit_status() {
        let runner = ShellRunner::new();
        let output = runner.run("echo hello; exit 3").unwrap();
        assert_eq!(output.code, 3);
        assert_eq!(output.stdout, "hello");
        assert!(runner.run_checked("false").is_err());
    }
}
