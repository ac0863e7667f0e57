//! Shell command execution.
//!
//! Every external tool (`git`, `gh`) is invoked through [`ProcessRunner`], which
//! runs a command line through `sh -c` and captures its output. The trait lets
//! tests substitute a scripted runner for the real shell.
//!
//! By default a non-zero exit is an error tagged with the command and exit code.
//! Callers that want to interpret the exit code themselves opt in with
//! [`RunOptions::ignore_exit_code`].

use std::borrow::Cow;
use std::future::Future;
use std::path::PathBuf;
use std::process::Output;

use thiserror::Error;
use tracing::{debug, trace};

/// Errors from running a shell command.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The shell could not be started.
    #[error("failed to spawn [{command}]: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command exited with a non-zero code.
    #[error("[{command}] ({code})\n{output}")]
    NonZeroExit {
        command: String,
        code: i32,
        output: String,
    },

    /// An argument cannot be represented as a shell word.
    #[error("cannot quote argument for the shell: {0:?}")]
    Quote(String),
}

/// Captured result of a finished command. All text fields are trimmed at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// stdout followed by stderr.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Per-invocation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Return the result even when the command exits non-zero.
    pub ignore_exit_code: bool,
}

impl RunOptions {
    pub fn ignore_exit_code() -> Self {
        RunOptions {
            ignore_exit_code: true,
        }
    }
}

/// Runs shell command lines.
pub trait ProcessRunner {
    /// Run `command` through the shell and wait for it to finish.
    fn run(
        &self,
        command: &str,
        options: RunOptions,
    ) -> impl Future<Output = Result<CommandOutput, ProcessError>>;

    /// Blocking variant of [`ProcessRunner::run`].
    fn run_sync(&self, command: &str, options: RunOptions) -> Result<CommandOutput, ProcessError>;
}

/// Quotes `arg` for safe interpolation into a shell command line.
pub fn quote(arg: &str) -> Result<Cow<'_, str>, ProcessError> {
    shlex::try_quote(arg).map_err(|_| ProcessError::Quote(arg.to_string()))
}

/// Runs commands through `sh -c`, optionally from a fixed working directory.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    cwd: Option<PathBuf>,
}

impl ShellRunner {
    pub fn new() -> Self {
        ShellRunner { cwd: None }
    }

    /// Runs every command from `cwd` instead of the process working directory.
    pub fn in_dir(cwd: impl Into<PathBuf>) -> Self {
        ShellRunner {
            cwd: Some(cwd.into()),
        }
    }

    fn finish(
        &self,
        command: &str,
        options: RunOptions,
        output: Output,
    ) -> Result<CommandOutput, ProcessError> {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{stdout}{stderr}");

        // Killed by a signal reports no code; treat it as a failure.
        let exit_code = output.status.code().unwrap_or(-1);

        trace!(command, exit_code, output = %combined.trim_end(), "command finished");

        if exit_code != 0 && !options.ignore_exit_code {
            return Err(ProcessError::NonZeroExit {
                command: command.to_string(),
                code: exit_code,
                output: combined.trim_end().to_string(),
            });
        }

        Ok(CommandOutput {
            command: command.to_string(),
            exit_code,
            stdout: stdout.trim_end().to_string(),
            stderr: stderr.trim_end().to_string(),
            output: combined.trim_end().to_string(),
        })
    }
}

impl ProcessRunner for ShellRunner {
    async fn run(&self, command: &str, options: RunOptions) -> Result<CommandOutput, ProcessError> {
        debug!(command, "$");
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command).stdin(std::process::Stdio::null());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd.output().await.map_err(|source| ProcessError::Spawn {
            command: command.to_string(),
            source,
        })?;
        self.finish(command, options, output)
    }

    fn run_sync(&self, command: &str, options: RunOptions) -> Result<CommandOutput, ProcessError> {
        debug!(command, "$ (sync)");
        let mut cmd = std::process::Command::new("sh");
        cmd.arg("-c").arg(command).stdin(std::process::Stdio::null());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd.output().map_err(|source| ProcessError::Spawn {
            command: command.to_string(),
            source,
        })?;
        self.finish(command, options, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_and_trims_output() {
        let runner = ShellRunner::new();
        let out = runner
            .run("printf 'hello\\n\\n'; printf 'oops\\n' >&2", RunOptions::default())
            .await
            .unwrap();

        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.stderr, "oops");
        assert_eq!(out.output, "hello\n\noops");
        assert!(out.success());
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error_tagged_with_command_and_code() {
        let runner = ShellRunner::new();
        let err = runner
            .run("echo failing; exit 3", RunOptions::default())
            .await
            .unwrap_err();

        match err {
            ProcessError::NonZeroExit {
                command,
                code,
                output,
            } => {
                assert_eq!(command, "echo failing; exit 3");
                assert_eq!(code, 3);
                assert_eq!(output, "failing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn ignore_exit_code_returns_the_result() {
        let runner = ShellRunner::new();
        let out = runner
            .run("echo partial; exit 1", RunOptions::ignore_exit_code())
            .await
            .unwrap();
        assert_eq!(out.exit_code, 1);
        assert_eq!(out.stdout, "partial");
        assert!(!out.success());
    }

    #[test]
    fn sync_variant_matches_async_contract() {
        let runner = ShellRunner::new();
        let out = runner.run_sync("echo sync", RunOptions::default()).unwrap();
        assert_eq!(out.stdout, "sync");

        let err = runner.run_sync("exit 2", RunOptions::default()).unwrap_err();
        assert!(matches!(err, ProcessError::NonZeroExit { code: 2, .. }));
    }

    #[test]
    fn runs_in_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ShellRunner::in_dir(dir.path());
        let out = runner.run_sync("pwd -P", RunOptions::default()).unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(out.stdout, expected.to_string_lossy());
    }

    #[test]
    fn quote_escapes_shell_metacharacters() {
        assert_eq!(quote("main").unwrap(), "main");
        let quoted = quote("it's $HOME; rm").unwrap();
        assert_eq!(shlex::split(&quoted), Some(vec!["it's $HOME; rm".to_string()]));
        assert!(quote("nul\0byte").is_err());
    }
}
