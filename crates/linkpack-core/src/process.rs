// crates/linkpack-core/src/process.rs
// ============================================================================
// Module: Linkpack Process Runner
// Description: Structured external process invocation.
// Purpose: Run build tool and git commands from argument lists, never shell strings.
// Dependencies: async-trait, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! [`CommandRunner`] is the seam between the pipeline and external programs.
//! Commands are described by [`CommandSpec`] (program, argument list, working
//! directory, environment) so no argument is ever re-parsed by a shell.
//! [`SystemCommandRunner`] executes them with `tokio::process`.
//! Invariants:
//! - Output is always captured.
//! - A non-zero exit status is always an error carrying stdout and stderr.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by external process execution.
///
/// # Invariants
/// - `command` is the rendered command line for diagnostics only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The process could not be started.
    #[error("failed to start `{command}`: {message}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying I/O error message.
        message: String,
    },
    /// The process exited unsuccessfully.
    #[error("`{command}` failed ({}): {}", exit_label(.code), .stderr.trim())]
    Failed {
        /// Rendered command line.
        command: String,
        /// Exit code when the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },
}

impl ProcessError {
    /// Returns true when either captured stream contains the needle.
    #[must_use]
    pub fn output_contains(&self, needle: &str) -> bool {
        match self {
            Self::Spawn {
                ..
            } => false,
            Self::Failed {
                stdout,
                stderr,
                ..
            } => stdout.contains(needle) || stderr.contains(needle),
        }
    }
}

/// Renders an exit code for error messages.
fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_string(), |code| format!("exit code {code}"))
}

// ============================================================================
// SECTION: Command Description
// ============================================================================

/// Structured description of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Working directory, inherited when absent.
    pub current_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    /// Creates a command for the provided program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: BTreeMap::new(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

// ============================================================================
// SECTION: Runner Trait
// ============================================================================

/// Executes external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] when the command cannot start or exits non-zero.
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ProcessError>;
}

/// Runner backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        let rendered = command.to_string();
        debug!(command = %rendered, "running command");
        let mut process = Command::new(&command.program);
        process.args(&command.args).envs(&command.env).kill_on_drop(true);
        if let Some(dir) = &command.current_dir {
            process.current_dir(dir);
        }
        let output = process.output().await.map_err(|err| ProcessError::Spawn {
            command: rendered.clone(),
            message: err.to_string(),
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(ProcessError::Failed {
                command: rendered,
                code: output.status.code(),
                stdout,
                stderr,
            });
        }
        Ok(CommandOutput {
            stdout,
            stderr,
        })
    }
}
