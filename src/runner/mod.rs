//! # Container Runtime Command Runner
//!
//! Every component that talks to the container runtime goes through a
//! [`CommandRunner`]. The runner takes an argument vector, never a shell string,
//! checks the program against an allow-list of container-management commands,
//! resolves it to an absolute path and captures its output.
//!
//! ## Core Components
//!
//! - **[`CommandRunner`]**: object-safe async trait shared by the volume and
//!   lifecycle layers (`Arc<dyn CommandRunner>`)
//! - **[`HostRunner`]**: spawns real child processes with `tokio::process::Command`
//! - **[`RuntimeCommand`]**: argument vector, working directory and strict-check flag
//! - **[`RunOutput`]**: captured stdout, stderr, exit code and duration
//!
//! ## Failure Modes
//!
//! - [`RunnerError::CommandNotAllowed`]: first token is not an allowed program
//! - [`RunnerError::ExecutableNotFound`]: the program cannot be resolved on `PATH`
//! - [`RunnerError::CommandFailed`]: non-zero exit with [`RuntimeCommand::checked`]
//!
//! The runner never retries; retry and tolerance policy belong to callers.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sapo::runner::{CommandRunner, HostRunner, RuntimeCommand};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = HostRunner::new();
//!
//!     let output = runner
//!         .run(RuntimeCommand::docker(["volume", "ls"]).checked())
//!         .await?;
//!     println!("{}", output.stdout);
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Host process runner.
///
/// Implements [`HostRunner`] on top of `tokio::process::Command` with
/// allow-list validation and `which`-based executable resolution.
pub mod host;

#[cfg(test)]
pub(crate) mod scripted;

pub use host::HostRunner;

/// Programs the runner accepts as the first token of a command.
pub const ALLOWED_COMMANDS: &[&str] = &["docker", "docker-compose", "podman"];

/// Whether the allow-list is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandPolicy {
    /// Only [`ALLOWED_COMMANDS`] may run
    #[default]
    AllowListed,
    /// Any resolvable program may run. Test-only escape hatch.
    Unrestricted,
}

/// Command to run against the container runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeCommand {
    /// Program followed by its arguments
    pub args: Vec<String>,
    /// Working directory for the child process
    pub working_dir: Option<PathBuf>,
    /// Turn a non-zero exit into [`RunnerError::CommandFailed`]
    pub check: bool,
}

impl RuntimeCommand {
    /// Create a command from a full argument vector (program first)
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            check: false,
        }
    }

    /// Create a `docker <args...>` command
    pub fn docker<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cmd = Self::new(["docker"]);
        cmd.args.extend(args.into_iter().map(Into::into));
        cmd
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Fail with [`RunnerError::CommandFailed`] on non-zero exit
    pub fn checked(mut self) -> Self {
        self.check = true;
        self
    }

    /// Program name (first token)
    pub fn program(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Human-readable rendering for logs and error messages
    pub fn display(&self) -> String {
        self.args.join(" ")
    }

    /// Whether the argument vector starts with `prefix`
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len()
            && self.args.iter().zip(prefix).all(|(arg, p)| arg == p)
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    /// Standard output (combined stdout/stderr for streamed commands)
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code (0 = success, -1 when killed by a signal)
    pub exit_code: i32,
    /// Wall-clock duration
    pub duration: Duration,
}

impl RunOutput {
    /// Check if the command exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Trimmed standard output
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Errors raised by a [`CommandRunner`]
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// First token is not an allowed container-management command
    #[error("Command not allowed: {0:?}")]
    CommandNotAllowed(String),

    /// Program could not be resolved to an absolute path
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    /// Process exited non-zero under strict checking
    #[error("Command `{command}` failed with exit code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// I/O error while spawning or reading the child
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Whether this error means the runtime itself is missing
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RunnerError::ExecutableNotFound(_))
    }
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Check the first token of `cmd` against `policy`.
///
/// # Errors
///
/// Returns [`RunnerError::CommandNotAllowed`] for an empty command or a
/// program outside [`ALLOWED_COMMANDS`] under [`CommandPolicy::AllowListed`].
pub fn validate_command(cmd: &RuntimeCommand, policy: CommandPolicy) -> Result<&str> {
    let program = cmd
        .program()
        .ok_or_else(|| RunnerError::CommandNotAllowed(String::new()))?;

    if policy == CommandPolicy::AllowListed && !ALLOWED_COMMANDS.contains(&program) {
        return Err(RunnerError::CommandNotAllowed(program.to_string()));
    }

    Ok(program)
}

/// Turn a finished command into an error when strict checking was requested.
pub(crate) fn check_exit(cmd: &RuntimeCommand, output: RunOutput) -> Result<RunOutput> {
    if cmd.check && !output.success() {
        let stderr = if output.stderr.trim().is_empty() {
            output.stdout.trim().to_string()
        } else {
            output.stderr.trim().to_string()
        };
        return Err(RunnerError::CommandFailed {
            command: cmd.display(),
            code: output.exit_code,
            stderr,
        });
    }
    Ok(output)
}

/// Executes container-runtime commands.
///
/// Implementations must not invoke a shell and must validate the program
/// before spawning anything.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output
    async fn run(&self, cmd: RuntimeCommand) -> Result<RunOutput>;

    /// Run a command, handing each line of combined stdout/stderr to `on_line`
    /// as it arrives. The returned [`RunOutput::stdout`] holds every line.
    async fn run_streaming(
        &self,
        cmd: RuntimeCommand,
        on_line: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<RunOutput>;

    /// Runner type name for logging
    fn runner_type(&self) -> &'static str;
}
