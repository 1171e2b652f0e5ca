//! Native host command execution.
//!
//! Runs container-runtime commands directly on the host using
//! `tokio::process::Command`, after validating and resolving the program.

use super::{
    CommandPolicy, CommandRunner, Result, RunOutput, RunnerError, RuntimeCommand, check_exit,
    validate_command,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Runs commands as host child processes
#[derive(Debug, Clone, Default)]
pub struct HostRunner {
    policy: CommandPolicy,
}

impl HostRunner {
    /// Create a runner that enforces the allow-list
    pub fn new() -> Self {
        Self {
            policy: CommandPolicy::AllowListed,
        }
    }

    /// Create a runner that accepts any program. Meant for tests only.
    pub fn unrestricted() -> Self {
        Self {
            policy: CommandPolicy::Unrestricted,
        }
    }

    /// Active policy
    pub fn policy(&self) -> CommandPolicy {
        self.policy
    }

    fn prepare(&self, cmd: &RuntimeCommand) -> Result<Command> {
        let program = validate_command(cmd, self.policy)?;
        let executable = resolve_executable(program)?;

        debug!("Executing on host: {} ({:?})", cmd.display(), executable);

        let mut command = Command::new(executable);
        command.args(&cmd.args[1..]);
        command.stdin(Stdio::null());

        if let Some(ref dir) = cmd.working_dir {
            command.current_dir(dir);
        }

        Ok(command)
    }
}

/// Resolve a program name to an absolute path via `PATH`.
///
/// # Errors
///
/// Returns [`RunnerError::ExecutableNotFound`] if resolution fails.
pub fn resolve_executable(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|_| RunnerError::ExecutableNotFound(program.to_string()))
}

#[async_trait]
impl CommandRunner for HostRunner {
    async fn run(&self, cmd: RuntimeCommand) -> Result<RunOutput> {
        let mut command = self.prepare(&cmd)?;
        let start = Instant::now();

        let output = command.output().await?;

        let result = RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        };

        check_exit(&cmd, result)
    }

    async fn run_streaming(
        &self,
        cmd: RuntimeCommand,
        on_line: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<RunOutput> {
        let mut command = self.prepare(&cmd)?;
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let start = Instant::now();
        let mut child = command.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("child stderr was not captured"))?;

        let mut stdout = BufReader::new(stdout);
        let mut stderr = BufReader::new(stderr);
        // partial lines survive a lost select race in these buffers
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let mut stdout_done = false;
        let mut stderr_done = false;
        let mut combined: Vec<String> = Vec::new();

        while !(stdout_done && stderr_done) {
            let read = tokio::select! {
                read = stdout.read_until(b'\n', &mut stdout_buf), if !stdout_done => {
                    read.map(|n| match n {
                        0 => stdout_done = true,
                        _ => emit_line(&mut stdout_buf, on_line, &mut combined),
                    })
                }
                read = stderr.read_until(b'\n', &mut stderr_buf), if !stderr_done => {
                    read.map(|n| match n {
                        0 => stderr_done = true,
                        _ => emit_line(&mut stderr_buf, on_line, &mut combined),
                    })
                }
            };

            if let Err(e) = read {
                if let Err(kill_err) = child.kill().await {
                    debug!("Failed to kill {}: {}", cmd.display(), kill_err);
                }
                return Err(e.into());
            }
        }

        let status = child.wait().await?;

        let result = RunOutput {
            stdout: combined.join("\n"),
            stderr: String::new(),
            exit_code: status.code().unwrap_or(-1),
            duration: start.elapsed(),
        };

        check_exit(&cmd, result)
    }

    fn runner_type(&self) -> &'static str {
        "host"
    }
}

/// Decode one raw line, replacing invalid UTF-8, and hand it on
fn emit_line(buf: &mut Vec<u8>, on_line: &(dyn Fn(&str) + Send + Sync), combined: &mut Vec<String>) {
    let line = String::from_utf8_lossy(buf)
        .trim_end_matches(['\n', '\r'])
        .to_string();
    buf.clear();
    on_line(&line);
    combined.push(line);
}
