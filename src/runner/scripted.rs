//! Scripted runner for unit tests.
//!
//! Records every argument vector and answers from a list of canned replies,
//! so volume and lifecycle logic can be exercised without a daemon.

use super::{
    CommandPolicy, CommandRunner, Result, RunOutput, RunnerError, RuntimeCommand, check_exit,
    validate_command,
};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Canned answer for a matching command
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Output {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    Missing,
}

impl Reply {
    pub(crate) fn ok(stdout: impl Into<String>) -> Self {
        Reply::Output {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub(crate) fn fail(exit_code: i32, stderr: impl Into<String>) -> Self {
        Reply::Output {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub(crate) fn fail_with_output(exit_code: i32, stdout: impl Into<String>) -> Self {
        Reply::Output {
            exit_code,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

struct Rule {
    prefix: Vec<String>,
    contains: Option<String>,
    reply: Reply,
}

impl Rule {
    fn matches(&self, cmd: &RuntimeCommand) -> bool {
        let prefix: Vec<&str> = self.prefix.iter().map(String::as_str).collect();
        cmd.starts_with(&prefix)
            && self
                .contains
                .as_ref()
                .is_none_or(|needle| cmd.args.iter().any(|arg| arg.contains(needle.as_str())))
    }
}

/// Runner double: first matching rule wins, unmatched commands succeed silently
pub(crate) struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<RuntimeCommand>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn push(self, prefix: &[&str], contains: Option<&str>, reply: Reply) -> Self {
        self.rules.lock().unwrap().push(Rule {
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            contains: contains.map(String::from),
            reply,
        });
        self
    }

    /// Answer every command starting with `prefix`
    pub(crate) fn on(self, prefix: &[&str], reply: Reply) -> Self {
        self.push(prefix, None, reply)
    }

    /// Answer commands starting with `prefix` that carry an argument containing `needle`
    pub(crate) fn on_arg(self, prefix: &[&str], needle: &str, reply: Reply) -> Self {
        self.push(prefix, Some(needle), reply)
    }

    /// Every command seen so far
    pub(crate) fn calls(&self) -> Vec<RuntimeCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Argument vectors of the commands starting with `prefix`
    pub(crate) fn calls_matching(&self, prefix: &[&str]) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| cmd.args.clone())
            .collect()
    }

    fn answer(&self, cmd: &RuntimeCommand) -> Result<RunOutput> {
        validate_command(cmd, CommandPolicy::AllowListed)?;
        self.calls.lock().unwrap().push(cmd.clone());

        let reply = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|rule| rule.matches(cmd))
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| Reply::ok(""));

        match reply {
            Reply::Missing => Err(RunnerError::ExecutableNotFound(
                cmd.program().unwrap_or_default().to_string(),
            )),
            Reply::Output {
                exit_code,
                stdout,
                stderr,
            } => check_exit(
                cmd,
                RunOutput {
                    stdout,
                    stderr,
                    exit_code,
                    duration: Duration::ZERO,
                },
            ),
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, cmd: RuntimeCommand) -> Result<RunOutput> {
        self.answer(&cmd)
    }

    async fn run_streaming(
        &self,
        cmd: RuntimeCommand,
        on_line: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<RunOutput> {
        let unchecked = RuntimeCommand {
            check: false,
            ..cmd.clone()
        };
        let output = self.answer(&unchecked)?;
        for line in output.stdout.lines() {
            on_line(line);
        }
        check_exit(&cmd, output)
    }

    fn runner_type(&self) -> &'static str {
        "scripted"
    }
}
