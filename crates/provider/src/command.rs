//! External command execution.
//!
//! [`CommandRunner`] is the seam between the harness and the host: the
//! production [`ProcessRunner`] spawns real processes through `tokio::process`,
//! tests substitute a scripted runner.
//!
//! Every command is logged as `+ <command line>` before it runs and its
//! captured output is logged afterwards, so the transcript is always
//! available before a failure is reported.

use std::fmt;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::ProviderError;

/// A fully described command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    stdin: Option<Vec<u8>>,
    timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable on top of the inherited environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Bytes written to the child's stdin. Without this stdin is `/dev/null`.
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Kills the child if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arg_list(&self) -> &[String] {
        &self.args
    }

    pub fn env_list(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn stdin_bytes(&self) -> Option<&[u8]> {
        self.stdin.as_deref()
    }

    pub fn timeout_limit(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={value} ")?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Human-readable status (`exit status: 1`).
    pub status: String,
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// A successful exit with the given stdout.
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(0),
            status: "exit status: 0".to_owned(),
            success: true,
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// A failed exit with the given code and stderr.
    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(code),
            status: format!("exit status: {code}"),
            success: false,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Turns an unsuccessful exit into [`ProviderError::CommandFailed`].
    pub fn check(self, spec: &CommandSpec) -> Result<Self, ProviderError> {
        if self.success {
            Ok(self)
        } else {
            Err(ProviderError::CommandFailed {
                command: spec.to_string(),
                status: self.status.clone(),
                stderr: self.stderr_lossy(),
            })
        }
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            status: output.status.to_string(),
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Runs external commands.
///
/// `run` returns `Ok` for any process that started and finished, whatever
/// its exit status; callers decide whether a non-zero exit is an error
/// (see [`CommandOutput::check`]). `Err` means the process could not be
/// started or exceeded its timeout.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        spec: &CommandSpec,
    ) -> impl Future<Output = Result<CommandOutput, ProviderError>> + Send;
}

/// Runs commands as child processes of the harness.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    async fn spawn_and_collect(spec: &CommandSpec) -> std::io::Result<std::process::Output> {
        let mut command = tokio::process::Command::new(spec.program());
        command
            .args(spec.arg_list())
            .envs(spec.env_list().iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let Some(input) = spec.stdin_bytes() else {
            command.stdin(Stdio::null());
            return command.output().await;
        };

        command.stdin(Stdio::piped());
        let mut child = command.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            // A child that exits without reading stdin still has output to report.
            match stdin.write_all(input).await {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                _ => {}
            }
            // dropping closes the pipe so the child sees EOF
        }
        child.wait_with_output().await
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProviderError> {
        info!("+ {spec}");

        let collect = Self::spawn_and_collect(spec);
        let result = match spec.timeout_limit() {
            Some(limit) => tokio::time::timeout(limit, collect).await.map_err(|_| {
                ProviderError::Timeout {
                    command: spec.to_string(),
                    timeout: limit,
                }
            })?,
            None => collect.await,
        };

        let output = CommandOutput::from(result.map_err(|e| ProviderError::Spawn {
            command: spec.to_string(),
            reason: e.to_string(),
        })?);
        log_output(&output);
        Ok(output)
    }
}

fn log_output(output: &CommandOutput) {
    let stdout = output.stdout_lossy();
    let stderr = output.stderr_lossy();
    info!(
        status = %output.status,
        stdout = %stdout.trim_end(),
        stderr = %stderr.trim_end(),
        "command finished"
    );
}

/// Test runner that records every spec and answers from a script.
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedRunner {
    /// Specs in call order.
    pub calls: std::sync::Mutex<Vec<CommandSpec>>,
    /// Responses keyed by a substring of the rendered command line.
    /// Unmatched commands succeed with empty output.
    pub responses: Vec<(String, Result<CommandOutput, String>)>,
}

#[cfg(test)]
impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers commands containing `needle` with `output`.
    pub fn respond(mut self, needle: &str, output: CommandOutput) -> Self {
        self.responses.push((needle.to_owned(), Ok(output)));
        self
    }

    /// Commands containing `needle` time out.
    pub fn time_out(mut self, needle: &str) -> Self {
        self.responses
            .push((needle.to_owned(), Err("timeout".to_owned())));
        self
    }

    pub fn recorded(&self) -> Vec<CommandSpec> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

#[cfg(test)]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProviderError> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(spec.clone());
        let line = spec.to_string();
        match self.responses.iter().find(|(needle, _)| line.contains(needle)) {
            Some((_, Ok(output))) => Ok(output.clone()),
            Some((_, Err(_))) => Err(ProviderError::Timeout {
                command: line,
                timeout: spec.timeout_limit().unwrap_or_default(),
            }),
            None => Ok(CommandOutput::ok(Vec::new())),
        }
    }
}
