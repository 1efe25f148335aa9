//! Process execution seam for the provider CLIs.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// Flags whose value must never reach the logs.
const SECRET_FLAGS: &[&str] = &["--password", "--client-secret"];

/// Render a command line for logging with secret flag values masked.
pub fn display_args(args: &[String]) -> String {
    let mut shown = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            shown.push("***".to_string());
            mask_next = false;
            continue;
        }
        match arg.split_once('=') {
            Some((flag, _)) if SECRET_FLAGS.contains(&flag) => shown.push(format!("{flag}=***")),
            _ => {
                mask_next = SECRET_FLAGS.contains(&arg.as_str());
                shown.push(arg.clone());
            }
        }
    }
    shown.join(" ")
}

/// Captured result of one CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("{program} not found")]
    NotFound { program: String },
    #[error("failed to run {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("{program} did not finish within {seconds}s")]
    Timeout { program: String, seconds: u64 },
}

/// Runs a program with extra environment variables and captures its output.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
    ) -> Result<CommandOutput, RunnerError>;
}

/// Spawns real child processes, each bounded by `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
    ) -> Result<CommandOutput, RunnerError> {
        debug!("running {program} {}", display_args(args));

        let mut command = Command::new(program);
        command
            .args(args)
            .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| RunnerError::Timeout {
                program: program.to_string(),
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => RunnerError::NotFound {
                    program: program.to_string(),
                },
                _ => RunnerError::Spawn {
                    program: program.to_string(),
                    message: err.to_string(),
                },
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
