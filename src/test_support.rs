//! Test doubles shared by the provider tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::providers::{CommandOutput, CommandRunner, RunnerError};

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl CommandInvocation {
    /// Shell-like rendering for assertions.
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    pub fn env(&self, name: &str) -> Option<&str> {
        self.envs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Replays queued responses in FIFO order without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<Result<CommandOutput, RunnerError>>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.lock().expect("invocations lock").clone()
    }

    pub fn push_output(&self, code: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(Ok(CommandOutput {
                code,
                stdout: stdout.into(),
                stderr: stderr.into(),
            }));
    }

    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    pub fn push_error(&self, err: RunnerError) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(Err(err));
    }
}

#[async_trait::async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
    ) -> Result<CommandOutput, RunnerError> {
        self.invocations
            .lock()
            .expect("invocations lock")
            .push(CommandInvocation {
                program: program.to_string(),
                args: args.to_vec(),
                envs: envs.to_vec(),
            });
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(RunnerError::Spawn {
                    program: program.to_string(),
                    message: "no scripted response queued".into(),
                })
            })
    }
}

/// In-memory sink for log lines emitted while a test runs.
#[derive(Clone, Debug, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain-text subscriber at DEBUG writing into this capture.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        let sink = self.clone();
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().expect("log lock")).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().expect("log lock").extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
