use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use crate::errors::FuzzchainError;
use crate::pipeline::stage::Stage;
use crate::utils::formatting::truncate_chars;
use tracing::debug;

/// A single external command to execute, with its deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub stage: Stage,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(stage: Stage, program: impl Into<String>) -> Self {
        Self {
            stage,
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Build from an argv vector (`["python3", "dirsearch.py"]`). `None` when empty.
    pub fn from_argv(stage: Stage, argv: &[String]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        Some(Self::new(stage, program.clone()).args(rest.iter().cloned()))
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

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Value of the argument following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Command line cut to `max` characters for log fields.
    pub fn short_command_line(&self, max: usize) -> String {
        truncate_chars(&self.command_line(), max).to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Last few hundred bytes of stderr, for error messages.
    pub fn stderr_tail(&self) -> String {
        let trimmed = self.stderr.trim();
        let mut start = trimmed.len().saturating_sub(400);
        while !trimmed.is_char_boundary(start) {
            start += 1;
        }
        trimmed[start..].to_string()
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion, honouring the invocation's deadline and the cancel token.
    async fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, FuzzchainError>;

    /// True when the command launches and exits zero. Never an error.
    async fn probe(&self, invocation: &Invocation) -> bool {
        match self.run(invocation, &CancellationToken::new()).await {
            Ok(output) => output.success(),
            Err(e) => {
                debug!(command = %invocation.command_line(), error = %e, "Probe failed");
                false
            }
        }
    }

    /// Make binaries under `dir` resolvable for subsequent invocations.
    fn add_search_path(&self, dir: &Path);
}

/// Runs invocations as real child processes.
#[derive(Default)]
pub struct SystemRunner {
    extra_paths: Mutex<Vec<PathBuf>>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// PATH for children: registered directories first, then the inherited PATH.
    fn search_path(&self) -> Option<OsString> {
        let extra = self
            .extra_paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if extra.is_empty() {
            return None;
        }
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let all = extra
            .into_iter()
            .chain(std::env::split_paths(&inherited));
        std::env::join_paths(all).ok()
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, FuzzchainError> {
        debug!(stage = %invocation.stage, command = %invocation.short_command_line(200), "Spawning process");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        if let Some(path) = self.search_path() {
            command.env("PATH", path);
        }

        let child = command.spawn().map_err(|source| FuzzchainError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            result = child.wait_with_output() => result?,
            _ = tokio::time::sleep(invocation.timeout) => {
                return Err(FuzzchainError::Timeout {
                    stage: invocation.stage,
                    secs: invocation.timeout.as_secs(),
                });
            }
            _ = cancel.cancelled() => {
                return Err(FuzzchainError::Cancelled(format!(
                    "{} interrupted while running {}",
                    invocation.stage, invocation.program
                )));
            }
        };

        let output = ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(
            stage = %invocation.stage,
            exit_code = ?output.exit_code,
            stdout_bytes = output.stdout.len(),
            "Process exited"
        );
        Ok(output)
    }

    fn add_search_path(&self, dir: &Path) {
        let mut paths = self
            .extra_paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !paths.iter().any(|p| p == dir) {
            paths.insert(0, dir.to_path_buf());
        }
    }
}
