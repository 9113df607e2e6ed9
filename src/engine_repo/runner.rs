// Engine CLI subprocess runner (one child process per call, argv only, no shell)

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::error::{EngineCommandError, EngineError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Caller-held signal that kills an in-flight engine call.
///
/// Clones share the same signal; cancelling one cancels all.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called (immediately if it already was).
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as self, so wait_for only returns once the flag flips.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Executes one engine subcommand and returns its standard output.
#[async_trait]
pub trait EngineRunner: Send + Sync {
    async fn run(&self, args: &[String], cancel: &CancelToken) -> Result<String, EngineError>;
}

/// Runs the engine executable (`docker`, `podman`, ...) as a child process.
#[derive(Debug, Clone)]
pub struct CliRunner {
    binary: String,
    global_args: Vec<String>,
    timeout: Duration,
}

impl CliRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            global_args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Flags placed before every subcommand (e.g. `--log-level error`).
    pub fn with_global_args(mut self, args: Vec<String>) -> Self {
        self.global_args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn display_command(&self, args: &[String]) -> String {
        std::iter::once(self.binary.as_str())
            .chain(self.global_args.iter().map(String::as_str))
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl EngineRunner for CliRunner {
    #[instrument(skip(self, cancel), fields(engine = %self.binary, subcommand = args.first().map(String::as_str).unwrap_or("")))]
    async fn run(&self, args: &[String], cancel: &CancelToken) -> Result<String, EngineError> {
        let command = self.display_command(args);
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled { command });
        }

        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.global_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| EngineCommandError {
            command: command.clone(),
            exit_code: None,
            stderr: e.to_string(),
        })?;

        // Dropping the wait future on timeout/cancel drops the child, which kills it.
        let output = tokio::select! {
            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => match result {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    return Err(EngineCommandError {
                        command,
                        exit_code: None,
                        stderr: e.to_string(),
                    }
                    .into());
                }
                Err(_) => {
                    return Err(EngineError::Timeout {
                        command,
                        timeout: self.timeout,
                    });
                }
            },
            _ = cancel.cancelled() => {
                return Err(EngineError::Cancelled { command });
            }
        };

        debug!(exit_code = ?output.status.code(), stdout_bytes = output.stdout.len(), "engine command finished");

        if !output.status.success() {
            return Err(EngineCommandError {
                command,
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
