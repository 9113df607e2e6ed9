// Typed errors returned by the engine runner, parsers and operations

use std::time::Duration;
use thiserror::Error;

use crate::models::EntityKind;

/// Non-zero exit or spawn failure of one engine invocation.
///
/// `exit_code` is `None` when the process never ran (spawn failure) or was
/// terminated by a signal; `stderr` then holds the spawn error text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{command}` failed{}: {}", exit_suffix(.exit_code), .stderr.trim())]
pub struct EngineCommandError {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stderr: String,
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" with exit code {}", c))
        .unwrap_or_default()
}

/// A listing line that did not decode into its entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse {kind} listing at line {line}: {message}")]
pub struct InventoryParseError {
    pub kind: EntityKind,
    /// 1-based line number among the non-blank lines of the report.
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Command(#[from] EngineCommandError),
    #[error(transparent)]
    Parse(#[from] InventoryParseError),
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("`{command}` was cancelled")]
    Cancelled { command: String },
    #[error("{operation} is destructive and requires confirmation")]
    ConfirmationRequired { operation: &'static str },
    #[error("{operation} requires a non-empty {argument}")]
    MissingArgument {
        operation: &'static str,
        argument: &'static str,
    },
    #[error("invalid {argument} for {operation}: {reason}")]
    InvalidArgument {
        operation: &'static str,
        argument: &'static str,
        reason: String,
    },
}
