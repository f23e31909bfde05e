//! Error types for selfcontrol
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (unknown task, duplicate name or timer, bad arguments)
//! - 4: Operation failed (store I/O, lock contention, serialization)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the selfcontrol CLI
pub mod exit_codes {
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// What a `NotFound` error was looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Timer,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Task => "task",
            EntityKind::Timer => "timer",
        };
        f.write_str(name)
    }
}

/// Main error type for selfcontrol operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("No such {kind}: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Task name already exists: {0}")]
    DuplicateName(String),

    #[error("Task {task_id} already has a running timer")]
    DuplicateTimer { task_id: u64 },

    #[error("Invalid numeric argument: {0}")]
    InvalidNumericArgument(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    pub fn task_not_found(id: impl ToString) -> Self {
        Error::NotFound {
            kind: EntityKind::Task,
            id: id.to_string(),
        }
    }

    pub fn timer_not_found(task_id: u64) -> Self {
        Error::NotFound {
            kind: EntityKind::Timer,
            id: format!("running timer for task {task_id}"),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotFound { .. }
            | Error::DuplicateName(_)
            | Error::DuplicateTimer { .. }
            | Error::InvalidNumericArgument(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_) => exit_codes::USER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// `user_error` or `operation_failed`, matching the exit code
    pub fn kind(&self) -> &'static str {
        match self.exit_code() {
            exit_codes::USER_ERROR => "user_error",
            _ => "operation_failed",
        }
    }

    /// Structured fields for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::NotFound { kind, id } => Some(serde_json::json!({
                "kind": kind.to_string(),
                "id": id,
            })),
            Error::DuplicateName(name) => Some(serde_json::json!({ "name": name })),
            Error::DuplicateTimer { task_id } => Some(serde_json::json!({ "task_id": task_id })),
            Error::InvalidNumericArgument(value) => Some(serde_json::json!({ "value": value })),
            Error::InvalidArgument(message) | Error::InvalidConfig(message) => {
                Some(serde_json::json!({ "message": message }))
            }
            Error::LockFailed(path) => Some(serde_json::json!({ "path": path })),
            _ => None,
        }
    }
}

/// Result type alias for selfcontrol operations
pub type Result<T> = std::result::Result<T, Error>;

/// The `error` object of a JSON error envelope
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub message: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            message: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        }
    }
}
