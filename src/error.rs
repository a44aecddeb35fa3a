//! Error types for taskmesh.

use axum::http::StatusCode;

use crate::task::TaskStatus;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown role {0:?}, expected \"orchestrator\" or \"worker\"")]
    UnknownRole(String),
}

/// Task registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Task {id} already exists with a different record")]
    Conflict { id: String },

    #[error("Task {id} is already {status}, cannot transition to {target}")]
    AlreadyTerminal {
        id: String,
        status: TaskStatus,
        target: TaskStatus,
    },

    #[error("Task {id} cannot move from {status} to {target}")]
    InvalidTransition {
        id: String,
        status: TaskStatus,
        target: TaskStatus,
    },
}

/// Outbound call to a worker failed.
///
/// Both variants surface as the same "dispatch failed" condition; the variant
/// only records which layer produced the cause.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("dispatch to {url} failed: worker responded {status}")]
    Status { url: String, status: u16 },
}

/// Errors surfaced by the command router.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command")]
    UnknownCommand,

    #[error("missing prompt")]
    MissingPrompt,

    #[error("missing task id")]
    MissingTaskId,

    #[error("worker {id} not found")]
    WorkerNotFound { id: String },

    #[error("no worker available")]
    NoWorkerAvailable,

    #[error("task {id} not found")]
    TaskNotFound { id: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl CommandError {
    /// HTTP status class for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownCommand | Self::MissingPrompt | Self::MissingTaskId => {
                StatusCode::BAD_REQUEST
            }
            Self::WorkerNotFound { .. } | Self::TaskNotFound { .. } => StatusCode::NOT_FOUND,
            Self::NoWorkerAvailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Registry(_) => StatusCode::CONFLICT,
            Self::Dispatch(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Worker-side executor errors.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("task {id} is already running")]
    AlreadyRunning { id: String },

    #[error("task {id} not running")]
    NotRunning { id: String },
}

impl ExecutorError {
    /// HTTP status class for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyRunning { .. } => StatusCode::CONFLICT,
            Self::NotRunning { .. } => StatusCode::NOT_FOUND,
        }
    }
}

/// Result type alias for taskmesh.
pub type Result<T> = std::result::Result<T, Error>;
