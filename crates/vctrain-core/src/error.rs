//! Error types for the vctrain core library.
//!
//! Local validation problems (bad upload extension, empty dataset name) are not
//! errors: they surface as [`Notice`](crate::notice::Notice)s. The variants
//! here cover malformed requests, filesystem failures and pipeline failures.

use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::PipelineStage;

/// Main error type for the vctrain library.
#[derive(Debug, Error)]
pub enum TrainerError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    #[error("Invalid GPU selection {input:?}: {message}")]
    InvalidGpuSelection { input: String, message: String },

    #[error("Invalid pretrained file {path}: {message}")]
    InvalidPretrained { path: PathBuf, message: String },

    // Project / pipeline errors
    #[error("Project not found: {name}")]
    ProjectNotFound { name: String },

    #[error("Project {project} already has a running {stage} job")]
    ProjectBusy {
        project: String,
        stage: PipelineStage,
    },

    #[error("Pipeline {stage} failed: {message}")]
    PipelineFailed {
        stage: PipelineStage,
        message: String,
    },

    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: String },

    #[error("Operation cancelled")]
    Cancelled,

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for vctrain operations.
pub type Result<T> = std::result::Result<T, TrainerError>;

impl From<std::io::Error> for TrainerError {
    fn from(err: std::io::Error) -> Self {
        TrainerError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for TrainerError {
    fn from(err: serde_json::Error) -> Self {
        TrainerError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<crate::cancel::CancelledError> for TrainerError {
    fn from(_: crate::cancel::CancelledError) -> Self {
        TrainerError::Cancelled
    }
}

impl TrainerError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        TrainerError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a validation error for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        TrainerError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Standard JSON-RPC error codes:
    /// - -32602: Invalid params
    /// - -32603: Internal error
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32002: Project or job not found
    /// - -32003: Pipeline failure
    /// - -32004: Cancelled by user
    /// - -32005: Validation error
    /// - -32006: Project busy
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            TrainerError::InvalidParams { .. } => -32602,

            TrainerError::ProjectNotFound { .. } | TrainerError::JobNotFound { .. } => -32002,

            TrainerError::PipelineFailed { .. } => -32003,

            TrainerError::Cancelled => -32004,

            TrainerError::Validation { .. }
            | TrainerError::InvalidGpuSelection { .. }
            | TrainerError::InvalidPretrained { .. } => -32005,

            TrainerError::ProjectBusy { .. } => -32006,

            // All other errors are internal errors
            _ => -32603,
        }
    }
}

/// Attach a path to `std::io::Error` results.
pub(crate) trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| TrainerError::io_with_path(e, path))
    }
}
