//! Error types for the deployment worker

use std::time::Duration;

use thiserror::Error;

/// Main error type for the deployment worker
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Payload error: {0}")]
    PayloadError(String),

    #[error("Extraction error: {0}")]
    ExtractionError(String),

    #[error("Entrypoint error: {0}")]
    EntrypointError(String),

    #[error("Import error: {0}")]
    ImportError(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Invocation error: {0}")]
    InvocationError(String),

    #[error("Execution timed out after {timeout:?}: {command}")]
    ExecutionTimeout { command: String, timeout: Duration },

    #[error("Shell commands are disabled: {0}")]
    ShellDisabled(String),

    #[error("Failed to spawn {program}: {source}")]
    SpawnError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// An error raised inside user code, with the interpreter's traceback
    #[error("{inner}")]
    WithTraceback {
        inner: Box<WorkerError>,
        traceback: String,
    },
}

impl WorkerError {
    /// Attach traceback text captured from the failing child
    pub fn with_traceback(self, traceback: impl Into<String>) -> Self {
        WorkerError::WithTraceback {
            inner: Box::new(self),
            traceback: traceback.into(),
        }
    }

    pub fn traceback(&self) -> Option<&str> {
        match self {
            WorkerError::WithTraceback { traceback, .. } => Some(traceback),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for WorkerError {
    fn from(err: anyhow::Error) -> Self {
        WorkerError::Internal(format!("{:#}", err))
    }
}

impl From<zip::result::ZipError> for WorkerError {
    fn from(err: zip::result::ZipError) -> Self {
        WorkerError::ExtractionError(err.to_string())
    }
}
