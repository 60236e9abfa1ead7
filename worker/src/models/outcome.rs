//! Deployment outcome models

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::WorkerError;

/// Terminal status of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeploymentStatus {
    Completed,
    Failed,
}

/// What an entrypoint produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutionResult {
    /// Captured output of a child process
    Process {
        stdout: String,
        stderr: String,
        returncode: i32,
    },

    /// Return value of an invoked function
    Function {
        function_result: Value,
        function_name: String,
    },
}

impl ExecutionResult {
    /// Exit code for process results
    pub fn returncode(&self) -> Option<i32> {
        match self {
            ExecutionResult::Process { returncode, .. } => Some(*returncode),
            ExecutionResult::Function { .. } => None,
        }
    }
}

/// Structured result returned for every deployment, success or failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    pub message: String,

    pub status: DeploymentStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_preview: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Interpreter traceback for failures raised inside user code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

impl DeploymentOutcome {
    /// A completed outcome with only a message and file list
    pub fn completed(message: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            message: message.into(),
            status: DeploymentStatus::Completed,
            files: Some(files),
            entrypoint: None,
            filename: None,
            content_preview: None,
            result: None,
            error: None,
            traceback: None,
        }
    }

    /// A failed outcome carrying the error description
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            message: "Deployment failed".to_string(),
            status: DeploymentStatus::Failed,
            files: None,
            entrypoint: None,
            filename: None,
            content_preview: None,
            result: None,
            error: Some(error.into()),
            traceback: None,
        }
    }

    /// A failed outcome for `err`, keeping any traceback it carries
    pub fn from_error(err: &WorkerError) -> Self {
        let mut outcome = Self::failed(err.to_string());
        outcome.traceback = err.traceback().map(str::to_string);
        outcome
    }

    pub fn is_completed(&self) -> bool {
        self.status == DeploymentStatus::Completed
    }
}
