//! Deployment request models

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::WorkerError;

/// Event as it arrives on the wire
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentEvent {
    /// Base64 encoded zip archive
    #[serde(default)]
    pub artifact: Option<String>,

    /// Raw file content
    #[serde(default)]
    pub file: Option<String>,

    /// Target filename for `file`
    #[serde(default)]
    pub filename: Option<String>,

    /// `<path>` or `<path>:<symbol>`, or a raw command
    #[serde(default)]
    pub entrypoint: Option<String>,

    /// Environment applied to the executed entrypoint
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl DeploymentEvent {
    /// Parse an event, unwrapping the `{"input": {...}}` envelope used by
    /// serverless platforms when present.
    pub fn from_value(value: Value) -> Result<Self, WorkerError> {
        let value = match value {
            Value::Object(mut map) if matches!(map.get("input"), Some(Value::Object(_))) => {
                map.remove("input").unwrap_or(Value::Null)
            }
            other => other,
        };
        if !value.is_object() {
            return Err(WorkerError::PayloadError(
                "Deployment event must be a JSON object".to_string(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// The payload to materialize
#[derive(Clone, PartialEq, Eq)]
pub enum Payload {
    /// Decoded zip archive bytes
    Archive(Vec<u8>),

    /// A single file written verbatim
    InlineFile { content: String, filename: String },
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Archive(bytes) => write!(f, "Archive({} bytes)", bytes.len()),
            Payload::InlineFile { content, filename } => f
                .debug_struct("InlineFile")
                .field("filename", filename)
                .field("content_len", &content.len())
                .finish(),
        }
    }
}

/// A validated deployment request
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub payload: Payload,
    pub entrypoint: Option<String>,
    pub environment: HashMap<String, String>,
}

impl DeploymentRequest {
    /// Validate a wire event into a request
    pub fn from_event(event: DeploymentEvent) -> Result<Self, WorkerError> {
        let payload = match (event.artifact, event.file) {
            (Some(_), Some(_)) => {
                return Err(WorkerError::PayloadError(
                    "Provide either an artifact or a file, not both".to_string(),
                ));
            }
            (Some(encoded), None) => {
                // Encoders commonly wrap lines; whitespace is never part of the alphabet
                let compact: String = encoded
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                let bytes = BASE64.decode(compact).map_err(|e| {
                    WorkerError::PayloadError(format!("Artifact is not valid base64: {}", e))
                })?;
                Payload::Archive(bytes)
            }
            (None, Some(content)) => {
                let filename = event
                    .filename
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| {
                        WorkerError::PayloadError(
                            "A filename is required when deploying a file".to_string(),
                        )
                    })?;
                Payload::InlineFile { content, filename }
            }
            (None, None) => {
                return Err(WorkerError::PayloadError(
                    "No artifact or file provided in deployment".to_string(),
                ));
            }
        };

        for (key, value) in &event.env {
            if key.is_empty() || key.contains('=') || key.contains('\0') {
                return Err(WorkerError::PayloadError(format!(
                    "Invalid environment variable name: {:?}",
                    key
                )));
            }
            if value.contains('\0') {
                return Err(WorkerError::PayloadError(format!(
                    "Environment variable {} contains a NUL byte",
                    key
                )));
            }
        }

        let entrypoint = event
            .entrypoint
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        Ok(Self {
            payload,
            entrypoint,
            environment: event.env,
        })
    }

    /// Parse and validate a raw JSON event
    pub fn from_value(value: Value) -> Result<Self, WorkerError> {
        Self::from_event(DeploymentEvent::from_value(value)?)
    }
}
