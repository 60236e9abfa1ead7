//! Settings file management

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deploy::runner::RunnerOptions;
use crate::errors::WorkerError;
use crate::logs::LogLevel;

/// Worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Hard timeout for entrypoint execution in seconds
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_secs: u64,

    /// Interpreter used for `.py` entrypoints
    #[serde(default = "default_python_interpreter")]
    pub python_interpreter: String,

    /// Runtime used for `.js` / `.ts` entrypoints
    #[serde(default = "default_script_runtime")]
    pub script_runtime: String,

    /// Shell used for raw command entrypoints
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Allow entrypoints that fall through to a raw shell command.
    /// Off unless the caller is trusted to run arbitrary commands.
    #[serde(default)]
    pub allow_shell_commands: bool,

    /// Number of characters echoed back in `content_preview`
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,
}

fn default_execution_timeout() -> u64 {
    30
}

fn default_python_interpreter() -> String {
    "python3".to_string()
}

fn default_script_runtime() -> String {
    "node".to_string()
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_preview_chars() -> usize {
    200
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            execution_timeout_secs: default_execution_timeout(),
            python_interpreter: default_python_interpreter(),
            script_runtime: default_script_runtime(),
            shell: default_shell(),
            allow_shell_commands: false,
            preview_chars: default_preview_chars(),
            server: ServerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self, WorkerError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            WorkerError::ConfigError(format!("Unable to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Parse settings from JSON text
    pub fn from_json(contents: &str) -> Result<Self, WorkerError> {
        let settings: Settings = serde_json::from_str(contents)
            .map_err(|e| WorkerError::ConfigError(format!("Invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), WorkerError> {
        if self.execution_timeout_secs == 0 {
            return Err(WorkerError::ConfigError(
                "execution_timeout_secs must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [
            ("python_interpreter", &self.python_interpreter),
            ("script_runtime", &self.script_runtime),
            ("shell", &self.shell),
        ] {
            if value.trim().is_empty() {
                return Err(WorkerError::ConfigError(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }

    /// Execution options derived from these settings
    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            timeout: Duration::from_secs(self.execution_timeout_secs),
            python_interpreter: self.python_interpreter.clone(),
            script_runtime: self.script_runtime.clone(),
            shell: self.shell.clone(),
            allow_shell_commands: self.allow_shell_commands,
        }
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}
