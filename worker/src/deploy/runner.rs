//! Entrypoint runner implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::deploy::entrypoint::{Entrypoint, EntrypointKind};
use crate::deploy::invocable::{PythonSymbolLoader, SymbolLoader};
use crate::deploy::process::{run_captured, ExecutionContext};
use crate::errors::WorkerError;
use crate::filesys::paths::sanitize_relative;
use crate::models::outcome::ExecutionResult;

/// Options shared by every runner
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Hard limit on entrypoint runtime
    pub timeout: Duration,

    /// Interpreter for `.py` entrypoints
    pub python_interpreter: String,

    /// Runtime for `.js` / `.ts` entrypoints
    pub script_runtime: String,

    /// Shell for raw command entrypoints
    pub shell: String,

    /// Whether raw shell commands may run at all
    pub allow_shell_commands: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            python_interpreter: "python3".to_string(),
            script_runtime: "node".to_string(),
            shell: "sh".to_string(),
            allow_shell_commands: false,
        }
    }
}

/// Entrypoint runner trait
#[async_trait]
pub trait EntrypointRunner: Send + Sync {
    /// Execute the entrypoint inside `ctx`
    async fn execute(&self, ctx: &ExecutionContext) -> Result<ExecutionResult, WorkerError>;

    /// Get the entrypoint kind this runner handles
    fn kind(&self) -> EntrypointKind;
}

/// Factory for creating entrypoint runners
pub struct RunnerFactory;

impl RunnerFactory {
    /// Create the runner for a parsed entrypoint
    pub fn create(
        entrypoint: &Entrypoint,
        options: &RunnerOptions,
    ) -> Result<Box<dyn EntrypointRunner>, WorkerError> {
        let runner: Box<dyn EntrypointRunner> = match entrypoint.kind {
            EntrypointKind::PythonScript => Box::new(PythonScriptRunner {
                interpreter: options.python_interpreter.clone(),
                script: script_path(entrypoint)?,
            }),
            EntrypointKind::PythonSymbol => Box::new(PythonSymbolRunner {
                loader: Arc::new(PythonSymbolLoader::new(options.python_interpreter.clone())),
                script: script_path(entrypoint)?,
                symbol: entrypoint.symbol.clone().ok_or_else(|| {
                    WorkerError::EntrypointError(format!("No function named in {}", entrypoint))
                })?,
            }),
            EntrypointKind::ScriptRuntime => Box::new(ScriptRuntimeRunner {
                runtime: options.script_runtime.clone(),
                script: script_path(entrypoint)?,
            }),
            EntrypointKind::ShellCommand => {
                if !options.allow_shell_commands {
                    return Err(WorkerError::ShellDisabled(format!(
                        "refusing to run {:?}; enable allow_shell_commands to permit it",
                        entrypoint.raw
                    )));
                }
                Box::new(ShellCommandRunner {
                    shell: options.shell.clone(),
                    command: entrypoint.raw.clone(),
                })
            }
        };

        debug!("Created {} runner for {}", runner.kind(), entrypoint);
        Ok(runner)
    }
}

/// Script paths must stay inside the working directory
fn script_path(entrypoint: &Entrypoint) -> Result<PathBuf, WorkerError> {
    sanitize_relative(Path::new(&entrypoint.script_path)).ok_or_else(|| {
        WorkerError::EntrypointError(format!(
            "Script path {:?} escapes the working directory",
            entrypoint.script_path
        ))
    })
}

fn process_result(output: crate::deploy::process::CapturedOutput) -> ExecutionResult {
    ExecutionResult::Process {
        stdout: output.stdout,
        stderr: output.stderr,
        returncode: output.returncode,
    }
}

/// Runs a Python file with the interpreter
pub struct PythonScriptRunner {
    interpreter: String,
    script: PathBuf,
}

#[async_trait]
impl EntrypointRunner for PythonScriptRunner {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<ExecutionResult, WorkerError> {
        info!("Running Python script: {}", self.script.display());
        let output = run_captured(&self.interpreter, [self.script.as_os_str()], ctx).await?;
        Ok(process_result(output))
    }

    fn kind(&self) -> EntrypointKind {
        EntrypointKind::PythonScript
    }
}

/// Calls a named function inside a Python module
pub struct PythonSymbolRunner {
    loader: Arc<dyn SymbolLoader>,
    script: PathBuf,
    symbol: String,
}

impl PythonSymbolRunner {
    /// Build a runner around a custom loader
    pub fn with_loader(loader: Arc<dyn SymbolLoader>, script: PathBuf, symbol: String) -> Self {
        Self {
            loader,
            script,
            symbol,
        }
    }
}

#[async_trait]
impl EntrypointRunner for PythonSymbolRunner {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<ExecutionResult, WorkerError> {
        let invocable = self.loader.load(&self.script, &self.symbol, ctx)?;
        let value = invocable.call().await?;
        Ok(ExecutionResult::Function {
            function_result: value,
            function_name: invocable.name().to_string(),
        })
    }

    fn kind(&self) -> EntrypointKind {
        EntrypointKind::PythonSymbol
    }
}

/// Runs a `.js` / `.ts` file with the script runtime
pub struct ScriptRuntimeRunner {
    runtime: String,
    script: PathBuf,
}

#[async_trait]
impl EntrypointRunner for ScriptRuntimeRunner {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<ExecutionResult, WorkerError> {
        info!("Running script with {}: {}", self.runtime, self.script.display());
        let output = run_captured(&self.runtime, [self.script.as_os_str()], ctx).await?;
        Ok(process_result(output))
    }

    fn kind(&self) -> EntrypointKind {
        EntrypointKind::ScriptRuntime
    }
}

/// Hands the raw entrypoint string to the shell
pub struct ShellCommandRunner {
    shell: String,
    command: String,
}

#[async_trait]
impl EntrypointRunner for ShellCommandRunner {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<ExecutionResult, WorkerError> {
        info!("Running shell command: {}", self.command);
        let output = run_captured(&self.shell, ["-c", self.command.as_str()], ctx).await?;
        Ok(process_result(output))
    }

    fn kind(&self) -> EntrypointKind {
        EntrypointKind::ShellCommand
    }
}
