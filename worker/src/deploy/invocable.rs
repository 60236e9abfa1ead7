//! Loading a named callable out of a Python module

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::deploy::process::{run_captured, ExecutionContext};
use crate::errors::WorkerError;
use crate::utils::generate_uuid;

/// A resolved zero-argument callable
#[async_trait]
pub trait Invocable: Send + Sync {
    /// Call with no arguments and return the result as JSON
    async fn call(&self) -> Result<Value, WorkerError>;

    /// Name of the callable
    fn name(&self) -> &str;
}

/// Produces an [`Invocable`] from a script path and a symbol name
pub trait SymbolLoader: Send + Sync {
    fn load(
        &self,
        script: &Path,
        symbol: &str,
        ctx: &ExecutionContext,
    ) -> Result<Box<dyn Invocable>, WorkerError>;
}

// Exit codes the bootstrap uses to report how loading failed
const EXIT_IMPORT_FAILED: i32 = 83;
const EXIT_SYMBOL_MISSING: i32 = 84;
const EXIT_CALL_RAISED: i32 = 85;

/// Loads the module with `importlib`, resolves the symbol, calls it and
/// writes the JSON-encoded return value to the result path.
const BOOTSTRAP: &str = r#"
import importlib.util, json, os, sys, traceback
sys.dont_write_bytecode = True
path, name, out = sys.argv[1], sys.argv[2], sys.argv[3]
sys.argv = [path]
sys.path.insert(0, os.getcwd())
try:
    spec = importlib.util.spec_from_file_location(os.path.splitext(os.path.basename(path))[0], path)
    module = importlib.util.module_from_spec(spec)
    spec.loader.exec_module(module)
except BaseException:
    traceback.print_exc()
    sys.exit(83)
func = getattr(module, name, None)
if func is None:
    sys.stderr.write("module %r has no attribute %r\n" % (path, name))
    sys.exit(84)
if not callable(func):
    sys.stderr.write("%r in %r is not callable\n" % (name, path))
    sys.exit(84)
try:
    result = func()
except BaseException:
    traceback.print_exc()
    sys.exit(85)
with open(out, "w") as fh:
    json.dump(result, fh, default=repr)
"#;

/// Loader backed by a Python interpreter child process
#[derive(Debug, Clone)]
pub struct PythonSymbolLoader {
    interpreter: String,
}

impl PythonSymbolLoader {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

impl SymbolLoader for PythonSymbolLoader {
    fn load(
        &self,
        script: &Path,
        symbol: &str,
        ctx: &ExecutionContext,
    ) -> Result<Box<dyn Invocable>, WorkerError> {
        if !ctx.cwd.join(script).is_file() {
            return Err(WorkerError::ImportError(format!(
                "No module file at {}",
                script.display()
            )));
        }

        Ok(Box::new(PythonSymbol {
            interpreter: self.interpreter.clone(),
            script: script.to_path_buf(),
            symbol: symbol.to_string(),
            result_path: ctx.scratch_dir.join(format!("invoke-{}.json", generate_uuid())),
            ctx: ctx.clone(),
        }))
    }
}

/// A symbol inside a Python module, called in a child interpreter
struct PythonSymbol {
    interpreter: String,
    script: PathBuf,
    symbol: String,
    result_path: PathBuf,
    ctx: ExecutionContext,
}

#[async_trait]
impl Invocable for PythonSymbol {
    async fn call(&self) -> Result<Value, WorkerError> {
        info!("Calling {} in {}", self.symbol, self.script.display());

        let args: [&OsStr; 5] = [
            OsStr::new("-c"),
            OsStr::new(BOOTSTRAP),
            self.script.as_os_str(),
            OsStr::new(&self.symbol),
            self.result_path.as_os_str(),
        ];
        let output = run_captured(&self.interpreter, args, &self.ctx).await?;
        let detail = last_line(&output.stderr);

        let err = match output.returncode {
            0 => None,
            EXIT_IMPORT_FAILED => Some(WorkerError::ImportError(format!(
                "Failed to load {}: {}",
                self.script.display(),
                detail
            ))),
            EXIT_SYMBOL_MISSING => return Err(WorkerError::SymbolNotFound(detail)),
            EXIT_CALL_RAISED => Some(WorkerError::InvocationError(format!(
                "{} raised: {}",
                self.symbol, detail
            ))),
            code => Some(WorkerError::InvocationError(format!(
                "Interpreter exited with {}: {}",
                code, detail
            ))),
        };
        if let Some(err) = err {
            let traceback = output.stderr.trim_end();
            return Err(if traceback.is_empty() {
                err
            } else {
                err.with_traceback(traceback)
            });
        }

        let contents = tokio::fs::read_to_string(&self.result_path).await?;
        let _ = tokio::fs::remove_file(&self.result_path).await;
        debug!("{} returned {} bytes of JSON", self.symbol, contents.len());

        serde_json::from_str(&contents).map_err(|e| {
            WorkerError::InvocationError(format!(
                "{} returned a value that is not valid JSON: {}",
                self.symbol, e
            ))
        })
    }

    fn name(&self) -> &str {
        &self.symbol
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no error output")
        .to_string()
}
