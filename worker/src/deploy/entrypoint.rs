//! Entrypoint parsing and classification

use std::fmt;

use serde::Serialize;

use crate::errors::WorkerError;

/// How an entrypoint gets executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrypointKind {
    /// `<script>.py`, run by the Python interpreter
    PythonScript,
    /// `<script>.py:<symbol>`, a zero-argument callable inside a module
    PythonSymbol,
    /// `<script>.js` / `<script>.ts`, run by the script runtime
    ScriptRuntime,
    /// Anything else, handed to the shell verbatim
    ShellCommand,
}

impl fmt::Display for EntrypointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntrypointKind::PythonScript => "python script",
            EntrypointKind::PythonSymbol => "python symbol",
            EntrypointKind::ScriptRuntime => "script runtime",
            EntrypointKind::ShellCommand => "shell command",
        };
        f.write_str(name)
    }
}

/// A parsed entrypoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrypoint {
    /// The string exactly as requested
    pub raw: String,
    /// Script path, or the whole command for shell entrypoints
    pub script_path: String,
    /// Callable name for `PythonSymbol`
    pub symbol: Option<String>,
    pub kind: EntrypointKind,
}

impl Entrypoint {
    /// Parse an entrypoint descriptor.
    ///
    /// Classification is by extension alone, so paths may contain spaces.
    /// The `:<symbol>` suffix is only meaningful for Python scripts, where an
    /// empty suffix means the script itself. Script runtime entrypoints
    /// reject it; shell commands keep the colon as part of the command.
    pub fn parse(raw: &str) -> Result<Self, WorkerError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(WorkerError::EntrypointError("Entrypoint is empty".to_string()));
        }

        let (script_path, symbol) = match raw.split_once(':') {
            Some((path, symbol)) => (path.trim(), Some(symbol.trim())),
            None => (raw, None),
        };

        if is_python(script_path) {
            return match symbol.filter(|symbol| !symbol.is_empty()) {
                None => Ok(Self::new(raw, script_path, None, EntrypointKind::PythonScript)),
                Some(symbol) if is_identifier(symbol) => Ok(Self::new(
                    raw,
                    script_path,
                    Some(symbol),
                    EntrypointKind::PythonSymbol,
                )),
                Some(symbol) => Err(WorkerError::EntrypointError(format!(
                    "Invalid function name {:?} in entrypoint {}",
                    symbol, raw
                ))),
            };
        }

        if is_script_runtime(script_path) {
            if symbol.is_some() {
                return Err(WorkerError::EntrypointError(format!(
                    "Entrypoint {} names a function, which is only supported for Python scripts",
                    raw
                )));
            }
            return Ok(Self::new(raw, script_path, None, EntrypointKind::ScriptRuntime));
        }

        Ok(Self::new(raw, raw, None, EntrypointKind::ShellCommand))
    }

    fn new(raw: &str, script_path: &str, symbol: Option<&str>, kind: EntrypointKind) -> Self {
        Self {
            raw: raw.to_string(),
            script_path: script_path.to_string(),
            symbol: symbol.map(str::to_string),
            kind,
        }
    }
}

impl fmt::Display for Entrypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_python(path: &str) -> bool {
    path.ends_with(".py")
}

fn is_script_runtime(path: &str) -> bool {
    path.ends_with(".js") || path.ends_with(".ts")
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}
