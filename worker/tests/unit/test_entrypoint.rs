//! Entrypoint parsing tests

use deployworker::deploy::entrypoint::{Entrypoint, EntrypointKind};
use deployworker::errors::WorkerError;

#[test]
fn test_python_script() {
    let entrypoint = Entrypoint::parse("a.py").unwrap();
    assert_eq!(entrypoint.kind, EntrypointKind::PythonScript);
    assert_eq!(entrypoint.script_path, "a.py");
    assert!(entrypoint.symbol.is_none());
}

#[test]
fn test_python_symbol() {
    let entrypoint = Entrypoint::parse("a.py:run").unwrap();
    assert_eq!(entrypoint.kind, EntrypointKind::PythonSymbol);
    assert_eq!(entrypoint.script_path, "a.py");
    assert_eq!(entrypoint.symbol.as_deref(), Some("run"));
}

#[test]
fn test_nested_python_symbol() {
    let entrypoint = Entrypoint::parse("pkg/handler.py:main").unwrap();
    assert_eq!(entrypoint.kind, EntrypointKind::PythonSymbol);
    assert_eq!(entrypoint.script_path, "pkg/handler.py");
}

#[test]
fn test_script_runtime() {
    assert_eq!(
        Entrypoint::parse("a.js").unwrap().kind,
        EntrypointKind::ScriptRuntime
    );
    assert_eq!(
        Entrypoint::parse("src/index.ts").unwrap().kind,
        EntrypointKind::ScriptRuntime
    );
}

#[test]
fn test_shell_command() {
    let entrypoint = Entrypoint::parse("echo hi").unwrap();
    assert_eq!(entrypoint.kind, EntrypointKind::ShellCommand);
    assert_eq!(entrypoint.script_path, "echo hi");
}

#[test]
fn test_shell_command_keeps_colon() {
    let entrypoint = Entrypoint::parse("echo a:b").unwrap();
    assert_eq!(entrypoint.kind, EntrypointKind::ShellCommand);
    assert_eq!(entrypoint.script_path, "echo a:b");
    assert!(entrypoint.symbol.is_none());
}

#[test]
fn test_python_script_with_space_in_path() {
    let entrypoint = Entrypoint::parse("my script.py").unwrap();
    assert_eq!(entrypoint.kind, EntrypointKind::PythonScript);
    assert_eq!(entrypoint.script_path, "my script.py");

    let entrypoint = Entrypoint::parse("my jobs/run it.py:main").unwrap();
    assert_eq!(entrypoint.kind, EntrypointKind::PythonSymbol);
    assert_eq!(entrypoint.script_path, "my jobs/run it.py");
    assert_eq!(entrypoint.symbol.as_deref(), Some("main"));
}

#[test]
fn test_script_runtime_with_space_in_path() {
    let entrypoint = Entrypoint::parse("web app/index.js").unwrap();
    assert_eq!(entrypoint.kind, EntrypointKind::ScriptRuntime);
    assert_eq!(entrypoint.script_path, "web app/index.js");
}

#[test]
fn test_empty_python_symbol_runs_script() {
    let entrypoint = Entrypoint::parse("t.py:").unwrap();
    assert_eq!(entrypoint.kind, EntrypointKind::PythonScript);
    assert_eq!(entrypoint.script_path, "t.py");
    assert!(entrypoint.symbol.is_none());
    assert_eq!(entrypoint.raw, "t.py:");
}

#[test]
fn test_symbol_on_script_runtime_rejected() {
    let err = Entrypoint::parse("app.js:main").unwrap_err();
    assert!(matches!(err, WorkerError::EntrypointError(_)));
}

#[test]
fn test_invalid_python_symbol_rejected() {
    assert!(matches!(
        Entrypoint::parse("a.py:2fast"),
        Err(WorkerError::EntrypointError(_))
    ));
    assert!(matches!(
        Entrypoint::parse("a.py:mod.func"),
        Err(WorkerError::EntrypointError(_))
    ));
}

#[test]
fn test_empty_entrypoint_rejected() {
    assert!(Entrypoint::parse("   ").is_err());
}
