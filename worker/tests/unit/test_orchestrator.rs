//! End-to-end deployment tests

mod common;

use std::time::Duration;

use deployworker::deploy::orchestrator::Orchestrator;
use deployworker::deploy::runner::RunnerOptions;
use deployworker::models::outcome::{DeploymentStatus, ExecutionResult};
use serde_json::json;

use common::{entry_count, has_python, orchestrator, zip_base64};

fn process_result(result: Option<ExecutionResult>) -> (String, String, i32) {
    match result {
        Some(ExecutionResult::Process {
            stdout,
            stderr,
            returncode,
        }) => (stdout, stderr, returncode),
        other => panic!("expected a process result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_python_inline_file() {
    if !has_python() {
        return;
    }
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path())
        .handle(json!({"file": "print(1+1)", "filename": "t.py", "entrypoint": "t.py"}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Completed, "{:?}", outcome);
    assert_eq!(outcome.message, "Entrypoint t.py executed successfully");
    assert_eq!(outcome.files, Some(vec!["t.py".to_string()]));
    assert_eq!(outcome.entrypoint.as_deref(), Some("t.py"));
    let (stdout, _, returncode) = process_result(outcome.result);
    assert_eq!(stdout, "2\n");
    assert_eq!(returncode, 0);
    assert_eq!(entry_count(parent.path()), 0);
}

#[tokio::test]
async fn test_missing_payload() {
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path()).handle(json!({})).await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    let error = outcome.error.unwrap();
    assert!(error.contains("No artifact or file"), "{}", error);
    assert!(outcome.result.is_none());
}

#[tokio::test]
async fn test_nonzero_exit_is_completed() {
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path())
        .handle(json!({"file": "echo failing >&2\nexit 1\n", "filename": "fail.sh", "entrypoint": "sh fail.sh"}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Completed, "{:?}", outcome);
    let (_, stderr, returncode) = process_result(outcome.result);
    assert_eq!(returncode, 1);
    assert_eq!(stderr, "failing\n");
}

#[tokio::test]
async fn test_timeout_fails_and_cleans_up() {
    let parent = tempfile::tempdir().unwrap();
    let options = RunnerOptions {
        timeout: Duration::from_millis(300),
        allow_shell_commands: true,
        ..Default::default()
    };
    let outcome = Orchestrator::new(options)
        .with_workdir_parent(parent.path())
        .handle(json!({"file": "", "filename": "placeholder.txt", "entrypoint": "sleep 5"}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    assert!(outcome.error.unwrap().contains("timed out"));
    assert_eq!(entry_count(parent.path()), 0);
}

#[tokio::test]
async fn test_workdir_exists_during_execution_only() {
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path())
        .handle(json!({"file": "data", "filename": "a.txt", "entrypoint": "pwd; ls"}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Completed, "{:?}", outcome);
    let (stdout, _, _) = process_result(outcome.result);
    let mut lines = stdout.lines();
    let cwd = lines.next().unwrap().to_string();
    assert_eq!(lines.next(), Some("a.txt"));
    assert!(cwd.ends_with("/files"), "{}", cwd);
    assert!(!std::path::Path::new(&cwd).exists());
    assert_eq!(entry_count(parent.path()), 0);
}

#[tokio::test]
async fn test_workdir_removed_after_failure() {
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path())
        .handle(json!({"artifact": zip_base64(&[("app.js", "")]), "entrypoint": "app.js:main"}))
        .await;
    assert_eq!(outcome.status, DeploymentStatus::Failed);

    let outcome = orchestrator(parent.path())
        .handle(json!({"artifact": zip_base64(&[("../x.txt", "")])}))
        .await;
    assert_eq!(outcome.status, DeploymentStatus::Failed);

    assert_eq!(entry_count(parent.path()), 0);
}

#[tokio::test]
async fn test_environment_is_passed_to_entrypoint() {
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path())
        .handle(json!({
            "file": "echo \"$GREETING from $TARGET\"\n",
            "filename": "greet.sh",
            "entrypoint": "sh greet.sh",
            "env": {"GREETING": "hello", "TARGET": "worker"}
        }))
        .await;

    let (stdout, _, _) = process_result(outcome.result);
    assert_eq!(stdout, "hello from worker\n");
    // Never leaks into the worker process
    assert!(std::env::var("GREETING").is_err());
}

#[tokio::test]
async fn test_shell_disabled_by_default() {
    let parent = tempfile::tempdir().unwrap();
    let outcome = Orchestrator::default()
        .with_workdir_parent(parent.path())
        .handle(json!({"file": "x", "filename": "x.txt", "entrypoint": "echo hi"}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    assert!(outcome.error.unwrap().contains("Shell commands are disabled"));
    assert_eq!(entry_count(parent.path()), 0);
}

#[tokio::test]
async fn test_script_runtime_uses_configured_runtime() {
    let parent = tempfile::tempdir().unwrap();
    let options = RunnerOptions {
        script_runtime: "sh".to_string(),
        ..Default::default()
    };
    let outcome = Orchestrator::new(options)
        .with_workdir_parent(parent.path())
        .handle(json!({
            "artifact": zip_base64(&[("src/app.js", "echo runtime ran $0\n")]),
            "entrypoint": "src/app.js"
        }))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Completed, "{:?}", outcome);
    let (stdout, _, returncode) = process_result(outcome.result);
    assert_eq!(stdout, "runtime ran src/app.js\n");
    assert_eq!(returncode, 0);
}

#[tokio::test]
async fn test_artifact_without_entrypoint() {
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path())
        .handle(json!({"artifact": zip_base64(&[("b.txt", "b"), ("a/c.txt", "c")])}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Completed);
    assert_eq!(outcome.message, "Artifact deployed successfully");
    assert_eq!(
        outcome.files,
        Some(vec!["a/c.txt".to_string(), "b.txt".to_string()])
    );
    assert!(outcome.result.is_none());
}

#[tokio::test]
async fn test_file_without_entrypoint_has_preview() {
    let parent = tempfile::tempdir().unwrap();
    let content = "x".repeat(500);
    let outcome = orchestrator(parent.path())
        .with_preview_chars(20)
        .handle(json!({"input": {"file": content, "filename": "big.txt"}}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Completed);
    assert_eq!(outcome.message, "File big.txt deployed successfully");
    assert_eq!(outcome.filename.as_deref(), Some("big.txt"));
    assert_eq!(outcome.content_preview, Some("x".repeat(20)));
}

#[tokio::test]
async fn test_python_symbol_invocation() {
    if !has_python() {
        return;
    }
    let parent = tempfile::tempdir().unwrap();
    let handler = "import os\n\nprint('import side effect')\n\ndef run():\n    return {'answer': 42, 'var': os.environ.get('MODE'), 'cwd_files': sorted(os.listdir('.'))}\n";
    let outcome = orchestrator(parent.path())
        .handle(json!({
            "artifact": zip_base64(&[("handler.py", handler), ("helper.txt", "")]),
            "entrypoint": "handler.py:run",
            "env": {"MODE": "test"}
        }))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Completed, "{:?}", outcome);
    assert_eq!(
        outcome.result,
        Some(ExecutionResult::Function {
            function_result: json!({"answer": 42, "var": "test", "cwd_files": ["handler.py", "helper.txt"]}),
            function_name: "run".to_string(),
        })
    );
    assert_eq!(entry_count(parent.path()), 0);
}

#[tokio::test]
async fn test_python_symbol_can_import_siblings() {
    if !has_python() {
        return;
    }
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path())
        .handle(json!({
            "artifact": zip_base64(&[
                ("main.py", "from util import double\n\ndef main():\n    return double(21)\n"),
                ("util.py", "def double(x):\n    return x * 2\n"),
            ]),
            "entrypoint": "main.py:main"
        }))
        .await;

    match outcome.result {
        Some(ExecutionResult::Function { function_result, .. }) => {
            assert_eq!(function_result, json!(42))
        }
        other => panic!("unexpected result {:?} ({:?})", other, outcome.error),
    }
}

#[tokio::test]
async fn test_python_symbol_not_found() {
    if !has_python() {
        return;
    }
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path())
        .handle(json!({"file": "def run():\n    return 1\n", "filename": "h.py", "entrypoint": "h.py:missing"}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    let error = outcome.error.unwrap();
    assert!(error.starts_with("Symbol not found"), "{}", error);
    assert!(error.contains("missing"), "{}", error);
}

#[tokio::test]
async fn test_python_module_import_error() {
    if !has_python() {
        return;
    }
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path())
        .handle(json!({"file": "import not_a_real_module_xyz\n", "filename": "h.py", "entrypoint": "h.py:run"}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    let error = outcome.error.unwrap();
    assert!(error.starts_with("Import error"), "{}", error);
    assert!(error.contains("not_a_real_module_xyz"), "{}", error);
}

#[tokio::test]
async fn test_python_symbol_raising_is_fatal() {
    if !has_python() {
        return;
    }
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path())
        .handle(json!({"file": "def run():\n    raise ValueError('bad input')\n", "filename": "h.py", "entrypoint": "h.py:run"}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    let error = outcome.error.unwrap();
    assert!(error.contains("ValueError: bad input"), "{}", error);
}

#[tokio::test]
async fn test_missing_python_module_file() {
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path())
        .handle(json!({"file": "", "filename": "other.py", "entrypoint": "absent.py:run"}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    assert!(outcome.error.unwrap().starts_with("Import error"));
}

#[tokio::test]
async fn test_line_wrapped_artifact() {
    let parent = tempfile::tempdir().unwrap();
    let data = "x".repeat(400);
    let encoded = zip_base64(&[("pkg/data.txt", data.as_str()), ("README.md", "hi")]);
    let wrapped: String = encoded
        .as_bytes()
        .chunks(76)
        .map(|line| format!("{}\n", std::str::from_utf8(line).unwrap()))
        .collect();

    let outcome = orchestrator(parent.path())
        .handle(json!({"artifact": wrapped}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Completed, "{:?}", outcome);
    assert_eq!(
        outcome.files,
        Some(vec!["README.md".to_string(), "pkg/data.txt".to_string()])
    );
}

#[tokio::test]
async fn test_python_script_with_space_runs_without_shell() {
    if !has_python() {
        return;
    }
    let parent = tempfile::tempdir().unwrap();
    let options = RunnerOptions {
        timeout: Duration::from_secs(10),
        ..Default::default()
    };
    let outcome = Orchestrator::new(options)
        .with_workdir_parent(parent.path())
        .handle(json!({"file": "print(1+1)", "filename": "my script.py", "entrypoint": "my script.py"}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Completed, "{:?}", outcome);
    let (stdout, _, _) = process_result(outcome.result);
    assert_eq!(stdout, "2\n");
}

#[tokio::test]
async fn test_empty_symbol_runs_script() {
    if !has_python() {
        return;
    }
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path())
        .handle(json!({"file": "print('as script')", "filename": "t.py", "entrypoint": "t.py:"}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Completed, "{:?}", outcome);
    assert_eq!(outcome.entrypoint.as_deref(), Some("t.py:"));
    let (stdout, _, _) = process_result(outcome.result);
    assert_eq!(stdout, "as script\n");
}

#[tokio::test]
async fn test_python_symbol_failure_carries_traceback() {
    if !has_python() {
        return;
    }
    let parent = tempfile::tempdir().unwrap();
    let outcome = orchestrator(parent.path())
        .handle(json!({"file": "def run():\n    raise ValueError('bad input')\n", "filename": "h.py", "entrypoint": "h.py:run"}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    let traceback = outcome.traceback.unwrap();
    assert!(traceback.starts_with("Traceback"), "{}", traceback);
    assert!(traceback.contains("h.py"), "{}", traceback);
    assert!(traceback.ends_with("ValueError: bad input"), "{}", traceback);
}

#[tokio::test]
async fn test_python_symbol_timeout_error_is_short() {
    if !has_python() {
        return;
    }
    let parent = tempfile::tempdir().unwrap();
    let options = RunnerOptions {
        timeout: Duration::from_millis(500),
        ..Default::default()
    };
    let outcome = Orchestrator::new(options)
        .with_workdir_parent(parent.path())
        .handle(json!({"file": "import time\ndef run():\n    time.sleep(30)\n", "filename": "h.py", "entrypoint": "h.py:run"}))
        .await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    let error = outcome.error.unwrap();
    assert!(error.contains("timed out"), "{}", error);
    assert!(error.contains("<inline script> h.py run"), "{}", error);
    assert!(!error.contains("importlib"), "{}", error);
    assert_eq!(entry_count(parent.path()), 0);
}
