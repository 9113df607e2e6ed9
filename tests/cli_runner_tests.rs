// Subprocess runner tests against `sh -c` standing in for the engine binary
#![cfg(unix)]

use dockside::engine_repo::{CancelToken, CliRunner, EngineRepo, EngineRunner};
use dockside::error::EngineError;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// `sh -c <script> sh <args...>`: the subcommand argv arrives as "$@".
fn sh(script: &str) -> CliRunner {
    CliRunner::new("sh").with_global_args(vec!["-c".into(), script.into(), "sh".into()])
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn argv_reaches_the_process_verbatim() {
    let runner = sh(r#"printf '%s\n' "$@""#);
    let out = runner
        .run(&args(&["a b", "$HOME", "x;y", "{{json .}}"]), &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(out, "a b\n$HOME\nx;y\n{{json .}}\n");
}

#[tokio::test]
async fn non_zero_exit_carries_code_and_stderr() {
    let runner = sh("echo 'Error: No such container: ghost' >&2; exit 3");
    let err = runner
        .run(&args(&["start", "ghost"]), &CancelToken::new())
        .await
        .unwrap_err();
    match err {
        EngineError::Command(e) => {
            assert_eq!(e.exit_code, Some(3));
            assert!(e.stderr.contains("No such container"));
            assert!(e.command.ends_with("start ghost"));
        }
        other => panic!("expected command error, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_binary_is_a_spawn_failure() {
    let err = CliRunner::new("/nonexistent/dockside-engine")
        .run(&args(&["ps"]), &CancelToken::new())
        .await
        .unwrap_err();
    match err {
        EngineError::Command(e) => assert_eq!(e.exit_code, None),
        other => panic!("expected command error, got {:?}", other),
    }
}

#[tokio::test]
async fn slow_command_times_out() {
    let runner = sh("sleep 5").with_timeout(Duration::from_millis(200));
    let started = Instant::now();
    let err = runner.run(&args(&["ps"]), &CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn cancel_kills_in_flight_command() {
    let runner = sh("sleep 5");
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let started = Instant::now();
    let err = runner.run(&args(&["ps"]), &cancel).await.unwrap_err();
    assert!(matches!(err, EngineError::Cancelled { .. }));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn repo_parses_real_process_output() {
    let runner = sh(r#"printf '%s\n' '{"Name":"v1","Driver":"local","Scope":"local"}' '' '{"Name":"v2","Driver":"nfs"}'"#);
    let repo = EngineRepo::new(Arc::new(runner));
    let volumes = repo.list_volumes(&CancelToken::new()).await.unwrap();
    assert_eq!(volumes.len(), 2);
    assert_eq!(volumes[1].driver, "nfs");
    assert_eq!(volumes[1].scope, "local");
}
