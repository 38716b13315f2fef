//! Integration Tests for Command Dispatch
//!
//! Runs real commands end to end: resolution, the PTY host binary, output
//! streaming and exit-code interpretation on the direct executable path.

#![cfg(unix)]

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::collections::HashMap;
use std::time::Duration;

use blackscreen::pty::execute_command_with;
use blackscreen::{CommandLine, Error, HostOs};
use tempfile::TempDir;
use test_utils::{context_in, executor, pty_host, wait_until};

#[tokio::test]
async fn test_ls_in_path_succeeds() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("visible.txt"), "x").unwrap();

    let exec = executor(&["ls"], HostOs::Unix);
    let (mut ctx, sink) = context_in("ls", dir.path());

    exec.execute(&mut ctx).await.unwrap();
    assert!(sink.text().contains("visible.txt"));

    let session = ctx.active_session().expect("session stays attached");
    assert!(!session.is_running());
    assert_eq!(session.exit_state().code(), Some(0));
}

#[tokio::test]
async fn test_unknown_command_reports_not_found() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&["ls"], HostOs::Unix);
    let (mut ctx, sink) = context_in("bogus123 with args", dir.path());

    let err = exec.execute(&mut ctx).await.unwrap_err();
    assert_eq!(err.to_string(), "Black Screen: command \"bogus123\" not found.");
    assert!(sink.contents().is_empty());
    assert!(ctx.active_session().is_none());
}

#[tokio::test]
async fn test_nonzero_exit_carries_code() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&["false", "sh"], HostOs::Unix);

    let (mut ctx, _) = context_in("false", dir.path());
    let err = exec.execute(&mut ctx).await.unwrap_err();
    assert!(matches!(err, Error::NonZeroExit { ref command, code: 1 } if command == "false"));

    let (mut ctx, _) = context_in("sh", dir.path());
    ctx.set_command(CommandLine::new(["sh", "-c", "exit 7"]));
    let err = exec.execute(&mut ctx).await.unwrap_err();
    assert_eq!(err.exit_code(), Some(7));
}

#[tokio::test]
async fn test_builtin_shadows_executable() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("inner")).unwrap();

    // `cd` is both a builtin and "on the path"; the builtin must win
    let exec = executor(&["cd"], HostOs::Unix);
    let (mut ctx, _) = context_in("cd inner", dir.path());

    exec.execute(&mut ctx).await.unwrap();
    assert!(ctx.active_session().is_none());
    assert_eq!(
        ctx.working_directory(),
        dir.path().join("inner").canonicalize().unwrap()
    );
}

#[tokio::test]
async fn test_working_directory_and_environment_reach_process() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&["pwd", "printenv"], HostOs::Unix);

    let (mut ctx, sink) = context_in("pwd", dir.path());
    exec.execute(&mut ctx).await.unwrap();
    let expected = dir.path().canonicalize().unwrap();
    assert!(sink.text().contains(expected.to_str().unwrap()));

    let mut env: HashMap<String, String> = std::env::vars().collect();
    env.insert("BLACKSCREEN_TEST_VALUE".to_string(), "dispatch-42".to_string());
    let (ctx, sink) = context_in("printenv BLACKSCREEN_TEST_VALUE", dir.path());
    let mut ctx = ctx.with_environment(env);
    exec.execute(&mut ctx).await.unwrap();
    assert!(sink.text().contains("dispatch-42"));
}

#[tokio::test]
async fn test_output_is_forwarded_verbatim() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&["printf"], HostOs::Unix);
    let (mut ctx, sink) = context_in("printf", dir.path());
    ctx.set_command(CommandLine::new(["printf", "\\033[31mred\\033[0m"]));

    exec.execute(&mut ctx).await.unwrap();
    assert!(sink.contents().windows(5).any(|w| w == b"\x1b[31m"));
}

#[tokio::test]
async fn test_timeout_kills_session() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&["sleep"], HostOs::Unix);
    let (mut ctx, _) = context_in("sleep 30", dir.path());

    let started = std::time::Instant::now();
    let err = exec
        .execute_with_timeout(&mut ctx, Duration::from_millis(500))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CommandTimeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));

    let session = ctx.active_session().expect("session was attached");
    assert!(wait_until(Duration::from_secs(5), || !session.is_running()).await);
}

#[tokio::test]
async fn test_execute_command_collects_output() {
    let dir = TempDir::new().unwrap();
    let host = pty_host();

    let output = execute_command_with(&host, "echo", &["captured".to_string()], dir.path())
        .await
        .unwrap();
    assert!(output.contains("captured"));

    let err = execute_command_with(&host, "false", &[], dir.path())
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), Some(1));
}

#[tokio::test]
async fn test_execute_command_uses_capture_size() {
    let dir = TempDir::new().unwrap();
    let output = execute_command_with(&pty_host(), "stty", &["size".to_string()], dir.path())
        .await
        .unwrap();
    assert!(output.contains("20 80"));
}

#[tokio::test]
async fn test_missing_program_is_host_failure() {
    let dir = TempDir::new().unwrap();
    // In the cache but not actually runnable
    let exec = executor(&["definitely-not-installed-xyz"], HostOs::Unix);
    let (mut ctx, _) = context_in("definitely-not-installed-xyz", dir.path());

    let err = exec.execute(&mut ctx).await.unwrap_err();
    assert!(matches!(err, Error::HostTerminated { .. }));
}
