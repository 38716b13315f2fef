//! Contract Tests for Process Session Lifecycle
//!
//! Drives `ProcessSession` against the real `blackscreen-pty-host` binary:
//! input, resize, signals, exit reporting and handle dropping.

#![cfg(unix)]

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use blackscreen::{BufferSink, Dimensions, Error, ExitState, ProcessSession, PtyProcess};
use tempfile::TempDir;
use test_utils::{pty_host, wait_until};

fn process(program: &str, args: &[&str], dir: &Path) -> PtyProcess {
    PtyProcess::new(
        program,
        args.iter().map(|s| s.to_string()).collect(),
        dir.to_path_buf(),
        std::env::vars().collect::<HashMap<_, _>>(),
        Dimensions::default(),
    )
}

async fn spawn(program: &str, args: &[&str], dir: &Path) -> (ProcessSession, BufferSink) {
    let sink = BufferSink::new();
    let session = ProcessSession::spawn(&pty_host(), process(program, args, dir), Arc::new(sink.clone()))
        .await
        .expect("host should spawn");
    (session, sink)
}

#[tokio::test]
async fn test_input_reaches_process() {
    let dir = TempDir::new().unwrap();
    let (session, sink) = spawn("cat", &[], dir.path()).await;
    assert!(session.is_running());

    session.write(b"ping-pong\n");
    assert!(wait_until(Duration::from_secs(5), || sink.text().matches("ping-pong").count() >= 2).await);

    // Ctrl-D at the start of a line ends cat
    session.write(b"\x04");
    assert_eq!(session.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn test_write_beyond_frame_limit_is_delivered_in_full() {
    let dir = TempDir::new().unwrap();
    let total = 17 * 1024 * 1024;
    let script = format!("stty raw -echo; echo ready; head -c {} | wc -c", total);
    let (session, sink) = spawn("sh", &["-c", &script], dir.path()).await;
    assert!(wait_until(Duration::from_secs(5), || sink.text().contains("ready")).await);

    session.write(&vec![b'a'; total]);
    assert_eq!(session.wait().await.unwrap(), 0);
    assert!(sink.text().contains(&total.to_string()), "got {:?}", sink.text());
}

#[tokio::test]
async fn test_resize_before_output_is_observed() {
    let dir = TempDir::new().unwrap();
    let (session, sink) = spawn("sh", &["-c", "sleep 0.5; stty size"], dir.path()).await;

    session.set_dimensions(Dimensions::new(100, 33));
    assert_eq!(session.wait().await.unwrap(), 0);
    assert!(sink.text().contains("33 100"), "got {:?}", sink.text());
}

#[tokio::test]
async fn test_exit_code_is_reported_verbatim() {
    let dir = TempDir::new().unwrap();
    let (session, _) = spawn("sh", &["-c", "exit 42"], dir.path()).await;
    assert_eq!(session.wait().await.unwrap(), 42);
    assert_eq!(session.exit_state(), ExitState::Exited(42));
}

#[tokio::test]
async fn test_operations_after_exit_are_ignored() {
    let dir = TempDir::new().unwrap();
    let (session, sink) = spawn("echo", &["done"], dir.path()).await;
    session.wait().await.unwrap();
    let before = sink.contents();

    session.write(b"ignored\n");
    session.set_dimensions(Dimensions::new(10, 10));
    session.kill("SIGKILL");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.contents(), before);
    assert_eq!(session.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn test_kill_ends_process() {
    let dir = TempDir::new().unwrap();
    let (session, _) = spawn("sleep", &["30"], dir.path()).await;

    session.kill("SIGTERM");
    let result = tokio::time::timeout(Duration::from_secs(10), session.wait()).await;
    assert!(result.expect("killed process should exit").is_ok());
    assert!(!session.is_running());
}

#[tokio::test]
async fn test_unknown_signal_is_ignored() {
    let dir = TempDir::new().unwrap();
    let (session, sink) = spawn("cat", &[], dir.path()).await;

    session.kill("SIGBOGUS");
    session.write(b"still-alive\n");
    assert!(wait_until(Duration::from_secs(5), || sink.text().contains("still-alive")).await);
    assert!(session.is_running());

    session.kill("kill");
    assert!(session.wait().await.is_ok());
}

#[tokio::test]
async fn test_dropping_handle_does_not_kill() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("marker");
    let script = format!("sleep 0.5; echo finished > '{}'", marker.display());
    let (session, _) = spawn("sh", &["-c", &script], dir.path()).await;

    drop(session);
    assert!(wait_until(Duration::from_secs(10), || marker.exists()).await);
}

#[tokio::test]
async fn test_missing_program_terminates_host() {
    let dir = TempDir::new().unwrap();
    let (session, sink) = spawn("/definitely/not/a/program", &[], dir.path()).await;

    let err = session.wait().await.unwrap_err();
    assert!(matches!(err, Error::HostTerminated { .. }));
    assert!(sink.contents().is_empty());
}

#[tokio::test]
async fn test_large_output_is_complete() {
    let dir = TempDir::new().unwrap();
    let (session, sink) = spawn("seq", &["1", "20000"], dir.path()).await;

    assert_eq!(session.wait().await.unwrap(), 0);
    let text = sink.text();
    assert!(text.contains("\n1\r\n") || text.starts_with("1\r\n"));
    assert!(text.trim_end().ends_with("20000"));
}
