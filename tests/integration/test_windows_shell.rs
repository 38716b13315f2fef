//! Integration Tests for the Windows Shell Path
//!
//! The resolver is told it runs on Windows and a shell script stands in for
//! `cmd.exe`, so the whole path (shell resolution, `/s /c` argument shape,
//! exit-code handling) runs on any Unix machine.

#![cfg(unix)]

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::sync::Arc;

use blackscreen::{
    BuiltinRegistry, CommandExecutor, CommandLine, Config, Error, HostOs, StrategyKind,
};
use tempfile::TempDir;
use test_utils::{context_in, fake_shell, pty_host};

fn windows_executor(shell: Option<&str>) -> CommandExecutor {
    let mut config = Config::default();
    config.windows_shell.program = shell.map(str::to_string);
    CommandExecutor::new(
        Arc::new(BuiltinRegistry::default()),
        Arc::new(std::collections::HashSet::<String>::new()),
        &config,
    )
    .with_host_os(HostOs::Windows)
    .with_host(pty_host())
}

#[tokio::test]
async fn test_command_line_passed_as_single_argument() {
    let dir = TempDir::new().unwrap();
    let shell = fake_shell(dir.path(), 0);
    let exec = windows_executor(Some(shell.to_str().unwrap()));

    let (mut ctx, sink) = context_in("dir", dir.path());
    ctx.set_command(CommandLine::with_expansion(
        vec!["ll".to_string()],
        vec!["dir".to_string(), "/b".to_string(), "C:\\Users".to_string()],
    ));

    exec.execute(&mut ctx).await.unwrap();
    let text = sink.text();
    assert!(text.contains("[/s]"), "got {:?}", text);
    assert!(text.contains("[/c]"));
    assert!(text.contains("[dir /b C:\\Users]"));
}

#[tokio::test]
async fn test_nonzero_exit_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let shell = fake_shell(dir.path(), 3);
    let exec = windows_executor(Some(shell.to_str().unwrap()));

    let (mut ctx, _) = context_in("bogus123", dir.path());
    assert_eq!(exec.resolve("bogus123").await, StrategyKind::WindowsShell);
    exec.execute(&mut ctx).await.unwrap();

    let session = ctx.active_session().expect("session attached");
    assert_eq!(session.exit_state().code(), Some(3));
}

#[tokio::test]
async fn test_comspec_is_used_without_override() {
    let dir = TempDir::new().unwrap();
    let shell = fake_shell(dir.path(), 0);
    let exec = windows_executor(None);

    let (mut ctx, sink) = context_in("ver", dir.path());
    ctx.environment_mut()
        .insert("ComSpec".to_string(), shell.display().to_string());

    exec.execute(&mut ctx).await.unwrap();
    assert!(sink.text().contains("[ver]"));
}

#[tokio::test]
async fn test_comspec_lookup_ignores_case() {
    let dir = TempDir::new().unwrap();
    let shell = fake_shell(dir.path(), 0);
    let exec = windows_executor(None);

    let (mut ctx, sink) = context_in("ver", dir.path());
    ctx.environment_mut().remove("ComSpec");
    ctx.environment_mut()
        .insert("COMSPEC".to_string(), shell.display().to_string());

    exec.execute(&mut ctx).await.unwrap();
    assert!(sink.text().contains("[ver]"), "got {:?}", sink.text());
}

#[tokio::test]
async fn test_spawn_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let exec = windows_executor(Some("/nonexistent/cmd.exe"));

    let (mut ctx, _) = context_in("dir", dir.path());
    let err = exec.execute(&mut ctx).await.unwrap_err();
    assert!(matches!(err, Error::HostTerminated { .. }));
}

#[tokio::test]
async fn test_builtins_still_win_on_windows() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();
    let exec = windows_executor(Some("/nonexistent/cmd.exe"));

    let (mut ctx, _) = context_in("cd docs", dir.path());
    exec.execute(&mut ctx).await.unwrap();
    assert!(ctx.active_session().is_none());
    assert!(ctx.working_directory().ends_with("docs"));
}
