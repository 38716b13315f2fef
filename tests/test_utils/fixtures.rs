//! Test fixtures

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use blackscreen::{
    BufferSink, BuiltinRegistry, CommandExecutor, CommandLine, Config, ExecutionContext, HostOs,
    SessionHost,
};

/// The host binary built alongside the tests
pub fn pty_host() -> SessionHost {
    SessionHost::new(env!("CARGO_BIN_EXE_blackscreen-pty-host"))
}

/// Executor with the default builtins, a fixed executable set and the test host
pub fn executor(executables: &[&str], os: HostOs) -> CommandExecutor {
    let path: HashSet<String> = executables.iter().map(|s| s.to_string()).collect();
    CommandExecutor::new(
        Arc::new(BuiltinRegistry::default()),
        Arc::new(path),
        &Config::default(),
    )
    .with_host_os(os)
    .with_host(pty_host())
}

/// Context for `line` running in `dir`, with its output captured
pub fn context_in(line: &str, dir: &Path) -> (ExecutionContext, BufferSink) {
    let sink = BufferSink::new();
    let ctx = ExecutionContext::new(CommandLine::parse(line), dir, Arc::new(sink.clone()));
    (ctx, sink)
}

/// Write an executable shell script standing in for `cmd.exe`.
///
/// It prints its arguments one per line, then exits with `exit_code`.
#[cfg(unix)]
pub fn fake_shell(dir: &Path, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-cmd");
    let script = format!(
        "#!/bin/sh\nfor arg in \"$@\"; do printf '[%s]\\n' \"$arg\"; done\nexit {}\n",
        exit_code
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Poll `check` until it passes or `limit` runs out
pub async fn wait_until<F>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
