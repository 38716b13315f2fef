//! Contract Tests for Strategy Precedence
//!
//! Resolution must follow the fixed order BuiltIn, WindowsShell,
//! UnixExecutable, NullFallback no matter how long each predicate takes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blackscreen::execution::select_first;
use blackscreen::{
    BufferSink, BuiltinTable, CommandExecutor, CommandLine, Config, ExecutableLookup,
    ExecutionContext, HostOs, StrategyKind,
};
use proptest::prelude::*;

/// Builtin table that counts invocations
struct CountingBuiltins {
    names: HashSet<String>,
    invoked: AtomicUsize,
}

impl BuiltinTable for CountingBuiltins {
    fn exists(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn invoke(&self, _: &str, _: &[String], _: &mut ExecutionContext) -> anyhow::Result<()> {
        self.invoked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Executable lookup that answers instantly
struct FastLookup(HashSet<String>);

#[async_trait]
impl ExecutableLookup for FastLookup {
    async fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

/// Executable lookup that takes its time
struct SlowLookup(HashSet<String>, Duration);

#[async_trait]
impl ExecutableLookup for SlowLookup {
    async fn contains(&self, name: &str) -> bool {
        tokio::time::sleep(self.1).await;
        self.0.contains(name)
    }
}

fn names(list: &[&str]) -> HashSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn executor_with_table(
    builtins: &[&str],
    lookup: Arc<dyn ExecutableLookup>,
    os: HostOs,
) -> (CommandExecutor, Arc<CountingBuiltins>) {
    let table = Arc::new(CountingBuiltins {
        names: names(builtins),
        invoked: AtomicUsize::new(0),
    });
    let exec = CommandExecutor::new(table.clone(), lookup, &Config::default()).with_host_os(os);
    (exec, table)
}

fn executor(builtins: &[&str], lookup: Arc<dyn ExecutableLookup>, os: HostOs) -> CommandExecutor {
    executor_with_table(builtins, lookup, os).0
}

#[tokio::test]
async fn test_builtin_beats_fast_executable() {
    let exec = executor(&["ls"], Arc::new(FastLookup(names(&["ls"]))), HostOs::Unix);
    assert_eq!(exec.resolve("ls").await, StrategyKind::BuiltIn);
}

#[tokio::test]
async fn test_builtin_runs_without_spawning() {
    let (exec, table) =
        executor_with_table(&["ls"], Arc::new(FastLookup(names(&["ls"]))), HostOs::Unix);
    let exec = exec.with_host(blackscreen::SessionHost::new("/nonexistent/host"));
    let mut ctx = ExecutionContext::new(
        CommandLine::parse("ls -la"),
        std::env::temp_dir(),
        Arc::new(BufferSink::new()),
    );

    exec.execute(&mut ctx).await.unwrap();
    assert_eq!(table.invoked.load(Ordering::SeqCst), 1);
    assert!(ctx.active_session().is_none());
}

#[tokio::test]
async fn test_slow_executable_still_beats_fallback() {
    let lookup = SlowLookup(names(&["ls"]), Duration::from_millis(50));
    let exec = executor(&[], Arc::new(lookup), HostOs::Unix);
    assert_eq!(exec.resolve("ls").await, StrategyKind::UnixExecutable);
    assert_eq!(exec.resolve("nope").await, StrategyKind::NullFallback);
}

#[tokio::test]
async fn test_windows_shell_beats_executable() {
    let exec = executor(&["cd"], Arc::new(FastLookup(names(&["ls"]))), HostOs::Windows);
    assert_eq!(exec.resolve("ls").await, StrategyKind::WindowsShell);
    assert_eq!(exec.resolve("cd").await, StrategyKind::BuiltIn);
}

#[tokio::test]
async fn test_resolution_is_total() {
    let exec = executor(&[], Arc::new(FastLookup(HashSet::new())), HostOs::Unix);
    for name in ["", "bogus123", "../../etc", "名前"] {
        assert_eq!(exec.resolve(name).await, StrategyKind::NullFallback);
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_selection_ignores_completion_order(
        verdicts in prop::collection::vec(any::<bool>(), 1..6),
        delays in prop::collection::vec(0u64..8, 6),
    ) {
        let candidates: Vec<usize> = (0..verdicts.len()).collect();
        let expected = verdicts.iter().position(|v| *v);

        let chosen = runtime().block_on(select_first(&candidates, |i| {
            let (verdict, delay) = (verdicts[i], delays[i]);
            async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                verdict
            }
        }));

        prop_assert_eq!(chosen, expected);
    }
}
