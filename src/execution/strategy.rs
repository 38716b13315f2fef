//! Execution strategies
//!
//! The closed set of ways a command can run, their fixed precedence and the
//! order-preserving selection over concurrently evaluated predicates.

use futures::future::join_all;
use std::future::Future;

/// How a command gets run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// In-process handler from the builtin table
    BuiltIn,
    /// Whole command line handed to the Windows command interpreter
    WindowsShell,
    /// Program from the search path, spawned directly
    UnixExecutable,
    /// Reports "command not found"; matches everything
    NullFallback,
}

impl StrategyKind {
    /// Resolution order. `NullFallback` is always last.
    pub const PRECEDENCE: [StrategyKind; 4] = [
        StrategyKind::BuiltIn,
        StrategyKind::WindowsShell,
        StrategyKind::UnixExecutable,
        StrategyKind::NullFallback,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::BuiltIn => "builtin",
            StrategyKind::WindowsShell => "windows-shell",
            StrategyKind::UnixExecutable => "executable",
            StrategyKind::NullFallback => "not-found",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Operating system family the resolver targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Windows,
    Unix,
}

impl HostOs {
    /// The OS this binary was built for
    pub fn current() -> Self {
        if cfg!(windows) {
            HostOs::Windows
        } else {
            HostOs::Unix
        }
    }

    pub fn is_windows(self) -> bool {
        self == HostOs::Windows
    }
}

impl Default for HostOs {
    fn default() -> Self {
        Self::current()
    }
}

/// Evaluate `predicate` for every candidate concurrently and return the first
/// candidate, in slice order, whose predicate is true.
///
/// Completion order of the predicates never affects the result.
pub async fn select_first<T, F, Fut>(candidates: &[T], predicate: F) -> Option<T>
where
    T: Copy,
    F: Fn(T) -> Fut,
    Fut: Future<Output = bool>,
{
    let verdicts = join_all(candidates.iter().map(|&candidate| predicate(candidate))).await;
    candidates
        .iter()
        .zip(verdicts)
        .find_map(|(&candidate, accepted)| accepted.then_some(candidate))
}

/// Pick the Windows command interpreter.
///
/// Order: `configured`, `ComSpec`, `{SystemRoot}\System32\cmd.exe`, `cmd.exe`.
pub fn resolve_windows_shell<F>(configured: Option<&str>, env: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    if let Some(program) = configured.filter(|p| !p.trim().is_empty()) {
        return program.to_string();
    }
    if let Some(comspec) = non_empty(env("ComSpec")) {
        return comspec;
    }
    if let Some(root) = non_empty(env("SystemRoot")) {
        return format!("{}\\System32\\cmd.exe", root.trim_end_matches('\\'));
    }
    "cmd.exe".to_string()
}

/// Arguments for the shell: its flags, then the whole command line as one argument
pub fn windows_shell_args(flags: &[String], expanded_tokens: &[String]) -> Vec<String> {
    let mut args = flags.to_vec();
    args.push(expanded_tokens.join(" "));
    args
}
