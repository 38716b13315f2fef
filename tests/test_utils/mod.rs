//! Test Utilities
//!
//! Shared fixtures for the integration and contract tests. Included from
//! each test target with `#[path]`.

#![allow(dead_code)]

pub mod fixtures;

// Re-exports for convenience
pub use fixtures::{context_in, executor, pty_host, wait_until};
#[cfg(unix)]
pub use fixtures::fake_shell;
