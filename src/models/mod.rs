//! Core data models for Black Screen
//!
//! Plain data shared by the execution context, the strategies and the
//! process sessions.

pub mod dimensions;
pub mod pty_process;

// Re-exports for convenience
pub use dimensions::Dimensions;
pub use pty_process::{ExitState, PtyProcess, SessionFailure};
