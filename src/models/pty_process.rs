//! PTY Process Model
//!
//! Describes the process a session runs and tracks how it ended.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;

use super::Dimensions;

/// Lifecycle state of a session's process
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExitState {
    /// Process is still running
    #[default]
    Running,
    /// The host reported an exit code
    Exited(i32),
    /// The session channel broke before an exit code arrived
    Failed(SessionFailure),
}

/// Why a session ended without an exit code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    /// The host sent a frame that is not a valid child message
    MalformedMessage(String),
    /// The host closed the channel or died before sending `Exit`
    HostTerminated(String),
}

impl std::fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionFailure::MalformedMessage(reason) => write!(f, "malformed message: {}", reason),
            SessionFailure::HostTerminated(reason) => write!(f, "host terminated: {}", reason),
        }
    }
}

impl ExitState {
    /// Check if the process is still running
    pub fn is_running(&self) -> bool {
        matches!(self, ExitState::Running)
    }

    /// Exit code, if the process exited normally
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitState::Exited(code) => Some(*code),
            _ => None,
        }
    }
}

/// The process a session was asked to run
#[derive(Debug, Clone)]
pub struct PtyProcess {
    /// Program to execute (name or path)
    pub program: String,

    /// Arguments passed to the program
    pub args: Vec<String>,

    /// Working directory the program starts in
    pub working_directory: PathBuf,

    /// Full environment of the program
    pub environment: HashMap<String, String>,

    /// Initial terminal size
    pub dimensions: Dimensions,

    /// When the session was spawned
    pub start_time: DateTime<Utc>,
}

impl PtyProcess {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        working_directory: PathBuf,
        environment: HashMap<String, String>,
        dimensions: Dimensions,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            working_directory,
            environment,
            dimensions,
            start_time: Utc::now(),
        }
    }

    /// Time since the session was spawned
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.start_time
    }

    /// Get a display string for the process
    pub fn display_string(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

impl std::fmt::Display for PtyProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_string())
    }
}
