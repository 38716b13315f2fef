//! Execution context
//!
//! Everything a strategy needs to run one command line: the parsed command,
//! where it runs, how big its terminal is, where its output goes and which
//! process session (if any) is currently attached.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::models::Dimensions;
use crate::pty::ProcessSession;

/// Receives raw output bytes, one call per `Data` message
pub trait OutputSink: Send + Sync {
    fn accept(&self, data: &[u8]);
}

impl<F> OutputSink for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn accept(&self, data: &[u8]) {
        self(data)
    }
}

/// Sink that keeps everything in memory
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bytes received so far
    pub fn contents(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Received bytes as (lossy) UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn clear(&self) {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl OutputSink for BufferSink {
    fn accept(&self, data: &[u8]) {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(data);
    }
}

/// Holder for the session a context is currently attached to.
///
/// Cloning yields another handle to the same slot, so external actors
/// (an input forwarder, a resize handler) can reach the live session while
/// the owner awaits its completion.
#[derive(Clone)]
pub struct SessionSlot {
    current: Arc<watch::Sender<Option<ProcessSession>>>,
}

impl std::fmt::Debug for SessionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSlot")
            .field("current", &*self.current.borrow())
            .finish()
    }
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSlot {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current: Arc::new(current),
        }
    }

    /// Attach `session`, returning whatever was attached before.
    ///
    /// The previous session is not terminated, even if it is still running.
    pub fn attach(&self, session: ProcessSession) -> Option<ProcessSession> {
        let previous = self.current.send_replace(Some(session));
        if let Some(previous) = previous.as_ref().filter(|s| s.is_running()) {
            warn!(
                "Attaching over live session {} ({})",
                previous.id(),
                previous.process()
            );
        }
        previous
    }

    /// Detach and return the current session without touching its process
    pub fn detach(&self) -> Option<ProcessSession> {
        self.current.send_replace(None)
    }

    /// The attached session, running or not
    pub fn current(&self) -> Option<ProcessSession> {
        self.current.borrow().clone()
    }

    /// The attached session if it is still running
    pub fn live(&self) -> Option<ProcessSession> {
        self.current().filter(|s| s.is_running())
    }

    /// Wait until a session is attached
    pub async fn wait_attached(&self) -> Option<ProcessSession> {
        let mut rx = self.current.subscribe();
        let attached = rx.wait_for(Option::is_some).await.ok()?;
        attached.clone()
    }
}

/// The parsed form of one command line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandLine {
    /// Raw tokens, command name first
    raw: Vec<String>,
    /// Tokens after alias/variable expansion by the caller
    expanded: Vec<String>,
}

impl CommandLine {
    /// Command line whose expanded form equals its raw form
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let raw: Vec<String> = tokens.into_iter().map(Into::into).collect();
        Self {
            expanded: raw.clone(),
            raw,
        }
    }

    /// Command line with a separately expanded token sequence
    pub fn with_expansion(raw: Vec<String>, expanded: Vec<String>) -> Self {
        Self { raw, expanded }
    }

    /// Split on whitespace. No quoting or escaping is interpreted.
    pub fn parse(line: &str) -> Self {
        Self::new(line.split_whitespace())
    }

    pub fn command_name(&self) -> &str {
        self.raw.first().map(String::as_str).unwrap_or("")
    }

    /// Raw arguments after the command name, empty tokens removed
    pub fn arguments(&self) -> Vec<String> {
        self.raw
            .iter()
            .skip(1)
            .filter(|arg| !arg.is_empty())
            .cloned()
            .collect()
    }

    pub fn expanded_tokens(&self) -> &[String] {
        &self.expanded
    }

    pub fn is_empty(&self) -> bool {
        self.command_name().is_empty()
    }
}

/// State for running one command line
pub struct ExecutionContext {
    command: CommandLine,
    working_directory: PathBuf,
    dimensions: Dimensions,
    environment: HashMap<String, String>,
    output: Arc<dyn OutputSink>,
    session: SessionSlot,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("command", &self.command)
            .field("working_directory", &self.working_directory)
            .field("dimensions", &self.dimensions)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// Create a context with default dimensions and the current process environment
    pub fn new(
        command: CommandLine,
        working_directory: impl Into<PathBuf>,
        output: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            command,
            working_directory: working_directory.into(),
            dimensions: Dimensions::default(),
            environment: std::env::vars().collect(),
            output,
            session: SessionSlot::new(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Replace the whole environment handed to spawned processes
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Reuse the context for the next command line (REPL loops).
    ///
    /// The attached session stays attached.
    pub fn set_command(&mut self, command: CommandLine) {
        self.command = command;
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn command_name(&self) -> &str {
        self.command.command_name()
    }

    pub fn arguments(&self) -> Vec<String> {
        self.command.arguments()
    }

    pub fn expanded_tokens(&self) -> &[String] {
        self.command.expanded_tokens()
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn set_working_directory(&mut self, directory: impl Into<PathBuf>) {
        self.working_directory = directory.into();
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Record the new terminal size and pass it on to a live session
    pub fn set_dimensions(&mut self, dimensions: Dimensions) {
        self.dimensions = dimensions;
        if let Some(session) = self.session.live() {
            session.set_dimensions(dimensions);
        }
    }

    pub fn environment(&self) -> &HashMap<String, String> {
        &self.environment
    }

    /// Look up a variable ignoring ASCII case, as Windows does.
    ///
    /// An exact match wins over one that differs only in case.
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.environment
            .get(name)
            .or_else(|| {
                self.environment
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    pub fn environment_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.environment
    }

    /// Handle to the output sink
    pub fn output(&self) -> Arc<dyn OutputSink> {
        Arc::clone(&self.output)
    }

    /// Write bytes straight to the output sink
    pub fn emit(&self, data: &[u8]) {
        self.output.accept(data);
    }

    /// Another handle to this context's session slot
    pub fn session_slot(&self) -> SessionSlot {
        self.session.clone()
    }

    pub fn active_session(&self) -> Option<ProcessSession> {
        self.session.current()
    }

    pub fn attach_session(&self, session: ProcessSession) -> Option<ProcessSession> {
        self.session.attach(session)
    }

    pub fn detach_session(&self) -> Option<ProcessSession> {
        self.session.detach()
    }
}
