//! Process Session
//!
//! The parent side of a PTY session. A session owns one
//! `blackscreen-pty-host` process, forwards its `Data` frames to an
//! [`OutputSink`] and records the `Exit` frame. Input, resize and signal
//! requests are queued as frames and written by a background task, so every
//! public operation here is non-blocking.
//!
//! Dropping a `ProcessSession` never terminates the process; only
//! [`ProcessSession::kill`] does.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::host::HostArgs;
use super::protocol::{
    ChildMessage, MessageReader, MessageWriter, ParentMessage, ProtocolError, MAX_PAYLOAD_LEN,
};
use crate::context::OutputSink;
use crate::error::{Error, Result};
use crate::models::{Dimensions, ExitState, PtyProcess, SessionFailure};

/// File name of the host executable
pub const HOST_PROGRAM_NAME: &str = "blackscreen-pty-host";

/// Environment variable that overrides the host executable location
pub const HOST_PROGRAM_ENV: &str = "BLACKSCREEN_PTY_HOST";

/// Location of the `blackscreen-pty-host` executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHost {
    program: PathBuf,
}

impl SessionHost {
    /// Use an explicit host executable
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Find the host executable.
    ///
    /// Order: `configured` path, `$BLACKSCREEN_PTY_HOST`, next to the current
    /// executable (or its parent directory, for test binaries under
    /// `deps/`), then the bare name resolved through `PATH`.
    pub fn resolve(configured: Option<&Path>) -> Self {
        if let Some(path) = configured {
            return Self::new(path);
        }

        if let Some(path) = std::env::var_os(HOST_PROGRAM_ENV).filter(|p| !p.is_empty()) {
            return Self::new(path);
        }

        let file_name = format!("{}{}", HOST_PROGRAM_NAME, std::env::consts::EXE_SUFFIX);
        if let Ok(exe) = std::env::current_exe() {
            for dir in exe.ancestors().skip(1).take(2) {
                let candidate = dir.join(&file_name);
                if candidate.is_file() {
                    return Self::new(candidate);
                }
            }
        }

        debug!("PTY host not found next to executable, relying on PATH");
        Self::new(file_name)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for SessionHost {
    fn default() -> Self {
        Self::resolve(None)
    }
}

/// A live (or finished) process running in a pseudoterminal
#[derive(Clone)]
pub struct ProcessSession {
    id: Uuid,
    process: Arc<PtyProcess>,
    outbound: mpsc::UnboundedSender<ParentMessage>,
    exit: watch::Receiver<ExitState>,
}

impl std::fmt::Debug for ProcessSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSession")
            .field("id", &self.id)
            .field("process", &self.process.display_string())
            .field("exit", &*self.exit.borrow())
            .finish()
    }
}

impl ProcessSession {
    /// Spawn `process` through the PTY host and start relaying its output
    /// into `sink`.
    pub async fn spawn(
        host: &SessionHost,
        process: PtyProcess,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Self> {
        let host_args = HostArgs {
            program: process.program.clone(),
            dimensions: process.dimensions,
            args: process.args.clone(),
        };

        let mut command = Command::new(host.program());
        command
            .args(host_args.to_args())
            .current_dir(&process.working_directory)
            .env_clear()
            .envs(&process.environment)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(false);

        let mut child = command.spawn().map_err(|e| Error::CommandSpawnFailed {
            command: process.program.clone(),
            reason: format!("{} ({})", e, host.program().display()),
        })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.start_kill();
                return Err(Error::CommandSpawnFailed {
                    command: process.program.clone(),
                    reason: "PTY host pipes unavailable".to_string(),
                });
            }
        };

        info!(
            "Spawned session for '{}' via host pid {:?}",
            process.display_string(),
            child.id()
        );

        let session = Self::from_transport(process, stdout, stdin, sink);
        tokio::spawn(supervise_host(child, session.exit.clone(), session.id));
        Ok(session)
    }

    /// Build a session over an already connected host channel.
    ///
    /// `reader` carries child→parent frames, `writer` parent→child frames.
    pub fn from_transport<R, W>(
        process: PtyProcess,
        reader: R,
        writer: W,
        sink: Arc<dyn OutputSink>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let id = Uuid::new_v4();
        let process = Arc::new(process);
        let (exit_tx, exit_rx) = watch::channel(ExitState::Running);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(pump_child_messages(
            MessageReader::new(reader),
            sink,
            exit_tx,
            id,
            process.clone(),
        ));
        tokio::spawn(pump_parent_messages(
            MessageWriter::new(writer),
            outbound_rx,
            exit_rx.clone(),
        ));

        Self {
            id,
            process,
            outbound: outbound_tx,
            exit: exit_rx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// What this session runs
    pub fn process(&self) -> &PtyProcess {
        &self.process
    }

    /// Current lifecycle state
    pub fn exit_state(&self) -> ExitState {
        self.exit.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.exit.borrow().is_running()
    }

    /// Type bytes into the process's terminal. Ignored once the session has exited.
    ///
    /// Large writes are queued as several `Input` frames, each within the
    /// frame size limit, in order.
    pub fn write(&self, data: &[u8]) {
        for chunk in data.chunks(MAX_PAYLOAD_LEN) {
            self.send(ParentMessage::Input(chunk.to_vec()));
        }
    }

    /// Resize the process's terminal. Dropped once the session has exited.
    pub fn set_dimensions(&self, dimensions: Dimensions) {
        self.send(ParentMessage::Resize {
            columns: dimensions.columns,
            rows: dimensions.rows,
        });
    }

    /// Ask the host to deliver `signal` (e.g. `"SIGINT"`).
    ///
    /// The outcome is only observable through a later exit.
    pub fn kill(&self, signal: &str) {
        self.send(ParentMessage::Signal(signal.to_string()));
    }

    fn send(&self, message: ParentMessage) {
        if !self.is_running() {
            trace!("Session {} already exited, dropping {:?}", self.id, message);
            return;
        }
        if self.outbound.send(message).is_err() {
            debug!("Session {} writer task is gone", self.id);
        }
    }

    /// Wait until the host reports an exit code.
    ///
    /// Returns the code as-is; interpreting it is up to the caller.
    pub async fn wait(&self) -> Result<i32> {
        let mut exit = self.exit.clone();
        let state = match exit.wait_for(|state| !state.is_running()).await {
            Ok(state) => state.clone(),
            Err(_) => ExitState::Failed(SessionFailure::HostTerminated(
                "session reader stopped".to_string(),
            )),
        };

        match state {
            ExitState::Exited(code) => Ok(code),
            ExitState::Failed(SessionFailure::MalformedMessage(reason)) => {
                Err(Error::MalformedChildMessage { reason })
            }
            ExitState::Failed(SessionFailure::HostTerminated(reason)) => {
                Err(Error::HostTerminated { reason })
            }
            ExitState::Running => Err(Error::HostTerminated {
                reason: "session ended while running".to_string(),
            }),
        }
    }
}

/// Single consumer of the host's output stream
async fn pump_child_messages<R>(
    mut reader: MessageReader<R>,
    sink: Arc<dyn OutputSink>,
    exit_tx: watch::Sender<ExitState>,
    id: Uuid,
    process: Arc<PtyProcess>,
) where
    R: AsyncRead + Unpin,
{
    let final_state = loop {
        match reader.recv::<ChildMessage>().await {
            Ok(Some(ChildMessage::Data(data))) => sink.accept(&data),
            Ok(Some(ChildMessage::Exit(code))) => {
                debug!(
                    "Session {} ('{}') exited with code {} after {}ms",
                    id,
                    process,
                    code,
                    process.elapsed().num_milliseconds()
                );
                break ExitState::Exited(code);
            }
            Ok(None) => {
                warn!("Session {} host closed its output without an exit", id);
                break ExitState::Failed(SessionFailure::HostTerminated(
                    "output closed before exit".to_string(),
                ));
            }
            Err(ProtocolError::Io(e)) => {
                warn!("Session {} lost its host: {}", id, e);
                break ExitState::Failed(SessionFailure::HostTerminated(e.to_string()));
            }
            Err(e) => {
                error!("Session {} received a malformed message: {}", id, e);
                break ExitState::Failed(SessionFailure::MalformedMessage(e.to_string()));
            }
        }
    };
    exit_tx.send_replace(final_state);
}

/// Writes queued control messages until the session ends or every handle is gone
async fn pump_parent_messages<W>(
    mut writer: MessageWriter<W>,
    mut outbound: mpsc::UnboundedReceiver<ParentMessage>,
    mut exit: watch::Receiver<ExitState>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(message) => {
                    if let Err(e) = writer.send(&message).await {
                        debug!("Failed to write control message: {}", e);
                        break;
                    }
                }
                None => break,
            },
            _ = settled(&mut exit, |state| !state.is_running()) => break,
        }
    }
    let _ = writer.shutdown().await;
}

/// Resolve once the exit state satisfies `done`, releasing the watch guard
async fn settled<F>(exit: &mut watch::Receiver<ExitState>, done: F)
where
    F: FnMut(&ExitState) -> bool,
{
    let _ = exit.wait_for(done).await;
}

/// Reap the host process; kill it if its stream turned out to be corrupt
async fn supervise_host(mut child: Child, mut exit: watch::Receiver<ExitState>, id: Uuid) {
    tokio::select! {
        status = child.wait() => {
            debug!("Session {} host finished: {:?}", id, status);
            return;
        }
        _ = settled(&mut exit, |state| {
            matches!(state, ExitState::Failed(SessionFailure::MalformedMessage(_)))
        }) => {}
    }

    warn!("Session {} killing host after protocol violation", id);
    if let Err(e) = child.start_kill() {
        warn!("Failed to kill PTY host: {}", e);
    }
    let _ = child.wait().await;
}
