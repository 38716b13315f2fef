//! PTY Host
//!
//! The intermediary process every [`ProcessSession`](super::ProcessSession)
//! spawns. It runs the target program inside a pseudoterminal and speaks the
//! framed protocol from [`protocol`](super::protocol) with its parent:
//! control messages arrive on `control`, output and the final exit status
//! leave through `output`.

use portable_pty::{ChildKiller, MasterPty};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;

use super::process::{spawn_pty_process, SpawnedPty};
use super::protocol::{ChildMessage, MessageReader, MessageWriter, ParentMessage};
use super::signals::{send_signal_to_pid, Signal};
use super::streams::{PtyInput, PtyStreams};
use crate::error::{Error, Result};
use crate::models::Dimensions;

/// How long output may stay quiet after the child exited before `Exit` is sent
const DRAIN_IDLE_MS: u64 = 200;

/// Command line of the host: `<program> <columns> <rows> [args...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostArgs {
    pub program: String,
    pub dimensions: Dimensions,
    pub args: Vec<String>,
}

impl HostArgs {
    /// Parse the host's arguments (without the executable name)
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let program = args
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::Other("missing program to run".to_string()))?;
        let columns = parse_cells(args.next(), "columns")?;
        let rows = parse_cells(args.next(), "rows")?;

        Ok(Self {
            program,
            dimensions: Dimensions::new(columns, rows),
            args: args.collect(),
        })
    }

    /// Inverse of [`HostArgs::parse`]
    pub fn to_args(&self) -> Vec<String> {
        let mut out = vec![
            self.program.clone(),
            self.dimensions.columns.to_string(),
            self.dimensions.rows.to_string(),
        ];
        out.extend(self.args.iter().cloned());
        out
    }
}

fn parse_cells(value: Option<String>, what: &str) -> Result<u16> {
    let value = value.ok_or_else(|| Error::Other(format!("missing {}", what)))?;
    match value.parse::<u16>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Other(format!("invalid {}: '{}'", what, value))),
    }
}

/// Run the program described by `args` and relay it until it exits.
///
/// Returns the child's exit code after the `Exit` frame has been written.
/// Spawn failures are returned before any frame is written, so the parent
/// observes a host that died without reporting an exit.
pub async fn run_host<R, W>(args: HostArgs, control: R, output: W) -> Result<i32>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let working_directory = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let spawned =
        spawn_pty_process(&args.program, &args.args, args.dimensions, &working_directory)?;
    let killer = spawned.killer();
    let SpawnedPty {
        master,
        mut child,
        streams,
        pid,
    } = spawned;
    // Locked only for the duration of a resize call
    let master = Mutex::new(master);
    let input = streams.input();

    // Blocking wait on its own thread; the code comes back over a oneshot
    let (exit_tx, exit_rx) = oneshot::channel::<i32>();
    std::thread::spawn(move || {
        let code = match child.wait() {
            Ok(status) => status.exit_code() as i32,
            Err(e) => {
                warn!("Failed to wait for child: {}", e);
                -1
            }
        };
        let _ = exit_tx.send(code);
    });

    let relay = relay_output(streams, exit_rx, MessageWriter::new(output));
    tokio::pin!(relay);
    let apply = apply_control(
        MessageReader::new(control),
        &master,
        input,
        killer.clone_killer(),
        pid,
    );
    tokio::pin!(apply);

    let mut control_open = true;
    loop {
        tokio::select! {
            result = &mut relay => return result,
            result = &mut apply, if control_open => match result {
                Ok(()) => {
                    debug!("Control channel closed; child keeps running");
                    control_open = false;
                }
                Err(e) => {
                    error!("Protocol violation on control channel: {}", e);
                    let mut killer = killer;
                    if let Err(kill_err) = killer.kill() {
                        warn!("Failed to kill child after protocol violation: {}", kill_err);
                    }
                    return Err(e);
                }
            },
        }
    }
}

/// Forward PTY output as `Data` frames, then report the exit code
async fn relay_output<W>(
    mut streams: PtyStreams,
    mut exit_rx: oneshot::Receiver<i32>,
    mut writer: MessageWriter<W>,
) -> Result<i32>
where
    W: AsyncWrite + Unpin,
{
    let code = loop {
        tokio::select! {
            chunk = streams.read() => match chunk {
                Some(data) => writer.send(&ChildMessage::Data(data)).await?,
                None => break (&mut exit_rx).await.unwrap_or(-1),
            },
            code = &mut exit_rx => break code.unwrap_or(-1),
        }
    };

    // Output written just before exit may still be in flight
    while let Ok(Some(data)) = streams.read_with_timeout(DRAIN_IDLE_MS).await {
        writer.send(&ChildMessage::Data(data)).await?;
    }

    writer.send(&ChildMessage::Exit(code)).await?;
    info!("Child exited with code {}", code);
    Ok(code)
}

/// Apply control messages until the parent closes the channel
async fn apply_control<R>(
    mut reader: MessageReader<R>,
    master: &Mutex<Box<dyn MasterPty + Send>>,
    input: PtyInput,
    mut killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    while let Some(message) = reader
        .recv::<ParentMessage>()
        .await
        .map_err(Error::from_control_channel)?
    {
        match message {
            ParentMessage::Input(data) => {
                if !input.send(&data) {
                    debug!("Dropping {} input bytes: PTY writer is gone", data.len());
                }
            }
            ParentMessage::Resize { columns, rows } => resize(master, columns, rows),
            ParentMessage::Signal(name) => deliver_signal(&name, pid, killer.as_mut()),
        }
    }
    Ok(())
}

fn resize(master: &Mutex<Box<dyn MasterPty + Send>>, columns: u16, rows: u16) {
    let dimensions = Dimensions::new(columns, rows);
    let master = match master.lock() {
        Ok(master) => master,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Err(e) = master.resize(dimensions.to_pty_size()) {
        warn!("Failed to resize PTY to {}: {}", dimensions, e);
    }
}

fn deliver_signal(name: &str, pid: Option<u32>, killer: &mut (dyn ChildKiller + Send + Sync)) {
    let Some(signal) = Signal::from_name(name) else {
        warn!("Ignoring unknown signal '{}'", name);
        return;
    };

    let delivered = match pid {
        Some(pid) if cfg!(unix) => match send_signal_to_pid(pid, signal) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        },
        _ => false,
    };

    if !delivered && signal.is_terminating() {
        debug!("Falling back to killing the child for {}", signal);
        if let Err(e) = killer.kill() {
            warn!("Failed to kill child: {}", e);
        }
    }
}
