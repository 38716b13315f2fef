//! PTY Process Spawning
//!
//! Opens a pseudoterminal and spawns a program inside it using the
//! portable-pty crate. Used by the PTY host, never by the session owner.

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtyPair};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::mpsc::channel;
use std::thread;
use tokio::sync::mpsc::unbounded_channel;

use super::streams::PtyStreams;
use crate::error::{Error, Result};
use crate::models::Dimensions;

/// A program running inside a freshly opened pseudoterminal
pub struct SpawnedPty {
    /// Master side, kept alive for resizing and for the reader to work
    pub master: Box<dyn MasterPty + Send>,
    /// The child process
    pub child: Box<dyn Child + Send + Sync>,
    /// Output/input channels bridged to background threads
    pub streams: PtyStreams,
    /// OS process id, when the platform reports one
    pub pid: Option<u32>,
}

impl SpawnedPty {
    /// Killer handle usable independently of the child
    pub fn killer(&self) -> Box<dyn ChildKiller + Send + Sync> {
        self.child.clone_killer()
    }
}

/// Spawn `program` with `args` in a new PTY of the given size
pub fn spawn_pty_process(
    program: &str,
    args: &[String],
    dimensions: Dimensions,
    working_directory: &Path,
) -> Result<SpawnedPty> {
    // Get the native PTY system
    let pty_system = native_pty_system();

    let pair = pty_system
        .openpty(dimensions.to_pty_size())
        .map_err(|e| Error::PtyCreationFailed {
            command: program.to_string(),
            reason: e.to_string(),
        })?;

    // The environment is inherited from the host, which got it from the session owner
    let mut cmd_builder = CommandBuilder::new(program);
    cmd_builder.args(args);
    cmd_builder.cwd(working_directory);

    let child = pair
        .slave
        .spawn_command(cmd_builder)
        .map_err(|e| Error::CommandSpawnFailed {
            command: program.to_string(),
            reason: e.to_string(),
        })?;

    let pid = child.process_id();
    debug!("Spawned '{}' in PTY (pid {:?}, {})", program, pid, dimensions);

    let PtyPair { master, slave } = pair;
    // Keep no slave handle in this process, or the reader never sees EOF
    drop(slave);

    let streams = create_pty_streams(master.as_ref())?;

    Ok(SpawnedPty {
        master,
        child,
        streams,
        pid,
    })
}

#[cfg(unix)]
fn is_hangup(e: &std::io::Error) -> bool {
    // Linux reports EIO on the master once every slave handle is closed
    e.raw_os_error() == Some(nix::errno::Errno::EIO as i32)
}

#[cfg(not(unix))]
fn is_hangup(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::BrokenPipe
}

/// Create PTY streams from the master side
fn create_pty_streams(master: &(dyn MasterPty + Send)) -> Result<PtyStreams> {
    // Bridge blocking PTY I/O to async via channels and background threads
    let mut master_reader = master.try_clone_reader().map_err(|e| Error::Other(format!(
        "Failed to clone PTY reader: {}",
        e
    )))?;
    let mut master_writer = master.take_writer().map_err(|e| Error::Other(format!(
        "Failed to take PTY writer: {}",
        e
    )))?;

    // Channel: PTY output -> async consumer
    let (tx_async_out, rx_async_out) = unbounded_channel::<Vec<u8>>();
    // Channel: async producer (input frames) -> PTY writer thread
    let (tx_stdin, rx_stdin) = channel::<Vec<u8>>();

    // Reader thread: read from PTY master and forward to async channel
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        let mut consecutive_errors = 0;
        const MAX_CONSECUTIVE_ERRORS: u32 = 5;

        loop {
            match master_reader.read(&mut buf) {
                Ok(0) => {
                    debug!("PTY read EOF - process terminated");
                    break;
                }
                Ok(n) => {
                    consecutive_errors = 0;
                    if tx_async_out.send(buf[..n].to_vec()).is_err() {
                        debug!("PTY read: receiver dropped, stopping reader thread");
                        break;
                    }
                }
                Err(e) if is_hangup(&e) => {
                    debug!("PTY hung up - all slave handles closed");
                    break;
                }
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::Interrupted {
                        continue;
                    }

                    if e.kind() == std::io::ErrorKind::WouldBlock {
                        std::thread::sleep(std::time::Duration::from_millis(10));
                        continue;
                    }

                    consecutive_errors += 1;
                    warn!(
                        "PTY read error ({}): {} (attempt {}/{})",
                        e.kind(),
                        e,
                        consecutive_errors,
                        MAX_CONSECUTIVE_ERRORS
                    );

                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!("PTY read: too many consecutive errors, stopping reader thread");
                        break;
                    }

                    std::thread::sleep(std::time::Duration::from_millis(50));
                }
            }
        }
        debug!("PTY reader thread exiting");
    });

    // Writer thread: receive input and write to PTY master
    thread::spawn(move || {
        let mut consecutive_errors = 0;
        const MAX_CONSECUTIVE_ERRORS: u32 = 3;

        while let Ok(data) = rx_stdin.recv() {
            let mut attempts = 0;
            const MAX_ATTEMPTS: u32 = 3;

            loop {
                match master_writer.write_all(&data) {
                    Ok(()) => {
                        consecutive_errors = 0;
                        if let Err(e) = master_writer.flush() {
                            debug!("PTY flush error: {}", e);
                        }
                        break;
                    }
                    Err(e) => {
                        attempts += 1;

                        if e.kind() == std::io::ErrorKind::Interrupted {
                            continue;
                        }

                        if e.kind() == std::io::ErrorKind::WouldBlock && attempts < MAX_ATTEMPTS {
                            std::thread::sleep(std::time::Duration::from_millis(10));
                            continue;
                        }

                        consecutive_errors += 1;
                        warn!(
                            "PTY write error ({}): {} (consecutive errors: {}/{})",
                            e.kind(),
                            e,
                            consecutive_errors,
                            MAX_CONSECUTIVE_ERRORS
                        );

                        if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                            error!("PTY write: too many consecutive errors, stopping writer thread");
                            return;
                        }

                        break;
                    }
                }
            }
        }
        debug!("PTY writer thread exiting");
    });

    Ok(PtyStreams::from_channels(rx_async_out, tx_stdin))
}
