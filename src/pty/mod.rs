//! Pseudoterminal (PTY) sessions
//!
//! Commands run inside a pseudoterminal owned by a separate
//! `blackscreen-pty-host` process. The two sides talk over the host's
//! stdin/stdout using the frames in [`protocol`]:
//!
//! - [`session`] is the parent side ([`ProcessSession`])
//! - [`host`] is the child side, run by the host binary
//! - [`process`], [`streams`] and [`signals`] are the PTY plumbing the host uses

pub mod host;
pub mod process;
pub mod protocol;
pub mod session;
pub mod signals;
pub mod streams;

use std::path::Path;
use std::sync::Arc;

use crate::context::BufferSink;
use crate::error::{Error, Result};
use crate::models::{Dimensions, PtyProcess};

// Re-exports for convenience
pub use host::{run_host, HostArgs};
pub use protocol::{ChildMessage, ParentMessage, ProtocolError};
pub use session::{ProcessSession, SessionHost};
pub use signals::Signal;

/// Terminal size used by [`execute_command`]
pub const CAPTURE_DIMENSIONS: Dimensions = Dimensions::new(80, 20);

/// Run `program` in a PTY and collect everything it prints.
///
/// Succeeds with the output only when the exit code is 0.
pub async fn execute_command(program: &str, args: &[String], directory: &Path) -> Result<String> {
    execute_command_with(&SessionHost::default(), program, args, directory).await
}

/// [`execute_command`] through a specific host executable
pub async fn execute_command_with(
    host: &SessionHost,
    program: &str,
    args: &[String],
    directory: &Path,
) -> Result<String> {
    let sink = BufferSink::new();
    let process = PtyProcess::new(
        program,
        args.to_vec(),
        directory.to_path_buf(),
        std::env::vars().collect(),
        CAPTURE_DIMENSIONS,
    );

    let session = ProcessSession::spawn(host, process, Arc::new(sink.clone())).await?;
    match session.wait().await? {
        0 => Ok(sink.text()),
        code => Err(Error::NonZeroExit {
            command: program.to_string(),
            code,
        }),
    }
}
