//! PTY Streams
//!
//! Provides async-friendly interfaces for PTY I/O by bridging blocking
//! PTY master reads/writes to async code using channels.

use std::sync::mpsc::Sender as StdSender;
use tokio::sync::mpsc::UnboundedReceiver;

/// Sending half for PTY input, usable from any thread
#[derive(Debug, Clone)]
pub struct PtyInput {
    input_tx: StdSender<Vec<u8>>,
}

impl PtyInput {
    /// Queue bytes for the writer thread. Returns `false` once the writer
    /// thread is gone.
    pub fn send(&self, data: &[u8]) -> bool {
        self.input_tx.send(data.to_vec()).is_ok()
    }
}

/// PTY I/O streams wrapper
pub struct PtyStreams {
    /// Receiver for output bytes from the PTY (stdout/stderr)
    output_rx: UnboundedReceiver<Vec<u8>>,
    /// Sender for input bytes to the PTY (stdin)
    input: PtyInput,
}

impl PtyStreams {
    /// Create new PTY streams from channels
    pub fn from_channels(
        output_rx: UnboundedReceiver<Vec<u8>>,
        input_tx: StdSender<Vec<u8>>,
    ) -> Self {
        Self {
            output_rx,
            input: PtyInput { input_tx },
        }
    }

    /// Handle for writing to the PTY from elsewhere
    pub fn input(&self) -> PtyInput {
        self.input.clone()
    }

    /// Next chunk of output, or `None` once the reader thread has stopped
    pub async fn read(&mut self) -> Option<Vec<u8>> {
        self.output_rx.recv().await
    }

    /// Read with a timeout in milliseconds.
    ///
    /// `Ok(None)` means the reader thread stopped, `Err(())` means nothing
    /// arrived in time.
    pub async fn read_with_timeout(&mut self, timeout_ms: u64) -> Result<Option<Vec<u8>>, ()> {
        use tokio::time::{timeout, Duration};
        timeout(Duration::from_millis(timeout_ms), self.read())
            .await
            .map_err(|_| ())
    }
}
