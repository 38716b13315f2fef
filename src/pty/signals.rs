//! PTY Signal Handling
//!
//! Signals travel over the session channel by name. The host resolves the
//! name with [`Signal::from_name`] and delivers it to the child.

use crate::error::{Error, Result};

/// Signal types that can be sent to PTY processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Interrupt signal (Ctrl+C)
    Interrupt,
    /// Termination signal (graceful shutdown)
    Terminate,
    /// Kill signal (forceful termination)
    Kill,
    /// Hangup signal
    Hangup,
    /// Quit signal (Ctrl+\)
    Quit,
    /// Continue signal
    Continue,
    /// Stop signal
    Stop,
}

impl Signal {
    /// Parse a signal name such as `SIGINT`, `sigterm` or `KILL`
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let short = upper.strip_prefix("SIG").unwrap_or(&upper);
        match short {
            "INT" => Some(Signal::Interrupt),
            "TERM" => Some(Signal::Terminate),
            "KILL" => Some(Signal::Kill),
            "HUP" => Some(Signal::Hangup),
            "QUIT" => Some(Signal::Quit),
            "CONT" => Some(Signal::Continue),
            "STOP" => Some(Signal::Stop),
            _ => None,
        }
    }

    /// Canonical name used on the wire
    pub fn name(self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Kill => "SIGKILL",
            Signal::Hangup => "SIGHUP",
            Signal::Quit => "SIGQUIT",
            Signal::Continue => "SIGCONT",
            Signal::Stop => "SIGSTOP",
        }
    }

    /// Whether delivering this signal is expected to end the process
    pub fn is_terminating(self) -> bool {
        matches!(
            self,
            Signal::Interrupt | Signal::Terminate | Signal::Kill | Signal::Hangup | Signal::Quit
        )
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Deliver a signal to a process by PID
#[cfg(unix)]
pub fn send_signal_to_pid(pid: u32, signal: Signal) -> Result<()> {
    use nix::sys::signal::{kill, Signal as NixSignal};
    use nix::unistd::Pid;

    let nix_signal = match signal {
        Signal::Interrupt => NixSignal::SIGINT,
        Signal::Terminate => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
        Signal::Hangup => NixSignal::SIGHUP,
        Signal::Quit => NixSignal::SIGQUIT,
        Signal::Continue => NixSignal::SIGCONT,
        Signal::Stop => NixSignal::SIGSTOP,
    };

    kill(Pid::from_raw(pid as i32), nix_signal).map_err(|e| Error::Other(format!(
        "Failed to send signal '{}' to {}: {}",
        signal, pid, e
    )))
}

/// Windows has no signals; only terminating ones are honoured, by the host
/// killing the child, so there is nothing to deliver by PID here.
#[cfg(not(unix))]
pub fn send_signal_to_pid(_pid: u32, signal: Signal) -> Result<()> {
    Err(Error::Other(format!(
        "Signal '{}' not supported on {}",
        signal,
        std::env::consts::OS
    )))
}
