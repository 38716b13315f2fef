//! Error types and Result aliases for Black Screen

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::pty::protocol::ProtocolError;

/// Result type alias for Black Screen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Black Screen
#[derive(Debug)]
pub enum Error {
    // === Dispatch errors ===
    /// No strategy other than the fallback accepted the command
    CommandNotFound {
        command: String,
    },

    /// A builtin handler returned an error
    BuiltinFailed {
        command: String,
        message: String,
    },

    /// A directly spawned executable exited with a non-zero code
    NonZeroExit {
        command: String,
        code: i32,
    },

    /// Command was cancelled by a caller-side timeout
    CommandTimeout {
        command: String,
        duration: Duration,
    },

    // === Session errors ===
    /// Failed to spawn the PTY host for a command
    CommandSpawnFailed {
        command: String,
        reason: String,
    },

    /// The PTY host sent something that is not a valid frame
    MalformedChildMessage {
        reason: String,
    },

    /// The session owner sent the PTY host something that is not a valid control frame
    MalformedParentMessage {
        reason: String,
    },

    /// The PTY host went away without reporting an exit
    HostTerminated {
        reason: String,
    },

    /// Failed to create the pseudoterminal inside the host
    PtyCreationFailed {
        command: String,
        reason: String,
    },

    // === Configuration errors ===
    /// Failed to load configuration file
    ConfigLoadFailed {
        path: PathBuf,
        reason: String,
    },

    /// Configuration file not found
    ConfigNotFound,

    /// Configuration validation failed
    ConfigValidationFailed {
        field: String,
        reason: String,
    },

    /// Failed to parse configuration
    ConfigParseFailed {
        format: String,
        reason: String,
    },

    // === I/O and serialization errors ===
    /// I/O errors
    Io(std::io::Error),

    /// Serialization errors
    Serde(serde_json::Error),

    /// TOML parsing errors
    Toml(toml::de::Error),

    // === Generic fallback (use sparingly) ===
    Other(String),
}

impl Error {
    /// Exit code carried by a failed direct spawn, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::NonZeroExit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl Error {
    /// Convert a failure read on the host's control channel.
    ///
    /// The [`From`] conversion describes the parent's view of the host; this is
    /// the opposite direction.
    pub fn from_control_channel(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(io) => Error::Io(io),
            other => Error::MalformedParentMessage {
                reason: other.to_string(),
            },
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Dispatch errors
            Error::CommandNotFound { command } => {
                write!(f, "Black Screen: command \"{}\" not found.", command)
            }
            Error::BuiltinFailed { message, .. } => write!(f, "{}", message),
            Error::NonZeroExit { command, code } => {
                write!(f, "Command '{}' exited with code {}", command, code)
            }
            Error::CommandTimeout { command, duration } => {
                write!(f, "Command '{}' timed out after {:?}", command, duration)
            }

            // Session errors
            Error::CommandSpawnFailed { command, reason } => {
                write!(f, "Failed to spawn command '{}': {}", command, reason)
            }
            Error::MalformedChildMessage { reason } => {
                write!(f, "Unhandled message from PTY host: {}", reason)
            }
            Error::MalformedParentMessage { reason } => {
                write!(f, "Invalid control message from session owner: {}", reason)
            }
            Error::HostTerminated { reason } => {
                write!(f, "PTY host terminated without exit status: {}", reason)
            }
            Error::PtyCreationFailed { command, reason } => {
                write!(f, "Failed to create PTY for command '{}': {}", command, reason)
            }

            // Configuration errors
            Error::ConfigLoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path.display(), reason)
            }
            Error::ConfigNotFound => write!(f, "Configuration file not found"),
            Error::ConfigValidationFailed { field, reason } => {
                write!(f, "Configuration validation failed for '{}': {}", field, reason)
            }
            Error::ConfigParseFailed { format, reason } => {
                write!(f, "Failed to parse {} config: {}", format, reason)
            }

            // I/O and serialization errors
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Serde(err) => write!(f, "Serialization error: {}", err),
            Error::Toml(err) => write!(f, "TOML parsing error: {}", err),

            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Toml(err)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(io) => Error::HostTerminated {
                reason: io.to_string(),
            },
            other => Error::MalformedChildMessage {
                reason: other.to_string(),
            },
        }
    }
}
