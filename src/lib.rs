//! Black Screen - command dispatch and pseudoterminal sessions
//!
//! Given a parsed command line, Black Screen decides how the command runs
//! and, when a real process is needed, owns the conversation with that
//! process for its whole life: streaming output, writing input, resizing
//! its terminal, signalling it and reporting its exit.
//!
//! ## Module Organization
//!
//! - [`execution`] - Strategy resolution and the [`CommandExecutor`]
//! - [`context`] - [`ExecutionContext`], output sinks and the session slot
//! - [`pty`] - Process sessions, the PTY host and the wire protocol
//! - [`builtins`] - In-process commands (`cd`)
//! - [`executables`] - Cached view of executables on `PATH`
//! - [`config`] - Configuration loading and validation
//! - [`models`] - Plain data (dimensions, process descriptions, exit states)
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use blackscreen::{BufferSink, CommandExecutor, CommandLine, ExecutionContext};
//!
//! # async fn run() -> blackscreen::Result<()> {
//! let config = blackscreen::init()?;
//! let executor = CommandExecutor::from_config(&config);
//!
//! let sink = BufferSink::new();
//! let mut context = ExecutionContext::new(
//!     CommandLine::parse("ls -la"),
//!     std::env::current_dir()?,
//!     Arc::new(sink.clone()),
//! );
//! executor.execute(&mut context).await?;
//! print!("{}", sink.text());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Each process runs under a `blackscreen-pty-host` child that owns the
//! pseudoterminal. The parent talks to it with length-prefixed frames over
//! the host's stdin and stdout; the host's stderr carries its logs.
//! Inside the host, blocking PTY reads and writes run on dedicated threads
//! bridged to tokio with channels.

#[macro_use]
extern crate tracing;

pub mod builtins;
pub mod config;
pub mod context;
pub mod error;
pub mod executables;
pub mod execution;
pub mod models;
pub mod pty;

// Re-exports for core functionality
pub use builtins::{BuiltinRegistry, BuiltinTable};
pub use config::{Config, ConfigLoader};
pub use context::{BufferSink, CommandLine, ExecutionContext, OutputSink, SessionSlot};
pub use error::{Error, Result};
pub use executables::{ExecutableLookup, PathExecutables};
pub use execution::{CommandExecutor, HostOs, StrategyKind};
pub use models::{Dimensions, ExitState, PtyProcess};
pub use pty::{execute_command, ProcessSession, SessionHost};

// Version information
/// The current version of Black Screen from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The package name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Load configuration from the default locations.
///
/// A file that is missing, unreadable or invalid is reported and replaced
/// by the defaults.
pub fn init() -> Result<Config> {
    info!("Initializing {} v{}", NAME, VERSION);

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load configuration: {}. Using defaults", e);
            Config::default()
        }
    };

    config::loader::validate_config(&config)?;
    Ok(config)
}

/// Load configuration from `config_path`, which must exist and be valid
pub fn init_with_config(config_path: &std::path::Path) -> Result<Config> {
    info!(
        "Initializing {} v{} with config: {}",
        NAME,
        VERSION,
        config_path.display()
    );

    let config = ConfigLoader::from_path(config_path)
        .load_with_options(config::LoadOptions::default())
        .map_err(|e| {
            error!("Failed to load configuration from {}: {}", config_path.display(), e);
            e
        })?;

    debug!("Configuration: {:?}", config);
    Ok(config)
}

/// User-facing explanation of an error that stops the CLI before it runs anything
pub fn handle_startup_error(error: &Error) -> String {
    match error {
        Error::ConfigLoadFailed { path, reason } => format!(
            "Configuration Error: Failed to load config from '{}': {}\n\nTry:\n• Check the file path\n• Unset BLACKSCREEN_CONFIG to use the defaults",
            path.display(),
            reason
        ),
        Error::ConfigParseFailed { format, reason } => format!(
            "Configuration Error: Failed to parse {} config: {}\n\nTry:\n• Check configuration file syntax",
            format, reason
        ),
        Error::ConfigValidationFailed { field, reason } => format!(
            "Configuration Error: Validation failed for '{}': {}",
            field, reason
        ),
        Error::CommandSpawnFailed { .. } => format!(
            "{}\n\nTry:\n• Install blackscreen-pty-host next to blackscreen\n• Or set BLACKSCREEN_PTY_HOST to its path",
            error
        ),
        _ => error.to_string(),
    }
}
