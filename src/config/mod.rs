//! Configuration management for Black Screen
//!
//! Settings for new sessions, the executable cache, the Windows shell
//! strategy and caller-side execution limits. Files are TOML or JSON; every
//! field has a default so partial files are fine.

pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::Dimensions;

pub use loader::{ConfigFormat, ConfigLoader, LoadOptions};

/// Main configuration structure for Black Screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Process session configuration
    pub session: SessionConfig,

    /// PATH executable cache configuration
    pub path_cache: PathCacheConfig,

    /// Windows shell strategy configuration
    pub windows_shell: WindowsShellConfig,

    /// Execution limits
    pub execution: ExecutionConfig,
}

/// Settings applied to every new process session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Initial terminal width in columns
    pub columns: u16,

    /// Initial terminal height in rows
    pub rows: u16,

    /// Start from the parent's environment
    pub inherit_env: bool,

    /// Variables set on top of the (possibly inherited) environment
    pub environment: HashMap<String, String>,

    /// Explicit path to `blackscreen-pty-host`
    pub host_program: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut environment = HashMap::new();
        environment.insert("TERM".to_string(), "xterm-256color".to_string());
        Self {
            columns: 80,
            rows: 24,
            inherit_env: true,
            environment,
            host_program: None,
        }
    }
}

impl SessionConfig {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.columns, self.rows)
    }

    /// Environment for a new execution context
    pub fn build_environment(&self) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = if self.inherit_env {
            std::env::vars().collect()
        } else {
            HashMap::new()
        };
        env.extend(
            self.environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        env
    }
}

/// PATH executable cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathCacheConfig {
    /// Seconds before the cached PATH scan is considered stale
    pub refresh_interval_secs: u64,
}

impl Default for PathCacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 300,
        }
    }
}

impl PathCacheConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// How commands are handed to the Windows command interpreter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsShellConfig {
    /// Shell binary; when unset `ComSpec` and `SystemRoot` decide
    pub program: Option<String>,

    /// Flags placed before the joined command line
    pub flags: Vec<String>,
}

impl Default for WindowsShellConfig {
    fn default() -> Self {
        Self {
            program: None,
            flags: vec!["/s".to_string(), "/c".to_string()],
        }
    }
}

/// Caller-side execution limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Timeout applied by the CLI; 0 disables it
    pub default_timeout_secs: u64,

    /// Signal sent to a session when its timeout expires
    pub kill_signal: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 0,
            kill_signal: "SIGKILL".to_string(),
        }
    }
}

impl ExecutionConfig {
    pub fn default_timeout(&self) -> Option<Duration> {
        (self.default_timeout_secs > 0).then(|| Duration::from_secs(self.default_timeout_secs))
    }
}
