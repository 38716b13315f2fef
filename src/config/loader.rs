//! Configuration File Loading
//!
//! Finds and parses the configuration file, falling back to defaults.
//!
//! Search order:
//! 1. `$BLACKSCREEN_CONFIG` (an exact file)
//! 2. `<config dir>/blackscreen/config.{toml,json}`
//! 3. `~/.blackscreen/config.{toml,json}`

use super::Config;
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "BLACKSCREEN_CONFIG";

/// Configuration file loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Directories searched for `config.<ext>`
    search_paths: Vec<PathBuf>,
    /// Explicit file, takes precedence over the search paths
    explicit_path: Option<PathBuf>,
    /// File the last successful load came from
    current_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    const ALL: [ConfigFormat; 2] = [ConfigFormat::Toml, ConfigFormat::Json];

    fn extension(self) -> &'static str {
        match self {
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }

    /// Guess the format from a file extension (TOML unless `.json`)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigFormat::Toml => write!(f, "TOML"),
            ConfigFormat::Json => write!(f, "JSON"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Return defaults when no file exists
    pub create_default: bool,
    /// Validate the configuration after loading
    pub validate: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            create_default: true,
            validate: true,
        }
    }
}

impl ConfigLoader {
    /// Loader over the standard search locations
    pub fn new() -> Self {
        Self {
            search_paths: Self::default_search_paths(),
            explicit_path: env::var_os(CONFIG_ENV)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            current_path: None,
        }
    }

    /// Loader that only reads `path`
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            search_paths: Vec::new(),
            explicit_path: Some(path.into()),
            current_path: None,
        }
    }

    /// Load configuration with default options
    pub fn load() -> Result<Config> {
        Self::new().load_with_options(LoadOptions::default())
    }

    /// Load configuration with custom options
    pub fn load_with_options(&mut self, options: LoadOptions) -> Result<Config> {
        let config = match self.find_and_load_config()? {
            Some((path, config)) => {
                info!("Loaded configuration from {}", path.display());
                self.current_path = Some(path);
                config
            }
            None if options.create_default => {
                debug!("No configuration file found, using defaults");
                Config::default()
            }
            None => return Err(Error::ConfigNotFound),
        };

        if options.validate {
            validate_config(&config)?;
        }
        Ok(config)
    }

    /// Find and load configuration from search paths
    fn find_and_load_config(&self) -> Result<Option<(PathBuf, Config)>> {
        // An explicit file must load; a broken one is an error, not a fallback
        if let Some(path) = &self.explicit_path {
            if !path.exists() {
                return Err(Error::ConfigLoadFailed {
                    path: path.clone(),
                    reason: "file does not exist".to_string(),
                });
            }
            let config = load_config_file(path, ConfigFormat::from_path(path))?;
            return Ok(Some((path.clone(), config)));
        }

        for dir in &self.search_paths {
            for format in ConfigFormat::ALL {
                let path = dir.join("config").with_extension(format.extension());
                if !path.exists() {
                    continue;
                }
                match load_config_file(&path, format) {
                    Ok(config) => return Ok(Some((path, config))),
                    Err(e) => {
                        // Keep searching
                        warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        Ok(None)
    }

    fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("blackscreen"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".blackscreen"));
        }

        paths
    }

    /// File the configuration was loaded from, if any
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Search only `dir`
    pub fn set_search_path(&mut self, dir: PathBuf) {
        self.explicit_path = None;
        self.search_paths = vec![dir];
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one configuration file
pub fn load_config_file(path: &Path, format: ConfigFormat) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| Error::ConfigLoadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let parsed = match format {
        ConfigFormat::Toml => toml::from_str(&content).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::from_str(&content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|reason| Error::ConfigParseFailed {
        format: format.to_string(),
        reason,
    })
}

/// Check values serde cannot
pub fn validate_config(config: &Config) -> Result<()> {
    if config.session.columns == 0 {
        return Err(Error::ConfigValidationFailed {
            field: "session.columns".to_string(),
            reason: "Columns must be greater than 0".to_string(),
        });
    }

    if config.session.rows == 0 {
        return Err(Error::ConfigValidationFailed {
            field: "session.rows".to_string(),
            reason: "Rows must be greater than 0".to_string(),
        });
    }

    if let Some(host) = &config.session.host_program {
        if host.as_os_str().is_empty() {
            return Err(Error::ConfigValidationFailed {
                field: "session.host_program".to_string(),
                reason: "Host program path cannot be empty".to_string(),
            });
        }
    }

    if config.windows_shell.flags.is_empty() {
        return Err(Error::ConfigValidationFailed {
            field: "windows_shell.flags".to_string(),
            reason: "At least one shell flag is required".to_string(),
        });
    }

    if config.execution.kill_signal.trim().is_empty() {
        return Err(Error::ConfigValidationFailed {
            field: "execution.kill_signal".to_string(),
            reason: "Kill signal cannot be empty".to_string(),
        });
    }

    if crate::pty::Signal::from_name(&config.execution.kill_signal).is_none() {
        return Err(Error::ConfigValidationFailed {
            field: "execution.kill_signal".to_string(),
            reason: format!("Unknown signal '{}'", config.execution.kill_signal),
        });
    }

    Ok(())
}
