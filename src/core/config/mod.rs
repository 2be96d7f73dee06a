//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. Environment overrides (`FLOW_HEALTH_GH`)
//! 4. CLI flags (not handled here)
//!
//! # Config Locations
//!
//! Searched in order:
//! 1. `$FLOW_HEALTH_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/flow-health/config.toml`
//! 3. `~/.flow-health/config.toml`
//!
//! A missing file is not an error; defaults are used.
//!
//! # Example
//!
//! ```no_run
//! use codeflow_health::core::config::Config;
//!
//! let result = Config::load().unwrap();
//! for warning in &result.warnings {
//!     eprintln!("warning: {}", warning.message);
//! }
//! println!("VMR: {}", result.config.settings.vmr_repository);
//! ```

pub mod schema;

pub use schema::{FlowHealthConfig, SearchLimits, Timeouts};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "FLOW_HEALTH_CONFIG";

/// Environment variable overriding the forge CLI executable.
pub const GH_ENV: &str = "FLOW_HEALTH_GH";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Loaded configuration plus where it came from.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: FlowHealthConfig,
    /// Path to the config file (if one was loaded)
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment and default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed,
    /// or validated.
    pub fn load() -> Result<ConfigLoadResult, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok(), dirs::home_dir())
    }

    /// Load configuration with an explicit environment lookup and home dir.
    ///
    /// `load()` delegates here; tests call it directly to avoid touching the
    /// real process environment.
    pub fn load_with(
        env: impl Fn(&str) -> Option<String>,
        home: Option<PathBuf>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let path = Self::locate(&env, home, &mut warnings);
        let mut settings = match &path {
            Some(p) => Self::read_config(p)?,
            None => FlowHealthConfig::default(),
        };

        if let Some(gh) = env(GH_ENV).filter(|v| !v.trim().is_empty()) {
            settings.gh_path = gh;
        }

        settings.validate()?;

        Ok(ConfigLoadResult {
            config: Config { settings, path },
            warnings,
        })
    }

    /// Find the first existing config file.
    fn locate(
        env: &impl Fn(&str) -> Option<String>,
        home: Option<PathBuf>,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Option<PathBuf> {
        // 1. Check $FLOW_HEALTH_CONFIG
        if let Some(explicit) = env(CONFIG_ENV) {
            let path = PathBuf::from(explicit);
            if path.exists() {
                return Some(path);
            }
            warnings.push(ConfigWarning {
                message: format!("{} points to a missing file, ignoring it", CONFIG_ENV),
                path,
            });
        }

        // 2. Check $XDG_CONFIG_HOME/flow-health/config.toml
        if let Some(xdg_home) = env("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("flow-health/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.flow-health/config.toml
        if let Some(home) = home {
            let path = home.join(".flow-health/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<FlowHealthConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Path the config was loaded from, if any.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
