//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/outlay/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/outlay/` (~/.config/outlay/)
//! - State/Logs: `$XDG_STATE_HOME/outlay/` (~/.local/state/outlay/)

use crate::error::{Error, Result};
use crate::types::AccountId;
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Who the current user is; every optimistic entity is attributed to
    /// this session
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Outbound command queue configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// The current user's identity.
///
/// Orchestrators read this through the scenario context; it is the actor
/// on every optimistic action and the self side of every split.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Current user's account id
    #[serde(default)]
    pub account_id: AccountId,

    /// Current user's login (email)
    #[serde(default)]
    pub login: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            account_id: 0,
            login: String::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Outbound command queue configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    /// Maximum commands held while the transport is offline
    #[serde(default = "default_max_queued_commands")]
    pub max_queued_commands: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_queued_commands: default_max_queued_commands(),
        }
    }
}

fn default_max_queued_commands() -> usize {
    256
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/outlay/config.toml` (~/.config/outlay/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("outlay").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/outlay/` (~/.local/state/outlay/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("outlay")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/outlay/outlay.log` (~/.local/state/outlay/outlay.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("outlay.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.account_id, 0);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.dispatch.max_queued_commands, 256);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[session]
account_id = 42
login = "pat@example.com"

[logging]
level = "debug"

[dispatch]
max_queued_commands = 16
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.session.account_id, 42);
        assert_eq!(config.session.login, "pat@example.com");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.dispatch.max_queued_commands, 16);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[session]\naccount_id = 7\nlogin = \"a@b.c\"").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.session.account_id, 7);
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        let path = PathBuf::from("/nonexistent/outlay/config.toml");
        assert!(Config::load_from(&path).is_err());
    }
}
