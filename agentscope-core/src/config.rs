//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/agentscope/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/agentscope/` (~/.config/agentscope/)
//! - State/Logs: `$XDG_STATE_HOME/agentscope/` (~/.local/state/agentscope/)

use crate::error::{Error, Result};
use crate::types::SimulationConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

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
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Initial chaos parameters for the simulation
    #[serde(default)]
    pub chaos: SimulationConfig,

    /// Simulation driver settings
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Local model settings
    #[serde(default)]
    pub local_agent: LocalAgentConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Simulation driver settings
#[derive(Debug, Deserialize, Clone)]
pub struct SimulationSettings {
    /// Period between scenario steps in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl SimulationSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn default_tick_interval_ms() -> u64 {
    2000
}

/// Local inference server configuration
///
/// The local agent talks to an Ollama server; `model` is pulled on load.
#[derive(Debug, Deserialize, Clone)]
pub struct LocalAgentConfig {
    /// Server endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model tag to pull and generate with
    #[serde(default = "default_model")]
    pub model: String,

    /// Generation cap passed as `num_predict`
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay before the flexible loop submits its next prompt
    #[serde(default = "default_flexible_delay_ms")]
    pub flexible_delay_ms: u64,
}

impl Default for LocalAgentConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            max_new_tokens: default_max_new_tokens(),
            timeout_secs: default_timeout_secs(),
            flexible_delay_ms: default_flexible_delay_ms(),
        }
    }
}

impl LocalAgentConfig {
    /// Label attached to spans produced by the local model.
    pub fn model_label(&self) -> String {
        format!("{} (Worker)", self.model)
    }

    pub fn flexible_delay(&self) -> Duration {
        Duration::from_millis(self.flexible_delay_ms)
    }
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5:0.5b".to_string()
}

fn default_max_new_tokens() -> u32 {
    50
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_flexible_delay_ms() -> u64 {
    300
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
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
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        self.chaos.validate()?;
        if self.simulation.tick_interval_ms == 0 {
            return Err(Error::Config(
                "simulation.tick_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.local_agent.model.trim().is_empty() {
            return Err(Error::Config(
                "local_agent.model must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/agentscope/config.toml` (~/.config/agentscope/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("agentscope").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/agentscope/` (~/.local/state/agentscope/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("agentscope")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/agentscope/agentscope.log` (~/.local/state/agentscope/agentscope.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("agentscope.log")
    }
}
