//! Configuration loading
//!
//! Configuration is read from `~/.claude/hud/config.toml`. Every field has a
//! default, so a missing file (or a partial one) is fine. Paths default to
//! the locations Claude Code and the hud hook use:
//! - event FIFO: `~/.claude/hud/events.fifo`
//! - settings: `~/.claude/settings.json`
//! - logs: `~/.claude/hud/logs/`

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `~/.claude`
pub fn claude_dir() -> PathBuf {
    home_dir().join(".claude")
}

/// `~/.claude/hud`
pub fn hud_dir() -> PathBuf {
    claude_dir().join("hud")
}

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HudConfig {
    /// Path of the event FIFO written by the hook
    #[serde(default = "default_event_channel")]
    pub event_channel: PathBuf,

    /// Path of the Claude Code settings file
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,

    /// Render cadence in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Settings cache TTL in milliseconds
    #[serde(default = "default_settings_ttl_ms")]
    pub settings_ttl_ms: u64,

    /// Event channel reconnect policy
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Usage process settings
    #[serde(default)]
    pub usage: UsageConfig,

    /// Context window size per model id (exact id or prefix)
    #[serde(default)]
    pub model_capacities: HashMap<String, u64>,

    /// Context window size for unrecognized models
    #[serde(default = "default_capacity")]
    pub default_capacity: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_event_channel() -> PathBuf {
    hud_dir().join("events.fifo")
}

fn default_settings_path() -> PathBuf {
    claude_dir().join("settings.json")
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_settings_ttl_ms() -> u64 {
    30_000
}

fn default_capacity() -> u64 {
    200_000
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            event_channel: default_event_channel(),
            settings_path: default_settings_path(),
            tick_ms: default_tick_ms(),
            settings_ttl_ms: default_settings_ttl_ms(),
            reconnect: ReconnectConfig::default(),
            usage: UsageConfig::default(),
            model_capacities: HashMap::new(),
            default_capacity: default_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

impl HudConfig {
    /// Default config file path (`~/.claude/hud/config.toml`)
    pub fn config_path() -> PathBuf {
        hud_dir().join("config.toml")
    }

    /// Default log directory (`~/.claude/hud/logs`)
    pub fn log_dir() -> PathBuf {
        hud_dir().join("logs")
    }

    /// Load configuration from the given path, or the default location.
    ///
    /// A missing file yields defaults; an unreadable or invalid file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let default_path = Self::config_path();
        let path = path.unwrap_or(&default_path);

        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        Self::load_from(path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn settings_ttl(&self) -> Duration {
        Duration::from_millis(self.settings_ttl_ms)
    }
}

/// Reconnect policy for the event channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// First reconnect delay in milliseconds
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,

    /// Multiplier applied per consecutive attempt
    #[serde(default = "default_growth")]
    pub growth: f64,

    /// Upper bound for a single delay in milliseconds
    #[serde(default = "default_cap_ms")]
    pub cap_ms: u64,

    /// Consecutive failed attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// How often to check whether a missing channel has appeared
    #[serde(default = "default_existence_poll_ms")]
    pub existence_poll_ms: u64,
}

fn default_base_ms() -> u64 {
    100
}

fn default_growth() -> f64 {
    1.5
}

fn default_cap_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    50
}

fn default_existence_poll_ms() -> u64 {
    500
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_ms: default_base_ms(),
            growth: default_growth(),
            cap_ms: default_cap_ms(),
            max_attempts: default_max_attempts(),
            existence_poll_ms: default_existence_poll_ms(),
        }
    }
}

/// Usage process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageConfig {
    /// Disable to never spawn the usage process
    #[serde(default = "default_usage_enabled")]
    pub enabled: bool,

    /// Program to run
    #[serde(default = "default_usage_command")]
    pub command: String,

    /// Arguments passed to the program
    #[serde(default = "default_usage_args")]
    pub args: Vec<String>,

    /// Minimum time between two fetches in milliseconds
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Hard limit for one fetch in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_usage_enabled() -> bool {
    true
}

fn default_usage_command() -> String {
    "claude".to_string()
}

fn default_usage_args() -> Vec<String> {
    vec!["/usage".to_string()]
}

fn default_min_interval_ms() -> u64 {
    60_000
}

fn default_timeout_ms() -> u64 {
    2000
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            enabled: default_usage_enabled(),
            command: default_usage_command(),
            args: default_usage_args(),
            min_interval_ms: default_min_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of rotated log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_max_log_files() -> usize {
    3
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}
