//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::heartbeat::HeartbeatConfig;
use crate::protocol::Limits;

/// Root configuration for agh
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Command protocol limits
    #[serde(default)]
    pub protocol: Limits,
    /// Message bus tuning
    #[serde(default)]
    pub bus: BusConfig,
    /// Periodic heartbeat event
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Channel configuration
    #[serde(default)]
    pub channels: ChannelsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Days to keep rotated log files
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_retention_days() -> u64 {
    7
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            retention_days: default_retention_days(),
            overrides: HashMap::new(),
        }
    }
}

/// Shutdown drain of endpoint queues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Consecutive idle polls that end a drain
    #[serde(default = "default_drain_idle_iterations")]
    pub drain_idle_iterations: u32,
    /// Milliseconds between idle polls
    #[serde(default = "default_drain_idle_tick_ms")]
    pub drain_idle_tick_ms: u64,
}

fn default_drain_idle_iterations() -> u32 {
    10
}

fn default_drain_idle_tick_ms() -> u64 {
    10
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            drain_idle_iterations: default_drain_idle_iterations(),
            drain_idle_tick_ms: default_drain_idle_tick_ms(),
        }
    }
}

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub console: ConsoleConfig,
}

/// Console (stdin/stdout) channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub allow_from: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_from: Vec::new(),
        }
    }
}
