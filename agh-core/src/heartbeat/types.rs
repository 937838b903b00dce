//! Heartbeat configuration types

use serde::{Deserialize, Serialize};

/// Default heartbeat interval: 30 minutes (in seconds)
pub const DEFAULT_HEARTBEAT_INTERVAL_S: u64 = 30 * 60;

/// Event name carried by every heartbeat
pub const HEARTBEAT_EVENT_NAME: &str = "heartbeat";

/// Heartbeat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Whether heartbeat is enabled
    #[serde(default)]
    pub enabled: bool,
    /// Interval in seconds between heartbeats
    #[serde(default = "default_interval")]
    pub interval_s: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_s: DEFAULT_HEARTBEAT_INTERVAL_S,
        }
    }
}

fn default_interval() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_S
}
