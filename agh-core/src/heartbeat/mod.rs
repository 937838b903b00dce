//! Heartbeat worker emitting a periodic event

pub mod types;
pub mod worker;

pub use types::{HeartbeatConfig, DEFAULT_HEARTBEAT_INTERVAL_S, HEARTBEAT_EVENT_NAME};
pub use worker::HeartbeatWorker;
