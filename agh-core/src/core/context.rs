//! Process-wide state shared by the core and every worker

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bus::Endpoint;
use crate::config::Config;
use crate::protocol::{EventIds, Limits};

/// Name under which the core endpoint is published
pub const CORE_ENDPOINT: &str = "core";

/// Shared agent state
///
/// Everything here is safe to touch from any thread. Handler chains are
/// not part of it; they stay with the thread owning their endpoint.
pub struct AgentContext {
    config: Arc<Config>,
    directory: Directory,
    events: EventIds,
    shutdown: CancellationToken,
    started_at: DateTime<Utc>,
}

impl AgentContext {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            directory: Directory::default(),
            events: EventIds::new(),
            shutdown: CancellationToken::new(),
            started_at: Utc::now(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parser limits in effect
    pub fn limits(&self) -> Limits {
        self.config.protocol
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Event id source for `Event` preparation
    pub fn events(&self) -> &EventIds {
        &self.events
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Ask the core loop to stop
    pub fn request_shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Shutdown requested");
        }
        self.shutdown.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime(&self) -> Duration {
        (Utc::now() - self.started_at).to_std().unwrap_or_default()
    }
}

/// Name lookup of published endpoints and channel bindings
#[derive(Default)]
pub struct Directory {
    endpoints: RwLock<BTreeMap<String, Endpoint>>,
    channels: RwLock<BTreeMap<String, Endpoint>>,
}

impl Directory {
    /// Publish `endpoint` under its own name, replacing any previous one
    pub fn insert(&self, endpoint: Endpoint) {
        debug!("Publishing endpoint '{}'", endpoint.name());
        self.endpoints
            .write()
            .insert(endpoint.name().to_string(), endpoint);
    }

    /// Withdraw an endpoint together with every channel bound to it
    pub fn remove(&self, name: &str) -> Option<Endpoint> {
        let removed = self.endpoints.write().remove(name)?;
        self.channels.write().retain(|_, ep| *ep != removed);
        Some(removed)
    }

    pub fn get(&self, name: &str) -> Option<Endpoint> {
        self.endpoints.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.endpoints.read().keys().cloned().collect()
    }

    /// Route traffic for `channel` (case-insensitive) to `endpoint`
    pub fn bind_channel(&self, channel: &str, endpoint: &Endpoint) {
        debug!("Binding channel '{}' to '{}'", channel, endpoint.name());
        self.channels
            .write()
            .insert(channel.to_ascii_uppercase(), endpoint.clone());
    }

    pub fn channel(&self, channel: &str) -> Option<Endpoint> {
        self.channels
            .read()
            .get(&channel.to_ascii_uppercase())
            .cloned()
    }

    /// Bound channel names with their endpoints
    pub fn channels(&self) -> Vec<(String, Endpoint)> {
        self.channels
            .read()
            .iter()
            .map(|(name, ep)| (name.clone(), ep.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_publish_and_withdraw() {
        let dir = Directory::default();
        let (console, _rx) = Endpoint::new("console");
        dir.insert(console.clone());
        dir.bind_channel("Console", &console);

        assert_eq!(dir.get("console").unwrap(), console);
        assert_eq!(dir.channel("CONSOLE").unwrap(), console);
        assert_eq!(dir.channels()[0].0, "CONSOLE");

        dir.remove("console");
        assert!(dir.get("console").is_none());
        assert!(dir.channel("console").is_none());
    }

    #[test]
    fn test_shutdown_token_is_shared() {
        let ctx = AgentContext::new(Config::default());
        let token = ctx.shutdown_token();
        assert!(!token.is_cancelled());
        ctx.request_shutdown();
        assert!(token.is_cancelled());
        assert!(ctx.is_shutdown_requested());
    }

    #[test]
    fn test_limits_follow_config() {
        let mut config = Config::default();
        config.protocol.max_text_len = 300;
        let ctx = AgentContext::new(config);
        assert_eq!(ctx.limits().max_text_len, 300);
        assert_eq!(ctx.events().prepare().id(), 1);
    }
}
