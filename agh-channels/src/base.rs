//! Common channel plumbing: sender allow-list and source tagging

use agh_core::bus::{send, Delivery, Endpoint, Message, TextPayload};
use agh_core::protocol::{Limits, SourceTag};

/// Channel errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Invalid source tag: {0}")]
    InvalidSource(String),

    #[error("Send error: {0}")]
    SendError(String),

    #[error("Access denied for sender: {0}")]
    AccessDenied(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

/// Base channel implementation with common functionality
pub struct BaseChannel {
    /// Channel name, upper-case (`CONSOLE`)
    pub name: String,
    /// Allowed senders list (empty = allow all)
    pub allow_from: Vec<String>,
    endpoint: Endpoint,
    core: Endpoint,
    limits: Limits,
}

impl BaseChannel {
    /// Create a new base channel sending from `endpoint` to `core`
    pub fn new(
        name: impl Into<String>,
        allow_from: Vec<String>,
        endpoint: Endpoint,
        core: Endpoint,
        limits: Limits,
    ) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            allow_from,
            endpoint,
            core,
            limits,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Check if a sender is allowed
    pub fn is_allowed(&self, sender_id: &str) -> bool {
        // If no allow list, allow everyone
        if self.allow_from.is_empty() {
            return true;
        }

        if self.allow_from.iter().any(|a| a == sender_id) {
            return true;
        }

        // Handle compound IDs (e.g., "12345|username")
        sender_id
            .split('|')
            .any(|part| !part.is_empty() && self.allow_from.iter().any(|a| a == part))
    }

    /// Tag `text` with this channel and `address` and hand it to the core
    pub fn handle_text(&self, address: &str, text: impl Into<String>) -> Result<()> {
        if !self.is_allowed(address) {
            tracing::warn!(
                "Access denied for sender {} on channel {}. Add them to allow_from in config to grant access.",
                address,
                self.name
            );
            return Err(ChannelError::AccessDenied(address.to_string()));
        }

        let tag = SourceTag::for_channel(&self.name, address, self.limits.max_from_len)
            .map_err(|e| ChannelError::InvalidSource(e.to_string()))?;
        let payload = TextPayload::new(text).with_source(tag.as_str());

        match send(Message::recv_text(payload), &self.endpoint, Some(&self.core)) {
            Delivery::Queued => Ok(()),
            Delivery::Dropped => Err(ChannelError::SendError(format!(
                "core endpoint '{}' is not accepting messages",
                self.core.name()
            ))),
        }
    }
}
