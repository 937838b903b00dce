//! Handlers and the per-endpoint handler chain
//!
//! A handler is registered on exactly one endpoint's chain, which owns it
//! for its whole life. The chain calls `init` once at startup, `handle` for
//! every dispatched message and `finalize` once at shutdown.

pub mod chain;

pub use chain::HandlerChain;

use std::fmt;
use std::sync::Arc;

use crate::bus::{send, Delivery, Endpoint, Message};
use crate::core::AgentContext;
use crate::Result;

/// Identifier of a handler within its chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub(crate) u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A unit of message processing on one endpoint
pub trait Handler: Send {
    /// Name used in logs and diagnostics
    fn name(&self) -> &str;

    /// Called once after registration, only while enabled.
    /// An error disables the handler.
    fn init(&mut self, _ctx: &mut HandlerCtx<'_>) -> Result<()> {
        Ok(())
    }

    /// Called for every message dispatched on the owning endpoint.
    ///
    /// A returned message is sent back to the original sender.
    fn handle(&mut self, ctx: &mut HandlerCtx<'_>, message: &mut Message) -> Option<Message>;

    /// Called once at shutdown, only while enabled. Implementations are
    /// expected to remove themselves from the chain.
    fn finalize(&mut self, ctx: &mut HandlerCtx<'_>) {
        ctx.deregister_self();
    }
}

/// Chain mutation requested from inside a handler callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChainOp {
    Deregister(HandlerId),
    SetEnabled(HandlerId, bool),
}

/// What a handler callback can see and request
///
/// Chain mutations are queued and applied once the current callback pass
/// (a dispatch, `init_all` or `finalize_all`) has finished.
pub struct HandlerCtx<'a> {
    id: HandlerId,
    endpoint: &'a Endpoint,
    shared: Option<&'a Arc<AgentContext>>,
    ops: &'a mut Vec<ChainOp>,
}

impl<'a> HandlerCtx<'a> {
    pub(crate) fn new(
        id: HandlerId,
        endpoint: &'a Endpoint,
        shared: Option<&'a Arc<AgentContext>>,
        ops: &'a mut Vec<ChainOp>,
    ) -> Self {
        Self {
            id,
            endpoint,
            shared,
            ops,
        }
    }

    /// Id of the handler being called
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Endpoint owning the chain
    pub fn endpoint(&self) -> &Endpoint {
        self.endpoint
    }

    /// Shared agent context, once bound by `init_all`
    pub fn shared(&self) -> Option<&Arc<AgentContext>> {
        self.shared
    }

    /// Send `message` from this endpoint (to itself when `dest` is `None`)
    pub fn send(&self, message: Message, dest: Option<&Endpoint>) -> Delivery {
        send(message, self.endpoint, dest)
    }

    pub fn deregister(&mut self, id: HandlerId) {
        self.ops.push(ChainOp::Deregister(id));
    }

    pub fn deregister_self(&mut self) {
        let id = self.id;
        self.deregister(id);
    }

    pub fn set_enabled(&mut self, id: HandlerId, enabled: bool) {
        self.ops.push(ChainOp::SetEnabled(id, enabled));
    }
}
