//! Ordered, owning handler registry of one endpoint

use std::sync::Arc;

use tracing::{debug, warn};

use super::{ChainOp, Handler, HandlerCtx, HandlerId};
use crate::bus::{Endpoint, Message};
use crate::core::AgentContext;

struct Entry {
    id: HandlerId,
    enabled: bool,
    handler: Box<dyn Handler>,
}

/// Handlers of one endpoint, in registration order
///
/// The chain owns its handlers. After setup only the thread running the
/// endpoint's loop touches it.
pub struct HandlerChain {
    endpoint: Endpoint,
    entries: Vec<Entry>,
    shared: Option<Arc<AgentContext>>,
    next_id: u64,
}

impl HandlerChain {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            entries: Vec::new(),
            shared: None,
            next_id: 1,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn shared(&self) -> Option<&Arc<AgentContext>> {
        self.shared.as_ref()
    }

    /// Append an enabled handler
    pub fn register(&mut self, handler: Box<dyn Handler>) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        debug!(
            "Registered handler '{}' {} on '{}'",
            handler.name(),
            id,
            self.endpoint.name()
        );
        self.entries.push(Entry {
            id,
            enabled: true,
            handler,
        });
        id
    }

    /// Remove a handler, returning it to the caller
    pub fn deregister(&mut self, id: HandlerId) -> Option<Box<dyn Handler>> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index).handler)
    }

    /// Returns false when `id` is not registered
    pub fn set_enabled(&mut self, id: HandlerId, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, id: HandlerId) -> Option<bool> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.enabled)
    }

    pub fn contains(&self, id: HandlerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handler names in chain order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.handler.name()).collect()
    }

    /// Bind the shared context and run `init` on every enabled handler
    pub fn init_all(&mut self, shared: Option<Arc<AgentContext>>) {
        self.shared = shared;
        let mut ops = Vec::new();

        for entry in self.entries.iter_mut() {
            if !entry.enabled {
                continue;
            }
            let mut ctx =
                HandlerCtx::new(entry.id, &self.endpoint, self.shared.as_ref(), &mut ops);
            if let Err(e) = entry.handler.init(&mut ctx) {
                warn!(
                    "Handler '{}' on '{}' failed to initialize, disabling it: {}",
                    entry.handler.name(),
                    self.endpoint.name(),
                    e
                );
                entry.enabled = false;
            }
        }

        self.apply(ops);
    }

    /// Run `finalize` on every enabled handler and release the chain
    ///
    /// Returns how many handlers were still registered afterwards. Those
    /// are logged and released anyway.
    pub fn finalize_all(&mut self) -> usize {
        let mut ops = Vec::new();

        for entry in self.entries.iter_mut() {
            if !entry.enabled {
                ops.push(ChainOp::Deregister(entry.id));
                continue;
            }
            let mut ctx =
                HandlerCtx::new(entry.id, &self.endpoint, self.shared.as_ref(), &mut ops);
            entry.handler.finalize(&mut ctx);
        }

        self.apply(ops);

        let leaked = self.entries.len();
        if leaked > 0 {
            warn!(
                "{} handler(s) still registered on '{}' after finalize: {}",
                leaked,
                self.endpoint.name(),
                self.names().join(", ")
            );
            self.entries.clear();
        }
        leaked
    }

    /// Offer `message` to each enabled handler in order
    ///
    /// The chain is frozen for the duration: mutations requested by
    /// handlers are applied after the last handler returns. Answers are
    /// passed to `on_answer` as soon as they are produced.
    pub(crate) fn dispatch(
        &mut self,
        message: &mut Message,
        mut on_answer: impl FnMut(&Message, Message),
    ) -> usize {
        let mut ops = Vec::new();
        let mut invoked = 0;

        for entry in self.entries.iter_mut() {
            if !entry.enabled {
                continue;
            }
            let mut ctx =
                HandlerCtx::new(entry.id, &self.endpoint, self.shared.as_ref(), &mut ops);
            let answer = entry.handler.handle(&mut ctx, message);
            invoked += 1;
            if let Some(answer) = answer {
                on_answer(message, answer);
            }
        }

        self.apply(ops);
        invoked
    }

    fn apply(&mut self, ops: Vec<ChainOp>) {
        for op in ops {
            match op {
                ChainOp::Deregister(id) => {
                    if let Some(handler) = self.deregister(id) {
                        debug!(
                            "Deregistered handler '{}' {} from '{}'",
                            handler.name(),
                            id,
                            self.endpoint.name()
                        );
                    }
                }
                ChainOp::SetEnabled(id, enabled) => {
                    self.set_enabled(id, enabled);
                }
            }
        }
    }
}
