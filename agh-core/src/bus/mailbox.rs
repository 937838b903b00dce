//! Receiving side of an endpoint and the dispatch loop

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::endpoint::{send, Endpoint};
use super::message::{Message, MessageKind};
use crate::config::BusConfig;
use crate::handler::{Handler, HandlerChain, HandlerId};

/// Bounds of the shutdown drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainPolicy {
    /// Consecutive empty polls before the drain gives up
    pub idle_iterations: u32,
    /// Pause between empty polls
    pub idle_tick: Duration,
}

impl Default for DrainPolicy {
    fn default() -> Self {
        Self {
            idle_iterations: 10,
            idle_tick: Duration::from_millis(10),
        }
    }
}

impl From<&BusConfig> for DrainPolicy {
    fn from(config: &BusConfig) -> Self {
        Self {
            idle_iterations: config.drain_idle_iterations,
            idle_tick: Duration::from_millis(config.drain_idle_tick_ms),
        }
    }
}

/// Result of dispatching one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Offered to `handlers` handlers; `exit` is set for `Exit` messages
    Handled { handlers: usize, exit: bool },
    /// Released unseen because the endpoint is tearing down
    Dropped,
}

impl Dispatch {
    pub fn is_exit(&self) -> bool {
        matches!(self, Dispatch::Handled { exit: true, .. })
    }
}

/// An endpoint's queue together with its handler chain
///
/// Owned by the thread that runs the endpoint's loop.
pub struct Mailbox {
    chain: HandlerChain,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Mailbox {
    /// Create an endpoint named `name` with an empty chain
    pub fn new(name: impl Into<String>) -> Self {
        let (endpoint, rx) = Endpoint::new(name);
        Self {
            chain: HandlerChain::new(endpoint),
            rx,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.chain.endpoint()
    }

    pub fn chain(&self) -> &HandlerChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut HandlerChain {
        &mut self.chain
    }

    pub fn register(&mut self, handler: Box<dyn Handler>) -> HandlerId {
        self.chain.register(handler)
    }

    /// Next delivered message
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Run `message` through the chain, then release it
    pub fn dispatch(&mut self, mut message: Message) -> Dispatch {
        let endpoint = self.chain.endpoint().clone();
        let kind = message.kind();

        if endpoint.is_tearing_down() {
            debug!("Dropping {} on '{}': tearing down", kind, endpoint.name());
            endpoint.record_dropped();
            return Dispatch::Dropped;
        }

        let handlers = self.chain.dispatch(&mut message, |original, answer| {
            route_answer(&endpoint, original, answer);
        });
        endpoint.record_dispatched();
        trace!("Dispatched {} on '{}' to {} handler(s)", kind, endpoint.name(), handlers);

        Dispatch::Handled {
            handlers,
            exit: kind == MessageKind::Exit,
        }
    }

    /// Dispatch everything already queued, without waiting
    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        while let Some(message) = self.try_recv() {
            self.dispatch(message);
            count += 1;
        }
        count
    }

    /// Next delivered message, or `None` once the endpoint is tearing down
    ///
    /// A loop waiting here is released by
    /// [`Endpoint::set_tearing_down`] even when its queue stays empty.
    pub async fn next(&mut self) -> Option<Message> {
        let endpoint = self.chain.endpoint().clone();
        if endpoint.is_tearing_down() {
            return None;
        }
        tokio::select! {
            message = self.rx.recv() => message,
            _ = endpoint.torn_down() => {
                debug!("Loop of '{}' released by teardown", endpoint.name());
                None
            }
        }
    }

    /// Dispatch messages until an `Exit` message has been handled or the
    /// endpoint starts tearing down
    pub async fn run(&mut self) {
        while let Some(message) = self.next().await {
            if self.dispatch(message).is_exit() {
                debug!("Loop of '{}' received exit", self.endpoint().name());
                break;
            }
        }
    }

    /// Release in-flight deliveries before the mailbox goes away
    ///
    /// Polls the queue until it has been empty for
    /// `policy.idle_iterations` consecutive ticks; any message found resets
    /// the count. Returns how many messages were taken off the queue.
    pub async fn drain(&mut self, policy: DrainPolicy) -> usize {
        let mut idle = 0;
        let mut drained = 0;

        while idle < policy.idle_iterations {
            match self.rx.try_recv() {
                Ok(message) => {
                    self.dispatch(message);
                    drained += 1;
                    idle = 0;
                }
                Err(mpsc::error::TryRecvError::Empty) => {
                    idle += 1;
                    tokio::time::sleep(policy.idle_tick).await;
                }
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
        }

        if drained > 0 {
            debug!(
                "Drained {} message(s) from '{}'",
                drained,
                self.endpoint().name()
            );
        }
        drained
    }
}

/// Send `answer` back along the reverse of `original`'s route.
fn route_answer(own: &Endpoint, original: &Message, answer: Message) {
    let Some(requester) = original.src() else {
        debug!(
            "Dropping {} answer on '{}': requester is gone",
            answer.kind(),
            own.name()
        );
        return;
    };
    let responder = original.dest().unwrap_or_else(|| own.clone());
    send(answer, &responder, Some(&requester));
}
