//! Addressable endpoints and cross-thread delivery

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::message::Message;

static NEXT_ENDPOINT_ID: AtomicU64 = AtomicU64::new(1);

struct Inner {
    id: u64,
    name: String,
    tearing_down: AtomicBool,
    teardown: CancellationToken,
    tx: mpsc::UnboundedSender<Message>,
    queued: AtomicU64,
    dispatched: AtomicU64,
    dropped: AtomicU64,
}

/// Handle to an endpoint's delivery queue
///
/// Handles are cheap to clone and may be used from any thread. Only the
/// owning [`Mailbox`](super::Mailbox) can take messages out of the queue.
#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<Inner>,
}

/// Non-owning reference stored in message envelopes
#[derive(Clone)]
pub struct WeakEndpoint {
    inner: Weak<Inner>,
}

/// Delivery counters of an endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointStats {
    /// Messages accepted into the queue
    pub queued: u64,
    /// Messages that went through the handler chain
    pub dispatched: u64,
    /// Messages released without reaching any handler
    pub dropped: u64,
}

/// Outcome of [`send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for dispatch inside the destination's loop
    Queued,
    /// Released without delivery (destination tearing down or gone)
    Dropped,
}

impl Endpoint {
    pub(crate) fn new(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            id: NEXT_ENDPOINT_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            tearing_down: AtomicBool::new(false),
            teardown: CancellationToken::new(),
            tx,
            queued: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Process-unique id
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_tearing_down(&self) -> bool {
        self.inner.tearing_down.load(Ordering::Acquire)
    }

    /// Turn every later delivery to this endpoint into a drop
    ///
    /// Also wakes the loop serving the endpoint, which stops dispatching.
    pub fn set_tearing_down(&self) {
        if !self.inner.tearing_down.swap(true, Ordering::AcqRel) {
            debug!("Endpoint '{}' is tearing down", self.inner.name);
        }
        self.inner.teardown.cancel();
    }

    /// Completes once the endpoint has been marked tearing down
    pub async fn torn_down(&self) {
        self.inner.teardown.cancelled().await
    }

    pub fn downgrade(&self) -> WeakEndpoint {
        WeakEndpoint {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn stats(&self) -> EndpointStats {
        EndpointStats {
            queued: self.inner.queued.load(Ordering::Relaxed),
            dispatched: self.inner.dispatched.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_dispatched(&self) {
        self.inner.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Endpoint {}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("tearing_down", &self.is_tearing_down())
            .finish()
    }
}

impl WeakEndpoint {
    pub fn upgrade(&self) -> Option<Endpoint> {
        self.inner.upgrade().map(|inner| Endpoint { inner })
    }
}

impl fmt::Debug for WeakEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(endpoint) => write!(f, "WeakEndpoint({})", endpoint.name()),
            None => f.write_str("WeakEndpoint(<gone>)"),
        }
    }
}

/// Hand `message` over to `dest`'s loop (`src` when `dest` is `None`)
///
/// This is the only way work crosses threads: the message is appended to
/// the destination's FIFO queue and later dispatched by the thread that
/// owns that endpoint. Messages for an endpoint that is tearing down, or
/// whose loop is gone, are released immediately.
pub fn send(mut message: Message, src: &Endpoint, dest: Option<&Endpoint>) -> Delivery {
    let dest = dest.unwrap_or(src);

    if dest.is_tearing_down() {
        debug!(
            "Dropping {} from '{}': '{}' is tearing down",
            message.kind(),
            src.name(),
            dest.name()
        );
        dest.record_dropped();
        return Delivery::Dropped;
    }

    message.set_route(src, dest);
    // Counted before the hand-off so `dispatched` never overtakes `queued`.
    dest.inner.queued.fetch_add(1, Ordering::Relaxed);
    match dest.inner.tx.send(message) {
        Ok(()) => Delivery::Queued,
        Err(mpsc::error::SendError(message)) => {
            dest.inner.queued.fetch_sub(1, Ordering::Relaxed);
            debug!(
                "Dropping {} from '{}': '{}' has no running loop",
                message.kind(),
                src.name(),
                dest.name()
            );
            dest.record_dropped();
            Delivery::Dropped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::message::TextPayload;

    #[test]
    fn test_send_queues_in_order() {
        let (a, _rx_a) = Endpoint::new("a");
        let (b, mut rx_b) = Endpoint::new("b");

        for i in 0..3 {
            let msg = Message::send_text(TextPayload::new(format!("m{}", i)));
            assert_eq!(send(msg, &a, Some(&b)), Delivery::Queued);
        }

        for i in 0..3 {
            let msg = rx_b.try_recv().unwrap();
            assert_eq!(msg.src().unwrap(), a);
            assert_eq!(msg.dest().unwrap(), b);
            match msg.into_payload() {
                crate::bus::Payload::SendText(p) => assert_eq!(p.text, format!("m{}", i)),
                other => panic!("unexpected payload {:?}", other),
            }
        }
        assert_eq!(b.stats().queued, 3);
    }

    #[test]
    fn test_send_defaults_to_source() {
        let (a, mut rx_a) = Endpoint::new("a");
        assert_eq!(send(Message::exit(), &a, None), Delivery::Queued);
        let msg = rx_a.try_recv().unwrap();
        assert_eq!(msg.dest().unwrap(), a);
    }

    #[test]
    fn test_send_to_tearing_down_endpoint_drops() {
        let (a, _rx_a) = Endpoint::new("a");
        let (b, mut rx_b) = Endpoint::new("b");
        b.set_tearing_down();

        assert_eq!(send(Message::exit(), &a, Some(&b)), Delivery::Dropped);
        assert!(rx_b.try_recv().is_err());
        assert_eq!(
            b.stats(),
            EndpointStats {
                queued: 0,
                dispatched: 0,
                dropped: 1
            }
        );
    }

    #[test]
    fn test_send_without_loop_drops() {
        let (a, _rx_a) = Endpoint::new("a");
        let (b, rx_b) = Endpoint::new("b");
        drop(rx_b);
        assert_eq!(send(Message::exit(), &a, Some(&b)), Delivery::Dropped);
        assert_eq!(b.stats().dropped, 1);
    }

    #[test]
    fn test_failed_send_is_not_counted_as_queued() {
        let (a, _rx_a) = Endpoint::new("a");
        let (b, rx_b) = Endpoint::new("b");
        drop(rx_b);
        send(Message::exit(), &a, Some(&b));
        assert_eq!(b.stats().queued, 0);
    }

    #[tokio::test]
    async fn test_torn_down_wakes_after_flag_is_set() {
        let (a, _rx) = Endpoint::new("a");
        let waiter = a.clone();
        let handle = tokio::spawn(async move { waiter.torn_down().await });

        tokio::task::yield_now().await;
        assert!(!handle.is_finished());
        a.set_tearing_down();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_weak_reference_does_not_keep_endpoint_alive() {
        let (a, _rx) = Endpoint::new("a");
        let weak = a.downgrade();
        assert!(weak.upgrade().is_some());
        drop(a);
        assert!(weak.upgrade().is_none());
    }
}
