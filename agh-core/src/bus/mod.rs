//! In-process message bus
//!
//! Every endpoint owns one unbounded FIFO queue. Other threads hand work
//! over with [`send`]; only the loop owning the endpoint's [`Mailbox`]
//! takes messages out and runs them through its handler chain.

pub mod endpoint;
pub mod mailbox;
pub mod message;

pub use endpoint::{send, Delivery, Endpoint, EndpointStats, WeakEndpoint};
pub use mailbox::{Dispatch, DrainPolicy, Mailbox};
pub use message::{Message, MessageKind, Payload, TextPayload};
