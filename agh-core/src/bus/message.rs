//! Message envelopes carried between endpoints

use std::fmt;

use super::endpoint::{Endpoint, WeakEndpoint};
use crate::protocol::Command;

/// Kind tag of a [`Message`], derived from its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Raw text received by a transport, not parsed yet
    RecvText,
    /// Rendered text to be delivered back to a requester
    SendText,
    /// A parsed command awaiting execution
    SendCommand,
    /// A rendered event notification
    Event,
    /// Asks the receiving loop to stop
    Exit,
    /// Text to be written verbatim to a channel's transport
    TransportText,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::RecvText => "recv-text",
            MessageKind::SendText => "send-text",
            MessageKind::SendCommand => "send-command",
            MessageKind::Event => "event",
            MessageKind::Exit => "exit",
            MessageKind::TransportText => "transport-text",
        };
        f.write_str(name)
    }
}

/// Text plus the source tag it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPayload {
    pub text: String,
    /// `"<CHANNEL>=<address>"` of the originating peer, if known
    pub source: Option<String>,
}

impl TextPayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Per-kind payload, released by `Drop` when the message is consumed
#[derive(Debug)]
pub enum Payload {
    RecvText(TextPayload),
    SendText(TextPayload),
    SendCommand(Command),
    Event(String),
    Exit,
    TransportText(TextPayload),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::RecvText(_) => MessageKind::RecvText,
            Payload::SendText(_) => MessageKind::SendText,
            Payload::SendCommand(_) => MessageKind::SendCommand,
            Payload::Event(_) => MessageKind::Event,
            Payload::Exit => MessageKind::Exit,
            Payload::TransportText(_) => MessageKind::TransportText,
        }
    }
}

/// An envelope moving between two endpoints
///
/// A message is owned by exactly one party at a time: the sender until
/// [`send`](super::send), the destination queue until dispatch, and the
/// dispatcher until every handler has seen it. It is then dropped.
#[derive(Debug)]
pub struct Message {
    payload: Payload,
    src: Option<WeakEndpoint>,
    dest: Option<WeakEndpoint>,
}

impl Message {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            src: None,
            dest: None,
        }
    }

    pub fn recv_text(payload: TextPayload) -> Self {
        Self::new(Payload::RecvText(payload))
    }

    pub fn send_text(payload: TextPayload) -> Self {
        Self::new(Payload::SendText(payload))
    }

    pub fn command(command: Command) -> Self {
        Self::new(Payload::SendCommand(command))
    }

    pub fn event(text: impl Into<String>) -> Self {
        Self::new(Payload::Event(text.into()))
    }

    pub fn exit() -> Self {
        Self::new(Payload::Exit)
    }

    pub fn transport_text(payload: TextPayload) -> Self {
        Self::new(Payload::TransportText(payload))
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Sending endpoint, if it is still alive
    pub fn src(&self) -> Option<Endpoint> {
        self.src.as_ref().and_then(WeakEndpoint::upgrade)
    }

    /// Destination endpoint, if it is still alive
    pub fn dest(&self) -> Option<Endpoint> {
        self.dest.as_ref().and_then(WeakEndpoint::upgrade)
    }

    pub(crate) fn set_route(&mut self, src: &Endpoint, dest: &Endpoint) {
        self.src = Some(src.downgrade());
        self.dest = Some(dest.downgrade());
    }
}
