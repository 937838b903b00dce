//! Handlers installed on the core endpoint

use tracing::{debug, warn};

use crate::bus::{send, Endpoint, Message, Payload, TextPayload};
use crate::core::AgentContext;
use crate::handler::{Handler, HandlerCtx};
use crate::protocol::{Command, SourceTag, Status};

/// Operations answered by [`OperationsHandler`]
pub const OPERATIONS: [&str; 7] = ["ping", "echo", "version", "uptime", "status", "help", "quit"];

/// Turns received text into commands
///
/// Accepted lines go back to the core endpoint as `SendCommand`, keeping
/// the original sender so the answer finds its way back. Rejected lines
/// are logged and dropped.
pub struct IngressHandler;

impl Handler for IngressHandler {
    fn name(&self) -> &str {
        "ingress"
    }

    fn handle(&mut self, ctx: &mut HandlerCtx<'_>, message: &mut Message) -> Option<Message> {
        let Payload::RecvText(payload) = message.payload() else {
            return None;
        };

        let limits = ctx.shared().map(|s| s.limits()).unwrap_or_default();
        let command =
            match Command::parse_with(payload.text.trim_end(), payload.source.as_deref(), &limits) {
                Ok(command) => command,
                Err(e) => {
                    warn!(
                        "Rejected command from {}: {}",
                        payload.source.as_deref().unwrap_or("<unknown>"),
                        e
                    );
                    return None;
                }
            };
        debug!("Accepted command {} '{}'", command.id(), command.operation());

        let requester = message.src().unwrap_or_else(|| ctx.endpoint().clone());
        send(Message::command(command), &requester, Some(ctx.endpoint()));
        None
    }
}

/// Executes the built-in operations
pub struct OperationsHandler;

impl OperationsHandler {
    fn execute(ctx: &HandlerCtx<'_>, command: &mut Command) {
        let op = command.operation().to_string();
        match op.as_str() {
            "ping" => {
                command.answer().set_status(Status::OK).add_text("pong");
            }
            "echo" => {
                let args: Vec<String> = command.args().iter().map(ToString::to_string).collect();
                let answer = command.answer();
                answer.set_status(Status::OK);
                for arg in args {
                    answer.add_text(arg);
                }
            }
            "version" => {
                command
                    .answer()
                    .set_status(Status::OK)
                    .add_text(env!("CARGO_PKG_VERSION"));
            }
            "uptime" => {
                let secs = ctx.shared().map(|s| s.uptime().as_secs()).unwrap_or(0);
                command
                    .answer()
                    .set_status(Status::OK)
                    .add_text(secs.to_string());
            }
            "status" => {
                let report = status_report(ctx);
                command
                    .answer()
                    .set_status(Status::OK)
                    .set_data(true)
                    .add_text(report.to_string());
            }
            "help" => {
                let answer = command.answer();
                answer.set_status(Status::OK);
                for name in OPERATIONS {
                    answer.add_text(name);
                }
            }
            "quit" => {
                if let Some(shared) = ctx.shared() {
                    shared.request_shutdown();
                }
                command.answer().set_status(Status::OK).add_text("bye");
            }
            _ => {
                command
                    .answer()
                    .set_status(Status::UNKNOWN)
                    .add_text("unknown operation");
            }
        }
    }
}

impl Handler for OperationsHandler {
    fn name(&self) -> &str {
        "operations"
    }

    fn handle(&mut self, ctx: &mut HandlerCtx<'_>, message: &mut Message) -> Option<Message> {
        let Payload::SendCommand(command) = message.payload_mut() else {
            return None;
        };

        Self::execute(ctx, command);
        let source = command.source().map(|s| s.as_str().to_string());
        let answer = command.take_answer()?;

        let mut payload = TextPayload::new(answer.render());
        payload.source = source;
        Some(Message::send_text(payload))
    }
}

fn status_report(ctx: &HandlerCtx<'_>) -> serde_json::Value {
    let (uptime_s, endpoints, channels) = match ctx.shared() {
        Some(shared) => (
            shared.uptime().as_secs(),
            shared.directory().names(),
            shared
                .directory()
                .channels()
                .into_iter()
                .map(|(name, _)| name)
                .collect(),
        ),
        None => (0, Vec::new(), Vec::new()),
    };
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_s": uptime_s,
        "endpoints": endpoints,
        "channels": channels,
    })
}

/// Forwards events and tagged text to channel endpoints
pub struct RouterHandler;

impl Handler for RouterHandler {
    fn name(&self) -> &str {
        "router"
    }

    fn handle(&mut self, ctx: &mut HandlerCtx<'_>, message: &mut Message) -> Option<Message> {
        let Some(shared) = ctx.shared().cloned() else {
            return None;
        };

        match message.payload() {
            Payload::Event(text) => {
                for (channel, endpoint) in shared.directory().channels() {
                    debug!("Forwarding event to {}", channel);
                    ctx.send(Message::event(text.clone()), Some(&endpoint));
                }
            }
            Payload::SendText(payload) => {
                let Some(endpoint) = channel_for(&shared, payload) else {
                    debug!("Dropping text without a routable source tag");
                    return None;
                };
                ctx.send(Message::transport_text(payload.clone()), Some(&endpoint));
            }
            _ => {}
        }
        None
    }
}

/// Endpoint of the channel named by `payload`'s source tag
fn channel_for(shared: &AgentContext, payload: &TextPayload) -> Option<Endpoint> {
    let raw = payload.source.as_deref()?;
    let tag = SourceTag::parse(raw, shared.limits().max_from_len).ok()?;
    shared.directory().channel(tag.channel())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Mailbox;
    use crate::config::Config;
    use crate::core::CORE_ENDPOINT;
    use std::sync::Arc;

    struct Rig {
        shared: Arc<AgentContext>,
        core: Mailbox,
        client: Mailbox,
    }

    fn rig() -> Rig {
        let shared = AgentContext::new(Config::default());
        let mut core = Mailbox::new(CORE_ENDPOINT);
        core.register(Box::new(IngressHandler));
        core.register(Box::new(OperationsHandler));
        core.register(Box::new(RouterHandler));
        core.chain_mut().init_all(Some(Arc::clone(&shared)));
        shared.directory().insert(core.endpoint().clone());

        let client = Mailbox::new("console");
        shared.directory().insert(client.endpoint().clone());
        shared.directory().bind_channel("CONSOLE", client.endpoint());
        Rig {
            shared,
            core,
            client,
        }
    }

    impl Rig {
        /// Deliver `line` to the core as if typed on the console
        fn request(&mut self, line: &str) -> Option<String> {
            let text = TextPayload::new(line).with_source("CONSOLE=stdin");
            send(
                Message::recv_text(text),
                self.client.endpoint(),
                Some(self.core.endpoint()),
            );
            while self.core.pump() > 0 {}
            self.client.try_recv().map(|m| match m.into_payload() {
                Payload::SendText(p) => {
                    assert_eq!(p.source.as_deref(), Some("CONSOLE=stdin"));
                    p.text
                }
                other => panic!("unexpected payload {:?}", other),
            })
        }
    }

    #[test]
    fn test_ping_answers_pong() {
        let mut rig = rig();
        assert_eq!(
            rig.request(r#"AT = ( 1, "ping" )"#).as_deref(),
            Some(r#"IH = ( 1, 200, "pong" )"#)
        );
    }

    #[test]
    fn test_zero_id_never_reaches_operations() {
        let mut rig = rig();
        assert!(rig.request(r#"AT = ( 0, "ping" )"#).is_none());
        assert!(rig.core.try_recv().is_none());
        assert_eq!(rig.core.endpoint().stats().dispatched, 1);
    }

    #[test]
    fn test_echo_returns_arguments() {
        let mut rig = rig();
        assert_eq!(
            rig.request(r#"AT = ( 7, "echo", 42, "hi", true )"#).as_deref(),
            Some(r#"IH = ( 7, 200, "42", "hi", "true" )"#)
        );
    }

    #[test]
    fn test_echo_keeps_escaped_text_on_one_line() {
        let mut rig = rig();
        assert_eq!(
            rig.request(r#"AT = ( 8, "echo", "a\nb\tc" )"#).as_deref(),
            Some(r#"IH = ( 8, 200, "a\nb\tc" )"#)
        );
    }

    #[test]
    fn test_unknown_operation() {
        let mut rig = rig();
        assert_eq!(
            rig.request(r#"AT = ( 3, "frobnicate" )"#).as_deref(),
            Some(r#"IH = ( 3, 380, "unknown operation" )"#)
        );
    }

    #[test]
    fn test_status_is_data_answer() {
        let mut rig = rig();
        let text = rig.request(r#"AT = ( 2, "status" )"#).unwrap();
        let raw = text.strip_prefix(r#"IH = ( 2, 200, "DATA" )"#).unwrap();
        let report: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert_eq!(report["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(report["channels"][0], "CONSOLE");
    }

    #[test]
    fn test_quit_requests_shutdown() {
        let mut rig = rig();
        assert_eq!(
            rig.request(r#"AT = ( 9, "quit" )"#).as_deref(),
            Some(r#"IH = ( 9, 200, "bye" )"#)
        );
        assert!(rig.shared.is_shutdown_requested());
    }

    #[test]
    fn test_events_fan_out_to_channels() {
        let mut rig = rig();
        send(Message::event("EVENT = ( 1, 200, \"x\" )"), rig.core.endpoint(), None);
        rig.core.pump();

        let forwarded = rig.client.try_recv().unwrap();
        assert!(matches!(forwarded.payload(), Payload::Event(t) if t.starts_with("EVENT")));
    }

    #[test]
    fn test_tagged_text_reaches_channel_transport() {
        let mut rig = rig();
        let text = TextPayload::new("hello").with_source("console=stdin");
        send(Message::send_text(text), rig.core.endpoint(), None);
        rig.core.pump();

        match rig.client.try_recv().unwrap().into_payload() {
            Payload::TransportText(p) => assert_eq!(p.text, "hello"),
            other => panic!("unexpected payload {:?}", other),
        }
    }
}
