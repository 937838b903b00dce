//! Console channel: stdin lines in, answers and events out on stdout

use std::io::Write;

use agh_core::bus::{Message, Payload};
use agh_core::config::ConsoleConfig;
use agh_core::handler::{Handler, HandlerCtx};
use agh_core::thread::{exit_value, Worker, WorkerContext};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, warn};

use crate::base::BaseChannel;

/// Channel name used in source tags
pub const CONSOLE_CHANNEL: &str = "CONSOLE";
/// Address of the single console peer
pub const CONSOLE_ADDRESS: &str = "stdin";

type Input = Box<dyn AsyncRead + Send + Unpin>;
type Output = Box<dyn Write + Send>;

/// Prints every text and event arriving on the console endpoint
pub struct ConsoleWriter {
    out: Output,
}

impl ConsoleWriter {
    pub fn new(out: Output) -> Self {
        Self { out }
    }

    fn print(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|()| self.out.flush()) {
            warn!("Console write failed: {}", e);
        }
    }
}

impl Handler for ConsoleWriter {
    fn name(&self) -> &str {
        "console-writer"
    }

    fn handle(&mut self, _ctx: &mut HandlerCtx<'_>, message: &mut Message) -> Option<Message> {
        match message.payload() {
            Payload::SendText(p) | Payload::TransportText(p) => self.print(&p.text),
            Payload::Event(text) => self.print(text),
            _ => {}
        }
        None
    }
}

/// Worker reading command lines from stdin
pub struct ConsoleWorker {
    config: ConsoleConfig,
    input: Option<Input>,
    output: Option<Output>,
}

impl ConsoleWorker {
    pub fn new(config: ConsoleConfig) -> Self {
        Self {
            config,
            input: None,
            output: None,
        }
    }

    /// Use `input` and `output` instead of the process's stdin and stdout
    pub fn with_io(config: ConsoleConfig, input: Input, output: Output) -> Self {
        Self {
            config,
            input: Some(input),
            output: Some(output),
        }
    }
}

impl Worker for ConsoleWorker {
    fn name(&self) -> &str {
        "console"
    }

    fn init(&mut self, ctx: &mut WorkerContext) -> agh_core::Result<()> {
        let out = self
            .output
            .take()
            .unwrap_or_else(|| Box::new(std::io::stdout()));
        ctx.register_handler(Box::new(ConsoleWriter::new(out)));
        ctx.shared()
            .directory()
            .bind_channel(CONSOLE_CHANNEL, ctx.endpoint());
        Ok(())
    }

    fn main(&mut self, ctx: &mut WorkerContext) -> i32 {
        let base = BaseChannel::new(
            CONSOLE_CHANNEL,
            self.config.allow_from.clone(),
            ctx.endpoint().clone(),
            ctx.core().clone(),
            ctx.shared().limits(),
        );
        let input = self
            .input
            .take()
            .unwrap_or_else(|| Box::new(tokio::io::stdin()));

        info!("Console channel reading from {}", CONSOLE_ADDRESS);
        let result = ctx.run_loop_with(read_lines(base, input));
        exit_value(self.name(), result)
    }
}

/// Feed each non-blank line of `input` to the core
async fn read_lines(base: BaseChannel, input: Input) {
    let mut lines = BufReader::new(input).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = base.handle_text(CONSOLE_ADDRESS, line) {
                    warn!("Console input not delivered: {}", e);
                }
            }
            Ok(None) => {
                debug!("Console input closed");
                break;
            }
            Err(e) => {
                warn!("Console read failed: {}", e);
                break;
            }
        }
    }
}
