//! Core bootstrap
//!
//! The core owns an endpoint, a handler chain and a loop like any worker,
//! plus the thread registry. [`Core::run`] brings every worker up, serves
//! the core endpoint until a shutdown request or SIGINT, then takes
//! everything down in reverse order.

pub mod context;
pub mod handlers;

pub use context::{AgentContext, Directory, CORE_ENDPOINT};
pub use handlers::{IngressHandler, OperationsHandler, RouterHandler, OPERATIONS};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{send, Endpoint, Mailbox, Message};
use crate::config::Config;
use crate::handler::{Handler, HandlerId};
use crate::thread::{ThreadRegistry, Worker, WorkerContext};
use crate::Result;

pub struct Core {
    ctx: WorkerContext,
    threads: ThreadRegistry,
}

impl Core {
    /// Build the core endpoint with the built-in handlers installed
    pub fn new(config: Config) -> Result<Self> {
        let shared = AgentContext::new(config);
        let mailbox = Mailbox::new(CORE_ENDPOINT);
        let endpoint = mailbox.endpoint().clone();
        let mut ctx = WorkerContext::with_mailbox(mailbox, Arc::clone(&shared), endpoint)?;

        ctx.register_handler(Box::new(IngressHandler));
        ctx.register_handler(Box::new(OperationsHandler));
        ctx.register_handler(Box::new(RouterHandler));
        shared.directory().insert(ctx.endpoint().clone());

        Ok(Self {
            ctx,
            threads: ThreadRegistry::new(),
        })
    }

    pub fn shared(&self) -> &Arc<AgentContext> {
        self.ctx.shared()
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.ctx.endpoint()
    }

    /// Token that stops [`run`](Self::run) when cancelled
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shared().shutdown_token()
    }

    pub fn register_thread(&mut self, worker: Box<dyn Worker>) {
        self.threads.register(worker);
    }

    /// Add a handler to the core endpoint, after the built-in ones
    pub fn register_handler(&mut self, handler: Box<dyn Handler>) -> HandlerId {
        self.ctx.register_handler(handler)
    }

    /// Run until shutdown is requested or SIGINT arrives
    pub fn run(mut self) -> Result<()> {
        info!("AGH core v{} starting", env!("CARGO_PKG_VERSION"));
        self.ctx.init_handlers();

        let shared = Arc::clone(self.ctx.shared());
        let core = self.ctx.endpoint().clone();

        let started = self
            .threads
            .prepare(&shared, &core)
            .and_then(|()| self.threads.start());
        if let Err(e) = started {
            self.shutdown();
            return Err(e);
        }
        info!("Core running with {} worker(s)", self.threads.len());

        let token = shared.shutdown_token();
        let stop = async move {
            tokio::select! {
                _ = token.cancelled() => {}
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        info!("Received SIGINT, shutting down");
                        shared.request_shutdown();
                    }
                    Err(e) => {
                        warn!("Cannot listen for SIGINT: {}", e);
                        token.cancelled().await;
                    }
                },
            }
        };

        let served = self.ctx.serve_until(stop);
        self.shutdown();
        served.map(|exited| {
            if exited {
                debug!("Core loop ended on exit message");
            }
        })
    }

    fn shutdown(&mut self) {
        let core = self.ctx.endpoint().clone();
        for endpoint in self.threads.endpoints() {
            send(Message::exit(), &core, Some(&endpoint));
        }
        self.threads.stop();

        match self.ctx.shutdown_drain() {
            Ok(0) => {}
            Ok(n) => debug!("Released {} message(s) queued on the core", n),
            Err(e) => warn!("Core drain failed: {}", e),
        }
        let leaked = self.ctx.finalize_handlers();
        if leaked > 0 {
            warn!("{} core handler(s) leaked", leaked);
        }

        self.threads.deinit();
        self.ctx.shared().directory().remove(CORE_ENDPOINT);
        std::mem::take(&mut self.threads).teardown();
        info!("Core stopped");
    }
}
