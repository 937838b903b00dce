//! Worker interface and the per-thread context it runs in

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error};

use crate::bus::{DrainPolicy, Endpoint, Mailbox};
use crate::core::AgentContext;
use crate::handler::{Handler, HandlerChain, HandlerId};
use crate::{Error, Result};

/// A long-running unit of work owning one endpoint and one thread
///
/// `init` runs on the core thread while the registry prepares workers,
/// `main` on the worker's own thread, `deinit` back on the core thread
/// after the worker thread has been joined.
pub trait Worker: Send {
    /// Thread and endpoint name
    fn name(&self) -> &str;

    /// Register handlers on the worker's endpoint
    fn init(&mut self, _ctx: &mut WorkerContext) -> Result<()> {
        Ok(())
    }

    /// Thread body; the return value is the thread's exit value
    fn main(&mut self, ctx: &mut WorkerContext) -> i32 {
        let result = ctx.run_loop();
        exit_value(self.name(), result)
    }

    /// Release what `init` set up
    fn deinit(&mut self, ctx: &mut WorkerContext) {
        ctx.finalize_handlers();
    }
}

/// Map a loop result to a thread exit value, logging failures
pub fn exit_value(name: &str, result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("Loop of '{}' failed: {}", name, e);
            1
        }
    }
}

/// Endpoint, handler chain and private loop of one thread
pub struct WorkerContext {
    shared: Arc<AgentContext>,
    core: Endpoint,
    mailbox: Mailbox,
    runtime: Option<Runtime>,
    drain: DrainPolicy,
}

impl WorkerContext {
    /// Create a fresh endpoint named `name` with its own loop
    pub fn new(name: &str, shared: Arc<AgentContext>, core: Endpoint) -> Result<Self> {
        Self::with_mailbox(Mailbox::new(name), shared, core)
    }

    pub fn with_mailbox(
        mailbox: Mailbox,
        shared: Arc<AgentContext>,
        core: Endpoint,
    ) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .thread_name(format!("agh-{}", mailbox.endpoint().name()))
            .build()
            .map_err(|e| {
                Error::ResourceExhausted(format!(
                    "cannot build loop for '{}': {}",
                    mailbox.endpoint().name(),
                    e
                ))
            })?;
        let drain = DrainPolicy::from(&shared.config().bus);

        Ok(Self {
            shared,
            core,
            mailbox,
            runtime: Some(runtime),
            drain,
        })
    }

    pub fn shared(&self) -> &Arc<AgentContext> {
        &self.shared
    }

    /// The core endpoint
    pub fn core(&self) -> &Endpoint {
        &self.core
    }

    /// This thread's own endpoint
    pub fn endpoint(&self) -> &Endpoint {
        self.mailbox.endpoint()
    }

    pub fn register_handler(&mut self, handler: Box<dyn Handler>) -> HandlerId {
        self.mailbox.register(handler)
    }

    pub fn chain(&self) -> &HandlerChain {
        self.mailbox.chain()
    }

    pub fn chain_mut(&mut self) -> &mut HandlerChain {
        self.mailbox.chain_mut()
    }

    pub fn mailbox_mut(&mut self) -> &mut Mailbox {
        &mut self.mailbox
    }

    /// Run `init` on every registered handler, binding the shared context
    pub fn init_handlers(&mut self) {
        let shared = Arc::clone(&self.shared);
        self.mailbox.chain_mut().init_all(Some(shared));
    }

    /// Run `finalize` on every handler; returns the leaked count
    pub fn finalize_handlers(&mut self) -> usize {
        self.mailbox.chain_mut().finalize_all()
    }

    /// Dispatch until an `Exit` message, then tear down and drain
    pub fn run_loop(&mut self) -> Result<()> {
        self.run_loop_with(std::future::pending::<()>())
    }

    /// Like [`run_loop`](Self::run_loop), polling `task` on the same loop
    ///
    /// `task` finishing does not end the loop; only `Exit` or the endpoint
    /// being marked tearing down does.
    pub fn run_loop_with<F>(&mut self, task: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let runtime = self.runtime.as_ref().ok_or_else(|| released(self.endpoint()))?;
        let mailbox = &mut self.mailbox;

        runtime.block_on(async move {
            tokio::pin!(task);
            let mut task_done = false;
            loop {
                tokio::select! {
                    message = mailbox.next() => {
                        let Some(message) = message else { break };
                        if mailbox.dispatch(message).is_exit() {
                            break;
                        }
                    }
                    _ = &mut task, if !task_done => {
                        debug!("Task on '{}' finished", mailbox.endpoint().name());
                        task_done = true;
                    }
                }
            }
        });

        self.shutdown_drain().map(|_| ())
    }

    /// Dispatch until an `Exit` message, until `stop` completes or until
    /// the endpoint is marked tearing down
    ///
    /// Returns true when the loop ended on `Exit`. The endpoint stays
    /// live; call [`shutdown_drain`](Self::shutdown_drain) afterwards.
    pub fn serve_until<F>(&mut self, stop: F) -> Result<bool>
    where
        F: Future<Output = ()>,
    {
        let runtime = self.runtime.as_ref().ok_or_else(|| released(self.endpoint()))?;
        let mailbox = &mut self.mailbox;

        let exited = runtime.block_on(async move {
            tokio::pin!(stop);
            loop {
                tokio::select! {
                    message = mailbox.next() => {
                        let Some(message) = message else { return false };
                        if mailbox.dispatch(message).is_exit() {
                            return true;
                        }
                    }
                    _ = &mut stop => return false,
                }
            }
        });
        Ok(exited)
    }

    /// Mark the endpoint tearing down and release what is still queued
    pub fn shutdown_drain(&mut self) -> Result<usize> {
        let runtime = self.runtime.as_ref().ok_or_else(|| released(self.endpoint()))?;
        self.mailbox.endpoint().set_tearing_down();
        Ok(runtime.block_on(self.mailbox.drain(self.drain)))
    }
}

fn released(endpoint: &Endpoint) -> Error {
    Error::Thread(format!("loop of '{}' was already released", endpoint.name()))
}

impl Drop for WorkerContext {
    fn drop(&mut self) {
        // Tasks blocked on stdin must not hold up teardown.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{send, Message};
    use crate::config::Config;
    use crate::core::CORE_ENDPOINT;
    use crate::handler::HandlerCtx;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(Arc<AtomicUsize>);

    impl Handler for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn handle(&mut self, _ctx: &mut HandlerCtx<'_>, _message: &mut Message) -> Option<Message> {
            self.0.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    fn context(name: &str) -> WorkerContext {
        let shared = AgentContext::new(Config::default());
        let (core, _rx) = Endpoint::new(CORE_ENDPOINT);
        WorkerContext::new(name, shared, core).unwrap()
    }

    #[test]
    fn test_run_loop_stops_on_exit_and_drains() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut ctx = context("w");
        ctx.register_handler(Box::new(Counter(Arc::clone(&calls))));
        ctx.init_handlers();

        let ep = ctx.endpoint().clone();
        send(Message::event("a"), &ep, None);
        send(Message::exit(), &ep, None);
        send(Message::event("late"), &ep, None);

        ctx.run_loop().unwrap();

        assert!(ep.is_tearing_down());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(ep.stats().dropped, 1);
        assert_eq!(ctx.finalize_handlers(), 0);
    }

    #[test]
    fn test_run_loop_with_polls_task() {
        let mut ctx = context("w");
        let ep = ctx.endpoint().clone();
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&ran);

        let task = async move {
            flag.fetch_add(1, Ordering::SeqCst);
            send(Message::exit(), &ep, None);
        };
        ctx.run_loop_with(task).unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_loop_ends_when_endpoint_tears_down_from_another_thread() {
        let mut ctx = context("w");
        let ep = ctx.endpoint().clone();

        let worker = std::thread::spawn(move || {
            let result = ctx.run_loop();
            (result, ctx)
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        ep.set_tearing_down();

        let (result, _ctx) = worker.join().unwrap();
        result.unwrap();
        assert!(ep.is_tearing_down());
    }

    #[test]
    fn test_serve_until_returns_when_endpoint_tears_down() {
        let mut ctx = context("w");
        ctx.endpoint().set_tearing_down();
        let exited = ctx.serve_until(std::future::pending::<()>()).unwrap();
        assert!(!exited);
    }

    #[test]
    fn test_serve_until_returns_when_stopped() {
        let mut ctx = context("w");
        let exited = ctx.serve_until(async {}).unwrap();
        assert!(!exited);
        assert!(!ctx.endpoint().is_tearing_down());
    }
}
