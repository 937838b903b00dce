//! Ownership and lifecycle of worker threads

use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, error, info, warn};

use super::worker::{Worker, WorkerContext};
use crate::bus::Endpoint;
use crate::core::AgentContext;
use crate::{Error, Result};

/// Lifecycle position of a registered worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Registered,
    Prepared,
    Running,
    Stopped,
    Deinitialized,
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThreadState::Registered => "registered",
            ThreadState::Prepared => "prepared",
            ThreadState::Running => "running",
            ThreadState::Stopped => "stopped",
            ThreadState::Deinitialized => "deinitialized",
        };
        f.write_str(name)
    }
}

type Joined = (Box<dyn Worker>, WorkerContext, i32);

struct Slot {
    name: String,
    state: ThreadState,
    worker: Option<Box<dyn Worker>>,
    ctx: Option<WorkerContext>,
    endpoint: Option<Endpoint>,
    handle: Option<JoinHandle<Joined>>,
    exit_value: Option<i32>,
}

/// Registry of worker threads, driven by the core
///
/// Every operation walks the workers in registration order and only
/// touches those in the state it expects.
#[derive(Default)]
pub struct ThreadRegistry {
    slots: Vec<Slot>,
    shared: Option<Arc<AgentContext>>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, worker: Box<dyn Worker>) {
        let name = worker.name().to_string();
        debug!("Registered worker '{}'", name);
        self.slots.push(Slot {
            name,
            state: ThreadState::Registered,
            worker: Some(worker),
            ctx: None,
            endpoint: None,
            handle: None,
            exit_value: None,
        });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn state(&self, name: &str) -> Option<ThreadState> {
        self.slot(name).map(|s| s.state)
    }

    pub fn exit_value(&self, name: &str) -> Option<i32> {
        self.slot(name).and_then(|s| s.exit_value)
    }

    /// Endpoints of every prepared worker
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.slots.iter().filter_map(|s| s.endpoint.clone()).collect()
    }

    fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Give each worker its endpoint and loop, publish it, then run `init`
    pub fn prepare(&mut self, shared: &Arc<AgentContext>, core: &Endpoint) -> Result<()> {
        self.shared = Some(Arc::clone(shared));
        for slot in &mut self.slots {
            if slot.state != ThreadState::Registered {
                continue;
            }
            let Some(worker) = slot.worker.as_mut() else {
                continue;
            };

            let mut ctx = WorkerContext::new(&slot.name, Arc::clone(shared), core.clone())?;
            shared.directory().insert(ctx.endpoint().clone());
            slot.endpoint = Some(ctx.endpoint().clone());

            let init = worker.init(&mut ctx);
            ctx.init_handlers();
            slot.ctx = Some(ctx);
            slot.state = ThreadState::Prepared;

            init.map_err(|e| {
                Error::Thread(format!("worker '{}' failed to initialize: {}", slot.name, e))
            })?;
            debug!("Prepared worker '{}'", slot.name);
        }
        Ok(())
    }

    /// Spawn one named thread per prepared worker
    pub fn start(&mut self) -> Result<()> {
        for slot in &mut self.slots {
            if slot.state != ThreadState::Prepared {
                continue;
            }
            let (Some(mut worker), Some(mut ctx)) = (slot.worker.take(), slot.ctx.take()) else {
                continue;
            };

            let spawned = std::thread::Builder::new()
                .name(format!("agh-{}", slot.name))
                .spawn(move || {
                    let code = worker.main(&mut ctx);
                    (worker, ctx, code)
                });

            match spawned {
                Ok(handle) => {
                    slot.handle = Some(handle);
                    slot.state = ThreadState::Running;
                    info!("Started worker '{}'", slot.name);
                }
                Err(e) => {
                    // The worker went down with the closure; deinit only unpublishes it.
                    slot.state = ThreadState::Stopped;
                    return Err(Error::ResourceExhausted(format!(
                        "cannot spawn thread for '{}': {}",
                        slot.name, e
                    )));
                }
            }
        }
        Ok(())
    }

    /// Join every running worker thread
    pub fn stop(&mut self) {
        for slot in &mut self.slots {
            let Some(handle) = slot.handle.take() else {
                continue;
            };
            match handle.join() {
                Ok((worker, ctx, code)) => {
                    if code == 0 {
                        info!("Worker '{}' exited", slot.name);
                    } else {
                        warn!("Worker '{}' exited with {}", slot.name, code);
                    }
                    slot.worker = Some(worker);
                    slot.ctx = Some(ctx);
                    slot.exit_value = Some(code);
                }
                Err(_) => {
                    error!("Worker thread '{}' panicked", slot.name);
                }
            }
            slot.state = ThreadState::Stopped;
        }
    }

    /// Run `deinit` and release each worker's endpoint and loop
    ///
    /// Prepared workers that never started are released too. Endpoints of
    /// workers lost to a panic or a failed spawn are still unpublished.
    pub fn deinit(&mut self) {
        let directory = self.shared.as_ref().map(|shared| shared.directory());
        for slot in &mut self.slots {
            if !matches!(slot.state, ThreadState::Prepared | ThreadState::Stopped) {
                continue;
            }
            if let (Some(worker), Some(ctx)) = (slot.worker.as_mut(), slot.ctx.as_mut()) {
                worker.deinit(ctx);
                if !ctx.chain().is_empty() {
                    warn!(
                        "Worker '{}' left {} handler(s) registered: {}",
                        slot.name,
                        ctx.chain().len(),
                        ctx.chain().names().join(", ")
                    );
                }
            }
            if let Some(endpoint) = slot.endpoint.take() {
                endpoint.set_tearing_down();
                if let Some(directory) = directory {
                    directory.remove(&slot.name);
                }
            }
            slot.ctx = None;
            slot.state = ThreadState::Deinitialized;
            debug!("Deinitialized worker '{}'", slot.name);
        }
    }

    /// Release the registry and every worker it still holds
    pub fn teardown(self) {
        for slot in &self.slots {
            if slot.state != ThreadState::Deinitialized && slot.state != ThreadState::Registered {
                warn!("Tearing down worker '{}' in state {}", slot.name, slot.state);
            }
        }
        debug!("Thread registry released ({} worker(s))", self.slots.len());
    }
}
