//! Worker that emits a heartbeat event on a fixed interval

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::types::{HeartbeatConfig, HEARTBEAT_EVENT_NAME};
use crate::bus::{send, Message};
use crate::protocol::{EventIds, Status};
use crate::thread::{exit_value, Worker, WorkerContext};

/// Sends `EVENT = ( id, 200, "heartbeat", "<tick>", "<time>" )` to the core
pub struct HeartbeatWorker {
    config: HeartbeatConfig,
}

impl HeartbeatWorker {
    pub fn new(config: HeartbeatConfig) -> Self {
        Self { config }
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_s.max(1))
    }
}

/// Render heartbeat number `tick`
pub fn heartbeat_event(events: &EventIds, tick: u64, now: DateTime<Utc>) -> String {
    let mut event = events.prepare();
    event
        .set_status(Status::OK)
        .add_text(HEARTBEAT_EVENT_NAME)
        .add_text(tick.to_string())
        .add_text(now.to_rfc3339_opts(SecondsFormat::Secs, true));
    event.render()
}

impl Worker for HeartbeatWorker {
    fn name(&self) -> &str {
        "heartbeat"
    }

    fn main(&mut self, ctx: &mut WorkerContext) -> i32 {
        let period = self.interval();
        let shared = ctx.shared().clone();
        let own = ctx.endpoint().clone();
        let core = ctx.core().clone();
        info!("Heartbeat started (every {}s)", period.as_secs());

        let ticker = async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut tick: u64 = 0;
            loop {
                ticks.tick().await;
                tick += 1;
                debug!("Heartbeat tick {}", tick);
                let text = heartbeat_event(shared.events(), tick, Utc::now());
                send(Message::event(text), &own, Some(&core));
            }
        };

        let result = ctx.run_loop_with(ticker);
        exit_value(self.name(), result)
    }
}
