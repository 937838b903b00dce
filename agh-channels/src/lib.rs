//! Transport channels for AGH
//!
//! A channel is a worker that turns traffic from some transport into
//! tagged `RecvText` messages for the core, and prints what the core
//! routes back to it.

pub mod base;
pub mod console;

pub use base::{BaseChannel, ChannelError, Result};
pub use console::{ConsoleWorker, ConsoleWriter, CONSOLE_ADDRESS, CONSOLE_CHANNEL};

use agh_core::config::Config;
use agh_core::thread::Worker;

/// Workers for every channel enabled in `config`
pub fn channel_workers(config: &Config) -> Vec<Box<dyn Worker>> {
    let mut workers: Vec<Box<dyn Worker>> = Vec::new();

    if config.channels.console.enabled {
        workers.push(Box::new(ConsoleWorker::new(config.channels.console.clone())));
        tracing::info!("Console channel initialized");
    }

    workers
}
