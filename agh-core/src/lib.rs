//! Core of the AGH agent
//!
//! An in-process message bus with per-thread endpoints, the handler
//! chains that process messages on them, the worker thread registry and
//! the `AT`/`IH`/`EVENT` command protocol.

pub mod bus;
pub mod config;
pub mod core;
pub mod error;
pub mod handler;
pub mod heartbeat;
pub mod logging;
pub mod protocol;
pub mod thread;

pub use error::{Error, Result};
