//! Worker threads
//!
//! Each worker runs on its own native thread with a private
//! single-threaded loop and its own endpoint. Workers and the core only
//! talk through [`send`](crate::bus::send).

pub mod registry;
pub mod worker;

pub use registry::{ThreadRegistry, ThreadState};
pub use worker::{exit_value, Worker, WorkerContext};
