//! Error types for agh

use thiserror::Error;

use crate::protocol::ParseError;

/// The main error type for agh operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Command text rejected by the protocol parser
    #[error("Protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// Worker thread lifecycle errors
    #[error("Thread error: {0}")]
    Thread(String),

    /// A thread, loop or other bounded resource could not be acquired
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for agh operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
