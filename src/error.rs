//! Error types for the sensor node application.
//!
//! `NodeError` wraps the protocol client's [`ClientError`] together with the failures that can
//! happen around it: loading configuration, building payloads, reading input.
//!
//! - **`Config`**: the configuration sources could not be read or extracted (`figment`).
//! - **`Configuration`**: the configuration parsed but a value is semantically invalid.
//! - **`Client`**: anything the DTN client reports; see [`dtn_client::ErrorKind`].
//! - **`Payload`**: a reading could not be turned into JSON.
//! - **`Io`**: local I/O (stdin, files).

use dtn_client::ClientError;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type NodeResult<T> = std::result::Result<T, NodeError>;

/// Primary error type for the sensor node.
#[derive(Error, Debug)]
pub enum NodeError {
    /// Configuration sources failed to load.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration loaded but is invalid.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// DTN client failure.
    #[error("DTN client error: {0}")]
    Client(#[from] ClientError),

    /// Payload serialization failure.
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Local I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for NodeError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
