//! Client error types.
//!
//! Every failure the client reports falls into one of four kinds:
//!
//! - **`Validation`**: a [`Message`](crate::Message) could not be built from the caller's input.
//!   Never retried; the caller has to fix the input.
//! - **`Connection`**: a transport failure while opening the socket, during the handshake or
//!   while pushing a bundle. Recovered locally by the bounded retry policy.
//! - **`DaemonUnavailable`**: the connect retry budget ran out. Fatal for the caller.
//! - **`DeliveryFailed`**: a message could not be delivered even after one reconnect. The
//!   message is dropped, not queued.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Flat tag for [`ClientError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed message input.
    Validation,
    /// Transport failure during handshake or send.
    Connection,
    /// Connect retry budget exhausted.
    DaemonUnavailable,
    /// Message dropped after the single reconnect attempt.
    DeliveryFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Connection => "connection",
            ErrorKind::DaemonUnavailable => "daemon_unavailable",
            ErrorKind::DeliveryFailed => "delivery_failed",
        };
        write!(f, "{}", label)
    }
}

/// Step of the daemon control protocol an I/O failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolStage {
    /// Opening the transport socket.
    Open,
    /// Reading the daemon banner.
    Greeting,
    /// `protocol extended`
    ProtocolExtended,
    /// `set endpoint <app>`
    SetEndpoint,
    /// `registration list`
    RegistrationList,
    /// `bundle put plain`
    BundlePut,
    /// Writing the plain bundle text.
    BundleBody,
    /// `bundle send`
    BundleSend,
    /// The connection was closed explicitly.
    Closed,
}

impl fmt::Display for ProtocolStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProtocolStage::Open => "open",
            ProtocolStage::Greeting => "greeting",
            ProtocolStage::ProtocolExtended => "protocol extended",
            ProtocolStage::SetEndpoint => "set endpoint",
            ProtocolStage::RegistrationList => "registration list",
            ProtocolStage::BundlePut => "bundle put",
            ProtocolStage::BundleBody => "bundle body",
            ProtocolStage::BundleSend => "bundle send",
            ProtocolStage::Closed => "closed",
        };
        write!(f, "{}", label)
    }
}

/// Errors that can occur when talking to the DTN daemon.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Message construction rejected the input.
    #[error("Invalid message: {reason}")]
    Validation {
        /// What was wrong with the input.
        reason: String,
    },

    /// Transport-level failure (refused, reset, broken pipe, closed stream).
    #[error("Connection to DTN daemon at {address} failed during {stage}: {source}")]
    Connection {
        /// Daemon `host:port`.
        address: String,
        /// Protocol step that failed.
        stage: ProtocolStage,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Every connect attempt in the retry budget failed.
    #[error("DTN daemon at {address} unavailable after {attempts} connection attempts")]
    DaemonUnavailable {
        /// Daemon `host:port`.
        address: String,
        /// Number of attempts made.
        attempts: u32,
        /// Failure of the final attempt.
        #[source]
        last_error: Box<ClientError>,
    },

    /// The message could not be delivered after one reconnect attempt.
    #[error("Bundle delivery to {destination} failed: {reason}")]
    DeliveryFailed {
        /// Destination endpoint of the dropped message.
        destination: String,
        /// Short description of which step gave up.
        reason: String,
        /// Error that ended the delivery.
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Build a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Build a connection error for `address` at `stage`.
    pub fn connection(address: impl Into<String>, stage: ProtocolStage, source: io::Error) -> Self {
        Self::Connection {
            address: address.into(),
            stage,
            source,
        }
    }

    /// Returns the flat tag for this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::DaemonUnavailable { .. } => ErrorKind::DaemonUnavailable,
            Self::DeliveryFailed { .. } => ErrorKind::DeliveryFailed,
        }
    }

    /// Whether the reconnect policy applies to this error.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Connection { stage, .. } if *stage != ProtocolStage::Closed)
    }
}
