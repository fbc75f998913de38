//! Client library for the IBR-DTN daemon API.
//!
//! Registers an application endpoint with a locally running DTN daemon over its line-based
//! extended protocol, encodes JSON payloads as plain-text bundles and hands them to the daemon
//! for store-and-forward delivery.
//!
//! # Example
//!
//! ```no_run
//! use dtn_client::{DaemonConfig, Message, ReconnectingClient};
//!
//! # async fn run() -> dtn_client::Result<()> {
//! let mut client = ReconnectingClient::new(&DaemonConfig::default());
//! client.connect().await?;
//! client.send(Message::new(r#"{"t":21.5}"#)?).await?;
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod reconnect;
pub mod transport;

pub use config::DaemonConfig;
pub use connection::{ConnectionState, DaemonAddress, DaemonConnection};
pub use error::{ClientError, ErrorKind, ProtocolStage, Result};
pub use message::{Message, DEFAULT_LIFETIME_SECS};
pub use reconnect::{ReconnectingClient, RetryPolicy, Sleep, TokioSleep};
pub use transport::{BoxedStream, CommandChannel, Connector, DaemonStream, TcpConnector};
