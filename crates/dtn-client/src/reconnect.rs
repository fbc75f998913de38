//! Bounded reconnect policy and the reconnecting client.
//!
//! The daemon normally runs on the same host, so the expected failure is a daemon restart.
//! Connecting retries a fixed number of times with a fixed interval; sending retries the
//! connection once and then gives up on the message.
//!
//! ```text
//! send(msg) ──deliver──> ok
//!     │
//!  transport error
//!     ▼
//! connect() (up to max_attempts, interval apart) ──fail──> DeliveryFailed
//!     │
//!   ready
//!     ▼
//! deliver(msg) again ──fail──> DeliveryFailed
//!     │
//!     ok
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::bundle;
use crate::config::DaemonConfig;
use crate::connection::{ConnectionState, DaemonConnection};
use crate::error::{ClientError, ProtocolStage, Result};
use crate::message::Message;
use crate::transport::{Connector, TcpConnector};

/// Default number of connect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Default wait between failed connect attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Fixed-interval retry policy for connecting to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total connect attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait between failed attempts.
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_interval() -> Duration {
    DEFAULT_RETRY_INTERVAL
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl RetryPolicy {
    /// Create a policy.
    #[must_use]
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based), or `None` when the budget is spent.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt < self.max_attempts {
            Some(self.interval)
        } else {
            None
        }
    }

    /// Longest time a full connect sequence can spend sleeping.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// Sleep abstraction so retry sequences can run without real delays in tests.
#[async_trait]
pub trait Sleep: Send + Sync {
    /// Wait for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

#[async_trait]
impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Client that keeps a daemon connection alive across daemon restarts.
///
/// Single owner, one operation in flight: every method takes `&mut self` and runs to
/// completion, including retry waits.
pub struct ReconnectingClient<C = TcpConnector, S = TokioSleep> {
    connection: DaemonConnection<C>,
    policy: RetryPolicy,
    sleeper: S,
}

impl ReconnectingClient<TcpConnector, TokioSleep> {
    /// Create a TCP client from configuration. Nothing is opened until [`connect`](Self::connect).
    pub fn new(config: &DaemonConfig) -> Self {
        Self::with_parts(config, TcpConnector, TokioSleep)
    }
}

impl<C: Connector, S: Sleep> ReconnectingClient<C, S> {
    /// Create a client with custom transport and sleep implementations.
    pub fn with_parts(config: &DaemonConfig, connector: C, sleeper: S) -> Self {
        Self {
            connection: DaemonConnection::with_connector(
                config.address(),
                config.app_source.clone(),
                config.destination_eid.clone(),
                connector,
            ),
            policy: config.retry,
            sleeper,
        }
    }

    /// Retry policy in use.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// State of the underlying connection.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// EID assigned by the daemon, once connected.
    #[must_use]
    pub fn source_eid(&self) -> Option<&str> {
        self.connection.source_eid()
    }

    /// Destination endpoint for every bundle.
    #[must_use]
    pub fn destination_eid(&self) -> &str {
        self.connection.destination_eid()
    }

    /// Connect with the bounded retry policy.
    ///
    /// # Errors
    /// [`ClientError::DaemonUnavailable`] after `max_attempts` consecutive failures. No
    /// transport is left open in that case.
    #[instrument(skip(self), fields(address = %self.connection.address()), err)]
    pub async fn connect(&mut self) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let last_error = match self.connection.connect().await {
                Ok(()) => {
                    if attempt > 1 {
                        info!(attempt, "connected to DTN daemon after retrying");
                    }
                    return Ok(());
                }
                Err(e) => e,
            };

            match self.policy.delay_after(attempt) {
                Some(delay) => {
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        retry_in = ?delay,
                        error = %last_error,
                        "DTN daemon connection attempt failed"
                    );
                    self.sleeper.sleep(delay).await;
                }
                None => {
                    error!(attempts = attempt, error = %last_error, "giving up on DTN daemon");
                    self.connection.disconnect().await;
                    return Err(ClientError::DaemonUnavailable {
                        address: self.connection.address().to_string(),
                        attempts: attempt,
                        last_error: Box::new(last_error),
                    });
                }
            }
        }
    }

    /// Deliver one message, reconnecting at most once on transport failure.
    ///
    /// The message is dropped if the reconnect or the resend fails; nothing is queued.
    ///
    /// # Errors
    /// - [`ClientError::Connection`] if the client was explicitly closed.
    /// - [`ClientError::DeliveryFailed`] if delivery failed after the reconnect attempt.
    #[instrument(skip(self, message), fields(custody = message.custody(), bytes = message.payload().len()), err)]
    pub async fn send(&mut self, message: Message) -> Result<()> {
        let first = match self.deliver(&message).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retriable() => e,
            Err(e) => return Err(e),
        };

        warn!(error = %first, "bundle delivery failed, reconnecting to DTN daemon");
        self.connection.disconnect().await;

        if let Err(e) = self.connect().await {
            return Err(self.delivery_failed("reconnect failed", e));
        }

        match self.deliver(&message).await {
            Ok(()) => {
                info!("bundle delivered after reconnect");
                Ok(())
            }
            Err(e) => Err(self.delivery_failed("resend after reconnect failed", e)),
        }
    }

    /// Release the connection. Safe to call repeatedly.
    pub async fn close(&mut self) {
        self.connection.close().await;
    }

    async fn deliver(&mut self, message: &Message) -> Result<()> {
        let source_eid = match self.connection.source_eid() {
            Some(eid) if self.connection.state().is_ready() => eid,
            _ => {
                let stage = if self.connection.state() == ConnectionState::Closed {
                    ProtocolStage::Closed
                } else {
                    ProtocolStage::BundlePut
                };
                return Err(ClientError::connection(
                    self.connection.address().to_string(),
                    stage,
                    std::io::Error::new(std::io::ErrorKind::NotConnected, "not connected to DTN daemon"),
                ));
            }
        };

        let bundle = bundle::encode(
            source_eid,
            self.connection.destination_eid(),
            message.payload(),
            message.custody(),
        );
        self.connection.send_bundle(&bundle).await?;
        info!(destination = %self.connection.destination_eid(), "bundle sent");
        Ok(())
    }

    fn delivery_failed(&self, reason: &str, source: ClientError) -> ClientError {
        error!(reason, error = %source, "dropping message");
        ClientError::DeliveryFailed {
            destination: self.connection.destination_eid().to_string(),
            reason: reason.to_string(),
            source: Box::new(source),
        }
    }
}
