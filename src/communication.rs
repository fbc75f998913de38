//! Communication module: the node's single entry point to DTN delivery.
//!
//! Wraps a [`ReconnectingClient`] and applies the configured message defaults (custody flag,
//! bundle lifetime) so the sensing side only deals in JSON payloads.

use dtn_client::{
    ClientError, ConnectionState, Connector, Message, ReconnectingClient, Sleep, TcpConnector,
    TokioSleep,
};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::NodeConfig;
use crate::error::NodeResult;

/// DTN delivery for the sensor node.
pub struct CommunicationModule<C = TcpConnector, S = TokioSleep> {
    client: ReconnectingClient<C, S>,
    default_custody: bool,
    default_lifetime_secs: u64,
}

impl CommunicationModule<TcpConnector, TokioSleep> {
    /// Build the module from node configuration. Does not connect.
    pub fn new(config: &NodeConfig) -> Self {
        Self::with_client(config, ReconnectingClient::new(&config.daemon))
    }
}

impl<C: Connector, S: Sleep> CommunicationModule<C, S> {
    /// Build the module around an existing client.
    pub fn with_client(config: &NodeConfig, client: ReconnectingClient<C, S>) -> Self {
        Self {
            client,
            default_custody: config.communication.default_custody,
            default_lifetime_secs: config.communication.default_lifetime_secs,
        }
    }

    /// Connect to the daemon with the bounded retry policy.
    pub async fn connect(&mut self) -> NodeResult<()> {
        self.client.connect().await?;
        Ok(())
    }

    /// Build a message from a JSON payload using the configured defaults.
    pub fn generate_message(&self, payload: &Value) -> NodeResult<Message> {
        let message = Message::from_value(payload, self.default_custody, self.default_lifetime_secs)?;
        debug!(bytes = message.payload().len(), custody = message.custody(), "message generated");
        Ok(message)
    }

    /// Build a message from JSON text, overriding the configured defaults where given.
    ///
    /// `custody: Some(false)` turns custody off even when the node default requests it.
    pub fn text_message(
        &self,
        payload: impl Into<String>,
        custody: Option<bool>,
        lifetime_secs: Option<u64>,
    ) -> NodeResult<Message> {
        let custody = custody.unwrap_or(self.default_custody);
        let lifetime_secs = lifetime_secs.unwrap_or(self.default_lifetime_secs);
        let lifetime = i64::try_from(lifetime_secs)
            .map_err(|_| ClientError::validation(format!("lifetime {} out of range", lifetime_secs)))?;
        Ok(Message::with_options(payload, custody, lifetime)?)
    }

    /// Deliver a message; see [`ReconnectingClient::send`] for the retry contract.
    #[instrument(skip_all)]
    pub async fn send_message(&mut self, message: Message) -> NodeResult<()> {
        self.client.send(message).await?;
        Ok(())
    }

    /// Close the daemon connection. Safe to call repeatedly.
    pub async fn close_connections(&mut self) {
        self.client.close().await;
    }

    /// Current daemon connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    /// Custody flag applied to generated messages.
    #[must_use]
    pub fn default_custody(&self) -> bool {
        self.default_custody
    }
}
