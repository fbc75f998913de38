//! Daemon client configuration.
//!
//! Values only; loading them (files, environment) is up to the application.
//!
//! ```toml
//! host = "localhost"
//! port = 4550
//! app_source = "data_sender"
//! destination_eid = "dtn://aqs.uea.edu.dtn/broker"
//!
//! [retry]
//! max_attempts = 20
//! interval = "30s"
//! ```

use serde::{Deserialize, Serialize};

use crate::connection::{DaemonAddress, DEFAULT_DAEMON_HOST, DEFAULT_DAEMON_PORT};
use crate::reconnect::RetryPolicy;

/// Default application name registered with the daemon.
pub const DEFAULT_APP_SOURCE: &str = "data_sender";

/// Default destination endpoint (the broker node).
pub const DEFAULT_DESTINATION_EID: &str = "dtn://aqs.uea.edu.dtn/broker";

/// Connection settings for [`ReconnectingClient`](crate::ReconnectingClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Daemon API host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Daemon API port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Application name, appended by the daemon to the node EID.
    #[serde(default = "default_app_source")]
    pub app_source: String,
    /// Endpoint every bundle is addressed to.
    #[serde(default = "default_destination_eid")]
    pub destination_eid: String,
    /// Connect retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_host() -> String {
    DEFAULT_DAEMON_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_DAEMON_PORT
}

fn default_app_source() -> String {
    DEFAULT_APP_SOURCE.to_string()
}

fn default_destination_eid() -> String {
    DEFAULT_DESTINATION_EID.to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            app_source: default_app_source(),
            destination_eid: default_destination_eid(),
            retry: RetryPolicy::default(),
        }
    }
}

impl DaemonConfig {
    /// Daemon address built from `host` and `port`.
    #[must_use]
    pub fn address(&self) -> DaemonAddress {
        DaemonAddress::new(self.host.clone(), self.port)
    }

    /// Validate semantic constraints after loading.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("daemon host must not be empty".to_string());
        }
        if self.port == 0 {
            return Err("daemon port must be non-zero".to_string());
        }
        if self.app_source.trim().is_empty() || self.app_source.contains(char::is_whitespace) {
            return Err(format!(
                "app_source '{}' must be a non-empty name without whitespace",
                self.app_source
            ));
        }
        if !self.destination_eid.contains("://") {
            return Err(format!(
                "destination_eid '{}' is not an endpoint identifier",
                self.destination_eid
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}
