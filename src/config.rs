//! Sensor node configuration using Figment.
//!
//! Configuration is layered, later sources winning:
//! 1. built-in defaults
//! 2. `config/sensor_node.toml` (or the file passed with `--config`)
//! 3. environment variables prefixed `SENSOR_NODE_`, nested keys split on `__`
//!    (e.g. `SENSOR_NODE_DAEMON__PORT=4551`, `SENSOR_NODE_NODE__ID=node-7`)
//!
//! # Example
//! ```no_run
//! use sensor_node::config::NodeConfig;
//!
//! let config = NodeConfig::load()?;
//! println!("Daemon: {}", config.daemon.address());
//! # Ok::<(), sensor_node::error::NodeError>(())
//! ```

use std::path::Path;

use dtn_client::{DaemonConfig, DEFAULT_LIFETIME_SECS};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{NodeError, NodeResult};
use crate::telemetry::OutputFormat;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/sensor_node.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SENSOR_NODE_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node identity and logging
    #[serde(default)]
    pub node: NodeSettings,
    /// DTN daemon connection
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Message defaults
    #[serde(default)]
    pub communication: CommunicationSettings,
}

/// Node identity and logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Sensor node identifier placed in every payload
    #[serde(default)]
    pub id: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: OutputFormat,
    /// Emit span close events with timing (connect, send)
    #[serde(default)]
    pub log_span_events: bool,
    /// Include source file and line in log lines
    #[serde(default)]
    pub log_source_location: bool,
}

/// Defaults applied to generated messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationSettings {
    /// Request custody transfer for every bundle
    #[serde(default)]
    pub default_custody: bool,
    /// Bundle lifetime in seconds
    #[serde(default = "default_lifetime")]
    pub default_lifetime_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_lifetime() -> u64 {
    DEFAULT_LIFETIME_SECS
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            id: String::new(),
            log_level: default_log_level(),
            log_format: OutputFormat::default(),
            log_span_events: false,
            log_source_location: false,
        }
    }
}

impl Default for CommunicationSettings {
    fn default() -> Self {
        Self {
            default_custody: false,
            default_lifetime_secs: default_lifetime(),
        }
    }
}

impl NodeConfig {
    /// Load from the default file and environment, then validate
    pub fn load() -> NodeResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file and environment, then validate
    pub fn load_from<P: AsRef<Path>>(path: P) -> NodeResult<Self> {
        let config: Self = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Layered configuration sources, without extraction
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> NodeResult<()> {
        if self.node.id.trim().is_empty() {
            return Err(NodeError::Configuration(
                "node.id must be provided (SENSOR_NODE_NODE__ID)".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.node.log_level.to_lowercase().as_str()) {
            return Err(NodeError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.node.log_level,
                valid_levels.join(", ")
            )));
        }

        if i64::try_from(self.communication.default_lifetime_secs).is_err() {
            return Err(NodeError::Configuration(format!(
                "default_lifetime_secs {} is out of range",
                self.communication.default_lifetime_secs
            )));
        }

        self.daemon.validate().map_err(NodeError::Configuration)
    }
}
