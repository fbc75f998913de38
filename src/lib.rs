//! # Sensor Node
//!
//! Delivers environmental sensor readings as DTN bundles through the local IBR-DTN daemon.
//! The daemon protocol itself lives in the `dtn_client` crate; this crate adds what a node
//! needs around it.
//!
//! ## Crate Structure
//!
//! - **`config`**: layered node configuration (defaults, TOML file, `SENSOR_NODE_*` environment).
//! - **`communication`**: `CommunicationModule`, the wrapper the sensing side hands payloads to.
//! - **`reading`**: the `Reading` model and the per-node payload envelope.
//! - **`relay`**: streaming newline-delimited readings to the daemon.
//! - **`telemetry`**: `tracing-subscriber` initialisation.
//! - **`error`**: `NodeError`, the application error type.

pub mod communication;
pub mod config;
pub mod error;
pub mod reading;
pub mod relay;
pub mod telemetry;

pub use communication::CommunicationModule;
pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use reading::{node_payload, Reading};
pub use relay::{relay_readings, RelayStats};
