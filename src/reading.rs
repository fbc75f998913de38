//! Sensor readings and the payload sent for each one.
//!
//! A [`Reading`] is produced by the sensing side (particulate counter plus the optional
//! temperature/humidity/pressure sensor). Before delivery it is wrapped with the node identity:
//!
//! ```json
//! {
//!   "sensor_node": { "id": "a1b2c3" },
//!   "reading": {
//!     "pm25": 7, "pm10": 12,
//!     "temperature": 21.5, "relative_humidity": 48.2, "pressure": 1012.3,
//!     "collected_at": "2024-05-01T12:30:00-03:00"
//!   }
//! }
//! ```

use chrono::{DateTime, FixedOffset, Local, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One set of sensor values taken together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// PM2.5 concentration (µg/m³)
    pub pm25: f64,
    /// PM10 concentration (µg/m³)
    pub pm10: f64,
    /// Temperature (°C)
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Relative humidity (%)
    #[serde(default)]
    pub relative_humidity: Option<f64>,
    /// Barometric pressure (hPa)
    #[serde(default)]
    pub pressure: Option<f64>,
    /// Local collection time with UTC offset, whole seconds
    #[serde(default = "collected_now")]
    pub collected_at: DateTime<FixedOffset>,
}

impl Reading {
    /// Reading with particulate values only, stamped now.
    pub fn new(pm25: f64, pm10: f64) -> Self {
        Self {
            pm25,
            pm10,
            temperature: None,
            relative_humidity: None,
            pressure: None,
            collected_at: collected_now(),
        }
    }

    /// Attach temperature, humidity and pressure.
    #[must_use]
    pub fn with_environment(mut self, temperature: f64, relative_humidity: f64, pressure: f64) -> Self {
        self.temperature = Some(temperature);
        self.relative_humidity = Some(relative_humidity);
        self.pressure = Some(pressure);
        self
    }
}

/// Current local time with its UTC offset, truncated to the second.
pub fn collected_now() -> DateTime<FixedOffset> {
    let now = Local::now().fixed_offset();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Wrap a reading with the node identity.
pub fn node_payload(node_id: &str, reading: &Reading) -> serde_json::Result<Value> {
    Ok(json!({
        "sensor_node": { "id": node_id },
        "reading": serde_json::to_value(reading)?,
    }))
}
