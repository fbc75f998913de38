//! Deliverable message value.
//!
//! A [`Message`] is validated once, at construction: the payload must parse as JSON and the
//! lifetime must be a non-negative whole number of seconds. Sending never re-validates.

use serde::de::IgnoredAny;

use crate::error::{ClientError, Result};

/// Default bundle lifetime: one week.
pub const DEFAULT_LIFETIME_SECS: u64 = 7 * 24 * 60 * 60;

/// One unit handed to the client for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: String,
    custody: bool,
    lifetime_secs: u64,
}

impl Message {
    /// Create a message with no custody transfer and the default lifetime.
    ///
    /// # Errors
    /// Returns [`ClientError::Validation`] if `payload` is not valid JSON text.
    pub fn new(payload: impl Into<String>) -> Result<Self> {
        Self::with_options(payload, false, DEFAULT_LIFETIME_SECS as i64)
    }

    /// Create a message with explicit custody flag and lifetime.
    ///
    /// # Errors
    /// Returns [`ClientError::Validation`] if `payload` is not valid JSON text or
    /// `lifetime_secs` is negative.
    pub fn with_options(payload: impl Into<String>, custody: bool, lifetime_secs: i64) -> Result<Self> {
        let payload = payload.into();
        validate_json(&payload)?;
        let lifetime_secs = u64::try_from(lifetime_secs).map_err(|_| {
            ClientError::validation(format!(
                "lifetime must be a non-negative number of seconds, got {}",
                lifetime_secs
            ))
        })?;

        Ok(Self {
            payload,
            custody,
            lifetime_secs,
        })
    }

    /// Serialize a JSON value into a message payload.
    pub fn from_value(value: &serde_json::Value, custody: bool, lifetime_secs: u64) -> Result<Self> {
        let payload = serde_json::to_string(value)
            .map_err(|e| ClientError::validation(format!("payload serialization failed: {}", e)))?;
        let lifetime_secs = i64::try_from(lifetime_secs)
            .map_err(|_| ClientError::validation(format!("lifetime {} out of range", lifetime_secs)))?;
        Self::with_options(payload, custody, lifetime_secs)
    }

    /// JSON payload text.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Whether custody transfer is requested.
    #[must_use]
    pub fn custody(&self) -> bool {
        self.custody
    }

    /// Lifetime in seconds.
    #[must_use]
    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime_secs
    }
}

/// Parse a lifetime given as text (CLI flag, config string).
///
/// Only whole, non-negative decimal numbers are accepted; `"1.5"` and `"-3"` are rejected.
pub fn parse_lifetime(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let secs = trimmed.parse::<i64>().map_err(|_| {
        ClientError::validation(format!("lifetime must be an integer number of seconds, got '{}'", trimmed))
    })?;
    u64::try_from(secs).map_err(|_| {
        ClientError::validation(format!(
            "lifetime must be a non-negative number of seconds, got {}",
            secs
        ))
    })
}

fn validate_json(payload: &str) -> Result<()> {
    serde_json::from_str::<IgnoredAny>(payload)
        .map(|_| ())
        .map_err(|e| ClientError::validation(format!("payload must be a JSON string: {}", e)))
}
