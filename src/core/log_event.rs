//! Log event structure

use serde::{Deserialize, Serialize};

/// One unit of log output awaiting delivery.
///
/// The message is already fully formatted by the producer and is never
/// inspected by the shipper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "timestamp")]
    timestamp_millis: i64,
    message: String,
}

impl LogEvent {
    pub fn new(timestamp_millis: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp_millis,
            message: message.into(),
        }
    }

    /// Create an event stamped with the current wall clock time
    pub fn now(message: impl Into<String>) -> Self {
        Self::new(chrono::Utc::now().timestamp_millis(), message)
    }

    /// Milliseconds since the Unix epoch
    #[inline]
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}
