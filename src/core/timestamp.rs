//! Timestamp formatting utilities
//!
//! Events carry epoch milliseconds; these helpers render them for the
//! local fallback file and for structured messages.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp format options for rendered output
///
/// # Examples
///
/// ```
/// use rust_log_shipper::core::TimestampFormat;
///
/// let format = TimestampFormat::Iso8601;
/// assert_eq!(format.format_millis(0), "1970-01-01T00:00:00.000Z");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// ISO 8601 in UTC with milliseconds: `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// ISO 8601 in local time, second precision, with offset:
    /// `2025-01-08T11:30:45+01:00`
    ///
    /// Used for fallback records.
    LocalSeconds,

    /// Unix timestamp in milliseconds: `1736332245123`
    UnixMillis,

    /// Custom strftime format, rendered in UTC
    Custom(String),
}

impl TimestampFormat {
    /// Format epoch milliseconds according to this format
    ///
    /// Values outside chrono's representable range are rendered as the raw
    /// millisecond count.
    #[must_use]
    pub fn format_millis(&self, millis: i64) -> String {
        let Some(datetime) = DateTime::<Utc>::from_timestamp_millis(millis) else {
            return millis.to_string();
        };
        self.format(&datetime)
    }

    /// Format a `DateTime<Utc>` according to this format
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampFormat::LocalSeconds => datetime
                .with_timezone(&Local)
                .format("%Y-%m-%dT%H:%M:%S%:z")
                .to_string(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(format_str) => datetime.format(format_str).to_string(),
        }
    }
}
