//! Seam between a logging front end and the shipper

use super::{error::Result, log_entry::LogEntry};

/// Destination for structured entries.
///
/// `append` hands an entry over for delivery; it must not wait on the
/// network. `flush` pushes out whatever has been handed over so far.
pub trait Appender: Send + Sync {
    fn append(&mut self, entry: &LogEntry) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    /// Short identifier used in diagnostics
    fn name(&self) -> &str;
}
