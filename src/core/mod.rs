//! Core types and traits

pub mod appender;
pub mod batch;
pub mod error;
pub mod log_entry;
pub mod log_event;
pub mod log_level;
pub mod timestamp;

pub use appender::Appender;
pub use batch::Batch;
pub use error::{RemoteError, Result, ShipperError};
pub use log_entry::LogEntry;
pub use log_event::LogEvent;
pub use log_level::LogLevel;
pub use timestamp::TimestampFormat;
