//! # Rust Log Shipper
//!
//! Resilient shipping of log events to an ordered, append-only remote log
//! stream such as CloudWatch Logs.
//!
//! ## Features
//!
//! - **Batching**: Flush by size or elapsed time, whichever comes first
//! - **Ordering**: Batches are time-sorted and delivered one at a time
//! - **Sequence Tokens**: Stale-token conflicts are repaired automatically
//! - **Retries**: Linear backoff for throttling and transport failures
//! - **Fallback**: Undeliverable batches are spilled to a local file
//! - **Non-blocking**: Producers never wait on the network

pub mod core;
pub mod shipper;

pub mod prelude {
    pub use crate::core::{
        Appender, Batch, LogEntry, LogEvent, LogLevel, RemoteError, Result, ShipperError,
        TimestampFormat,
    };
    pub use crate::shipper::{
        CloudWatchHandler, CloudWatchHandlerBuilder, FallbackSpiller, FlushTrigger,
        InMemoryLogService, LogStreamClient, LogStreamTarget, Provider, RetryPolicy,
        ShipperConfig, DEFAULT_SHUTDOWN_TIMEOUT,
    };
}

pub use core::{
    Appender, Batch, LogEntry, LogEvent, LogLevel, RemoteError, Result, ShipperError,
    TimestampFormat,
};
pub use shipper::{
    CloudWatchHandler, CloudWatchHandlerBuilder, InMemoryLogService, LogStreamClient,
    LogStreamTarget, Provider, RetryPolicy, ShipperConfig, DEFAULT_SHUTDOWN_TIMEOUT,
};
