//! Log shipping to a remote, ordered log stream

pub mod appender;
pub mod buffer;
pub mod client;
pub mod config;
pub mod fallback;
pub mod handler;
pub mod initializer;
pub mod memory;
pub mod retry;
pub mod sequence;
pub mod trigger;

pub use buffer::EventBuffer;
pub use client::{
    lookup_sequence_token, LogStreamClient, LogStreamDescription, LogStreamTarget,
    PutLogEventsRequest, PutLogEventsResponse,
};
pub use config::{Provider, ShipperConfig};
pub use fallback::FallbackSpiller;
pub use handler::{CloudWatchHandler, CloudWatchHandlerBuilder, DEFAULT_SHUTDOWN_TIMEOUT};
pub use initializer::StreamInitializer;
pub use memory::InMemoryLogService;
pub use retry::{DeliveryOutcome, DeliveryRetrier, RetryPolicy};
pub use sequence::SequenceTokenManager;
pub use trigger::FlushTrigger;
