//! Remote log stream protocol
//!
//! The shipper talks to an ordered, append-only log service through
//! [`LogStreamClient`]. The operations follow the shape of the CloudWatch
//! Logs API: groups contain streams, and every write to a stream carries
//! the sequence token returned by the previous write.

use crate::core::{LogEvent, RemoteError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The single log stream a shipper delivers to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogStreamTarget {
    pub group: String,
    pub stream: String,
}

impl LogStreamTarget {
    pub fn new(group: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            stream: stream.into(),
        }
    }
}

impl fmt::Display for LogStreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.stream)
    }
}

/// One entry of a `DescribeLogStreams` listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStreamDescription {
    pub name: String,
    /// Token the next write must carry; absent for a stream never written
    pub upload_sequence_token: Option<String>,
}

/// A `PutLogEvents` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutLogEventsRequest<'a> {
    pub target: &'a LogStreamTarget,
    /// Must be sorted by ascending timestamp
    pub events: &'a [LogEvent],
    pub sequence_token: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PutLogEventsResponse {
    pub next_sequence_token: Option<String>,
}

/// Blocking client for the remote log stream service.
///
/// Implementations report failures as typed [`RemoteError`]s so delivery
/// can tell token conflicts apart from transient failures.
pub trait LogStreamClient: Send + Sync {
    /// Create a log group; `ResourceAlreadyExists` if it is already there
    fn create_log_group(&self, group: &str) -> Result<(), RemoteError>;

    fn put_retention_policy(&self, group: &str, days: u32) -> Result<(), RemoteError>;

    /// Create a log stream; `ResourceAlreadyExists` if it is already there
    fn create_log_stream(&self, target: &LogStreamTarget) -> Result<(), RemoteError>;

    /// List streams in `group` whose name starts with `prefix`
    fn describe_log_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> Result<Vec<LogStreamDescription>, RemoteError>;

    fn put_log_events(
        &self,
        request: PutLogEventsRequest<'_>,
    ) -> Result<PutLogEventsResponse, RemoteError>;
}

impl<T: LogStreamClient + ?Sized> LogStreamClient for Arc<T> {
    fn create_log_group(&self, group: &str) -> Result<(), RemoteError> {
        (**self).create_log_group(group)
    }

    fn put_retention_policy(&self, group: &str, days: u32) -> Result<(), RemoteError> {
        (**self).put_retention_policy(group, days)
    }

    fn create_log_stream(&self, target: &LogStreamTarget) -> Result<(), RemoteError> {
        (**self).create_log_stream(target)
    }

    fn describe_log_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> Result<Vec<LogStreamDescription>, RemoteError> {
        (**self).describe_log_streams(group, prefix)
    }

    fn put_log_events(
        &self,
        request: PutLogEventsRequest<'_>,
    ) -> Result<PutLogEventsResponse, RemoteError> {
        (**self).put_log_events(request)
    }
}

/// Look up the current upload token of exactly `target.stream`.
///
/// The service matches by prefix, so the listing is filtered for an exact
/// name. `Ok(None)` covers both a brand-new stream and a stream missing
/// from the listing.
pub fn lookup_sequence_token(
    client: &dyn LogStreamClient,
    target: &LogStreamTarget,
) -> Result<Option<String>, RemoteError> {
    let streams = client.describe_log_streams(&target.group, &target.stream)?;
    Ok(streams
        .into_iter()
        .find(|description| description.name == target.stream)
        .and_then(|description| description.upload_sequence_token))
}
