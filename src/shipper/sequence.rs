//! Sequence token tracking
//!
//! Every write to a remote stream must carry the token handed back by the
//! previous write. The token is opaque: it is stored, attached and replaced,
//! never parsed.

use super::client::{lookup_sequence_token, LogStreamClient, LogStreamTarget};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceTokenManager {
    token: Option<String>,
}

impl SequenceTokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to attach to the next write, if any
    pub fn current(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Store the token returned by a successful write
    pub fn accept(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Re-read the stream's token from the service.
    ///
    /// A failed lookup or a stream missing from the listing clears the
    /// stored token, so the next write goes out without one.
    pub fn refresh(&mut self, client: &dyn LogStreamClient, target: &LogStreamTarget) {
        self.token = match lookup_sequence_token(client, target) {
            Ok(token) => {
                debug!(stream = %target, has_token = token.is_some(), "refreshed sequence token");
                token
            }
            Err(e) => {
                warn!(stream = %target, error = %e, "sequence token lookup failed, clearing token");
                None
            }
        };
    }
}
