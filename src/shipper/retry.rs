//! Bounded delivery with error-class aware retries
//!
//! Two failure classes are retried differently:
//!
//! - **Token conflicts** (`InvalidSequenceToken`, `DataAlreadyAccepted`):
//!   the stored token is refreshed from the service and the call is retried
//!   straight away.
//! - **Everything else** (throttling, transport, service errors): the next
//!   attempt waits `base_delay * attempt`.
//!
//! Both classes draw from the same attempt budget.

use super::client::{LogStreamClient, LogStreamTarget, PutLogEventsRequest};
use super::sequence::SequenceTokenManager;
use crate::core::{Batch, RemoteError};
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt budget and linear backoff base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);

    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Same attempt budget with a different backoff base
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_BASE_DELAY)
    }
}

/// Result of delivering one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Exhausted { attempts: u32, last_error: RemoteError },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts } | DeliveryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryRetrier {
    policy: RetryPolicy,
}

impl DeliveryRetrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `batch`, attaching the current sequence token when there is one.
    ///
    /// Never fails the caller: an exhausted budget is reported as
    /// [`DeliveryOutcome::Exhausted`] and the caller decides what to do with
    /// the batch.
    pub fn deliver(
        &self,
        client: &dyn LogStreamClient,
        target: &LogStreamTarget,
        tokens: &mut SequenceTokenManager,
        batch: &Batch,
    ) -> DeliveryOutcome {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let request = PutLogEventsRequest {
                target,
                events: batch.events(),
                sequence_token: tokens.current(),
            };

            let error = match client.put_log_events(request) {
                Ok(response) => {
                    tokens.accept(response.next_sequence_token);
                    debug!(stream = %target, events = batch.len(), attempt, "batch delivered");
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Err(e) => e,
            };

            let last_attempt = attempt >= self.policy.max_attempts;

            if error.is_token_conflict() {
                warn!(stream = %target, attempt, code = error.code(), "sequence token conflict, refreshing");
                tokens.refresh(client, target);
            } else if !last_attempt {
                let delay = self.policy.backoff(attempt);
                warn!(stream = %target, attempt, error = %error, ?delay, "delivery failed, backing off");
                std::thread::sleep(delay);
            }

            if last_attempt {
                return DeliveryOutcome::Exhausted {
                    attempts: attempt,
                    last_error: error,
                };
            }
        }
    }
}
