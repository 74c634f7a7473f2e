//! One-time remote stream provisioning

use super::client::{lookup_sequence_token, LogStreamClient, LogStreamTarget};
use super::sequence::SequenceTokenManager;
use crate::core::RemoteError;
use tracing::{debug, warn};

/// Makes sure the target group and stream exist before the first delivery.
///
/// Each provisioning step is attempted once. Failures are logged and
/// skipped so a partially provisioned stream never blocks shipping; the
/// delivery path deals with whatever is still wrong.
#[derive(Debug, Clone, Default)]
pub struct StreamInitializer {
    retention_days: Option<u32>,
    initialized: bool,
}

impl StreamInitializer {
    /// `retention_days` of zero or less leaves retention untouched
    pub fn new(retention_days: i64) -> Self {
        Self {
            retention_days: u32::try_from(retention_days).ok().filter(|days| *days > 0),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Provision the stream and seed the sequence token. No-op after the
    /// first call, whatever its outcome.
    pub fn ensure_ready(
        &mut self,
        client: &dyn LogStreamClient,
        target: &LogStreamTarget,
        tokens: &mut SequenceTokenManager,
    ) {
        if self.initialized {
            return;
        }

        log_step("create log group", target, client.create_log_group(&target.group));

        if let Some(days) = self.retention_days {
            log_step(
                "put retention policy",
                target,
                client.put_retention_policy(&target.group, days),
            );
        }

        log_step("create log stream", target, client.create_log_stream(target));

        match lookup_sequence_token(client, target) {
            Ok(token) => tokens.accept(token),
            Err(e) => warn!(stream = %target, error = %e, "could not read initial sequence token"),
        }

        self.initialized = true;
    }
}

fn log_step(step: &str, target: &LogStreamTarget, result: Result<(), RemoteError>) {
    match result {
        Ok(()) => debug!(stream = %target, "{step}: done"),
        Err(RemoteError::ResourceAlreadyExists(_)) => {
            debug!(stream = %target, "{step}: already exists")
        }
        Err(e) => warn!(stream = %target, error = %e, "{step} failed, continuing"),
    }
}
