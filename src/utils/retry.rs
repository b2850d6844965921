//! Bounded retry for the secondary rate limit.
//!
//! The secondary limit is an undocumented, short-window abuse guard that the
//! remote system signals only through the response body. A mutating call that
//! trips it is retried exactly once after a fixed cooldown; the limit of one
//! retry is fixed, not configurable.

use std::time::Duration;
use tokio::time::sleep;

use crate::client::ClientError;

/// Phrase the remote system puts in secondary-limit rejections
pub const SECONDARY_LIMIT_PHRASE: &str = "secondary rate limit";

/// Retries allowed per mutating call
pub const MAX_SECONDARY_RETRIES: u8 = 1;

/// Whether a rejection body carries the secondary-limit signature
pub fn is_secondary_limit(body: &str) -> bool {
    body.to_ascii_lowercase().contains(SECONDARY_LIMIT_PHRASE)
}

/// Retry bookkeeping for a single mutating call
#[derive(Debug, Clone)]
pub struct RetryContext {
    attempts_made: u8,
    cooldown: Duration,
}

impl RetryContext {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            attempts_made: 0,
            cooldown,
        }
    }

    /// Retries issued so far
    pub fn attempts_made(&self) -> u8 {
        self.attempts_made
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Decide whether the failed attempt should be issued again
    ///
    /// Returns true, after sleeping the cooldown, only for a secondary-limit
    /// rejection while the retry is still unused. Every other error, and a
    /// second secondary-limit rejection, must be surfaced.
    pub async fn should_retry(&mut self, error: &ClientError) -> bool {
        if !error.is_secondary_rate_limit() {
            return false;
        }

        if self.attempts_made >= MAX_SECONDARY_RETRIES {
            tracing::warn!(
                "Secondary rate limit persisted after {} retry, giving up",
                self.attempts_made
            );
            return false;
        }

        self.attempts_made += 1;
        tracing::warn!(
            "Secondary rate limit hit, retrying once after {:?}",
            self.cooldown
        );
        sleep(self.cooldown).await;
        true
    }
}
