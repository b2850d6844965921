//! Primary quota tracking and throttling.
//!
//! The tracker keeps the last observed [`QuotaState`] per [`QuotaResource`],
//! fed either from response headers or from the status endpoint, and turns the
//! remaining allowance into a wait before the next request.
//!
//! # Policy
//!
//! The wait is a monotonic step function of the remaining count. The
//! thresholds are policy constants, not values derived from any published
//! limit, and can be tuned through [`QuotaPolicy`]:
//!
//! | remaining            | wait                                              |
//! |----------------------|---------------------------------------------------|
//! | `< critical` (5)     | until the reset time plus a 5 s buffer            |
//! | `< low` (20)         | time to reset / remaining, clamped to 2 s..=30 s  |
//! | `< moderate` (100)   | 2 s                                               |
//! | otherwise            | none                                              |
//!
//! Every wait is capped at [`QuotaPolicy::max_wait`] (1 h by default). A
//! resource that has never been observed is treated as having plenty left.
//! When an observation fails (status call error, headers absent) the tracker
//! falls back to [`QuotaPolicy::fallback_delay`] until the next good reading.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::time::Duration;

use crate::models::{QuotaResource, QuotaState};
use crate::utils::extract::{int_field, object_field};

const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";
const LIMIT_HEADER: &str = "x-ratelimit-limit";
const RESOURCE_HEADER: &str = "x-ratelimit-resource";

/// Thresholds and delays that drive throttling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    /// Below this many requests, wait for the window to reset
    pub critical_threshold: u64,
    /// Below this many requests, spread the rest evenly over the window
    pub low_threshold: u64,
    /// Below this many requests, pause briefly between calls
    pub moderate_threshold: u64,
    /// Added to the reset time in the critical band
    pub reset_buffer: Duration,
    /// Upper bound of the evenly-spread wait in the low band
    pub low_ceiling: Duration,
    /// Pause in the moderate band, also the floor of the low band
    pub moderate_delay: Duration,
    /// Pause when the quota could not be determined
    pub fallback_delay: Duration,
    /// Longest single wait the tracker will ever impose
    pub max_wait: Duration,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            critical_threshold: 5,
            low_threshold: 20,
            moderate_threshold: 100,
            reset_buffer: Duration::from_secs(5),
            low_ceiling: Duration::from_secs(30),
            moderate_delay: Duration::from_secs(2),
            fallback_delay: Duration::from_secs(1),
            max_wait: Duration::from_secs(60 * 60),
        }
    }
}

impl QuotaPolicy {
    /// Set the band thresholds
    pub fn thresholds(mut self, critical: u64, low: u64, moderate: u64) -> Self {
        self.critical_threshold = critical;
        self.low_threshold = low;
        self.moderate_threshold = moderate;
        self
    }

    /// Set the fallback delay
    pub fn fallback_delay(mut self, delay: Duration) -> Self {
        self.fallback_delay = delay;
        self
    }

    /// Set the moderate-band delay
    pub fn moderate_delay(mut self, delay: Duration) -> Self {
        self.moderate_delay = delay;
        self
    }

    /// Set the maximum single wait
    pub fn max_wait(mut self, max: Duration) -> Self {
        self.max_wait = max;
        self
    }

    /// Wait owed before the next request charged to `state`'s resource
    pub fn wait_for(&self, state: &QuotaState, now: DateTime<Utc>) -> Duration {
        let until_reset = (state.reset_at - now).to_std().unwrap_or(Duration::ZERO);
        let remaining = state.remaining;

        let wait = if remaining < self.critical_threshold {
            until_reset + self.reset_buffer
        } else if remaining < self.low_threshold {
            let divisor = u32::try_from(remaining.max(1)).unwrap_or(u32::MAX);
            (until_reset / divisor)
                .min(self.low_ceiling)
                .max(self.moderate_delay)
        } else if remaining < self.moderate_threshold {
            self.moderate_delay
        } else {
            Duration::ZERO
        };

        wait.min(self.max_wait)
    }
}

/// Per-client record of the primary quota
#[derive(Debug, Clone)]
pub struct QuotaTracker {
    policy: QuotaPolicy,
    states: HashMap<QuotaResource, QuotaState>,
    degraded: bool,
}

impl QuotaTracker {
    pub fn new(policy: QuotaPolicy) -> Self {
        Self {
            policy,
            states: HashMap::new(),
            degraded: false,
        }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Last observation for a resource
    pub fn state(&self, resource: QuotaResource) -> Option<&QuotaState> {
        self.states.get(&resource)
    }

    /// Whether the last observation attempt failed
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Record the quota headers of a response
    ///
    /// Returns the resource that was updated, or `None` when the headers are
    /// absent or unreadable, in which case throttling falls back to the
    /// conservative delay.
    pub fn observe_headers(&mut self, headers: &HeaderMap) -> Option<QuotaResource> {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        let parsed = header(REMAINING_HEADER)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .zip(header(RESET_HEADER).and_then(|v| v.trim().parse::<i64>().ok()));

        let Some((remaining, reset)) = parsed else {
            tracing::debug!("Response carried no usable quota headers");
            self.degraded = true;
            return None;
        };

        let resource_name = header(RESOURCE_HEADER).unwrap_or("core");
        let Some(resource) = QuotaResource::from_name(resource_name) else {
            tracing::debug!("Ignoring quota headers for untracked resource '{}'", resource_name);
            return None;
        };

        let Some(mut state) = QuotaState::from_epoch(resource, remaining, reset) else {
            self.degraded = true;
            return None;
        };
        if let Some(limit) = header(LIMIT_HEADER).and_then(|v| v.trim().parse().ok()) {
            state = state.with_limit(limit);
        }

        self.record(state);
        Some(resource)
    }

    /// Record both resources from a status endpoint body
    ///
    /// Returns how many resources were updated; zero marks the tracker degraded.
    pub fn observe_status(&mut self, body: &str) -> usize {
        let mut observed = 0;

        if let Some(resources) = object_field(body, "resources") {
            for resource in [QuotaResource::Core, QuotaResource::Search] {
                let state = object_field(resources, resource.name()).and_then(|entry| {
                    let remaining = int_field(entry, "remaining")?;
                    let reset = i64::try_from(int_field(entry, "reset")?).ok()?;
                    let state = QuotaState::from_epoch(resource, remaining, reset)?;
                    Some(match int_field(entry, "limit") {
                        Some(limit) => state.with_limit(limit),
                        None => state,
                    })
                });

                if let Some(state) = state {
                    self.record(state);
                    observed += 1;
                }
            }
        }

        if observed == 0 {
            tracing::warn!("Quota status response did not contain usable resource data");
            self.degraded = true;
        }
        observed
    }

    /// Note that the quota could not be determined
    pub fn mark_unavailable(&mut self) {
        self.degraded = true;
    }

    /// Wait owed before a request charged to `resource`
    ///
    /// While degraded, a stored observation may be stale, so the wait is never
    /// shorter than the fallback delay.
    pub fn planned_wait(&self, resource: QuotaResource, now: DateTime<Utc>) -> Duration {
        let observed = self
            .states
            .get(&resource)
            .map(|state| self.policy.wait_for(state, now))
            .unwrap_or(Duration::ZERO);

        if self.degraded {
            observed.max(self.policy.fallback_delay)
        } else {
            observed
        }
    }

    /// Sleep on the calling task for as long as the quota requires
    pub async fn throttle_if_needed(&self, resource: QuotaResource) {
        let wait = self.planned_wait(resource, Utc::now());
        if wait.is_zero() {
            return;
        }

        match self.states.get(&resource) {
            _ if self.degraded && wait == self.policy.fallback_delay => {
                tracing::debug!("{} quota not confirmed, pausing {:?}", resource, wait)
            }
            Some(state) if state.remaining < self.policy.critical_threshold => tracing::warn!(
                "{} quota nearly exhausted ({} left), waiting {:?} for reset",
                resource,
                state.remaining,
                wait
            ),
            Some(state) => tracing::info!(
                "{} quota at {} remaining, pausing {:?}",
                resource,
                state.remaining,
                wait
            ),
            None => tracing::debug!("{} quota unknown, pausing {:?}", resource, wait),
        }

        tokio::time::sleep(wait).await;
    }

    fn record(&mut self, state: QuotaState) {
        tracing::debug!(
            "Observed {} quota: {} remaining, resets at {}",
            state.resource,
            state.remaining,
            state.reset_at
        );
        self.degraded = false;
        self.states.insert(state.resource, state);
    }
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new(QuotaPolicy::default())
    }
}
