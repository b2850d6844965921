//! Primary quota observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The quota bucket a request is charged against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaResource {
    /// Every non-search endpoint
    Core,
    /// The search endpoints, which have their own, smaller allowance
    Search,
}

impl QuotaResource {
    /// Parse the resource name the remote system reports in its headers
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "core" => Some(QuotaResource::Core),
            "search" => Some(QuotaResource::Search),
            _ => None,
        }
    }

    /// Name used by the remote system for this resource
    pub fn name(&self) -> &'static str {
        match self {
            QuotaResource::Core => "core",
            QuotaResource::Search => "search",
        }
    }
}

impl std::fmt::Display for QuotaResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Last observed state of one quota resource
///
/// A fresher observation always replaces an older one; there is no merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    pub resource: QuotaResource,

    /// Requests left in the current window
    pub remaining: u64,

    /// Window size, when the remote system reports it
    pub limit: Option<u64>,

    /// When the window resets
    pub reset_at: DateTime<Utc>,
}

impl QuotaState {
    pub fn new(resource: QuotaResource, remaining: u64, reset_at: DateTime<Utc>) -> Self {
        Self {
            resource,
            remaining,
            limit: None,
            reset_at,
        }
    }

    /// Build from the epoch-seconds reset value the remote system reports
    pub fn from_epoch(resource: QuotaResource, remaining: u64, reset_epoch: i64) -> Option<Self> {
        DateTime::from_timestamp(reset_epoch, 0).map(|reset_at| Self::new(resource, remaining, reset_at))
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}
