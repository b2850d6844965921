//! Record repository client.
//!
//! [`RepositoryClient`] is the public face of the crate: search, listing,
//! record creation, comments and a connectivity probe. Each operation runs
//! through the instance's own [`QuotaTracker`](crate::quota::QuotaTracker);
//! separate instances never share quota state.
//!
//! Every operation takes `&mut self`, so one instance runs one operation at a
//! time and all throttling waits happen inline on the awaiting task.

mod pages;
mod repository;

pub use repository::RepositoryClient;

use reqwest::StatusCode;
use std::time::Duration;

use crate::models::MAX_PAGE_SIZE;
use crate::quota::QuotaPolicy;
use crate::utils::{default_user_agent, is_secondary_limit};

/// Base URL of the public tracker API
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Cooldown before the single retry after a secondary rate limit
pub const DEFAULT_SECONDARY_COOLDOWN: Duration = Duration::from_secs(60);

/// Longest response body prefix kept in an error
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Construction parameters for a [`RepositoryClient`]
#[derive(Clone)]
pub struct ClientConfig {
    /// API root, without a trailing slash
    pub base_url: String,
    /// Opaque bearer credential
    pub token: String,
    pub user_agent: String,
    /// Set to false to accept any server certificate (intercepting proxies)
    pub verify_certificates: bool,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Records per page, at most [`MAX_PAGE_SIZE`]
    pub page_size: u32,
    pub secondary_cooldown: Duration,
    pub quota_policy: QuotaPolicy,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            user_agent: default_user_agent().to_string(),
            verify_certificates: true,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            page_size: MAX_PAGE_SIZE,
            secondary_cooldown: DEFAULT_SECONDARY_COOLDOWN,
            quota_policy: QuotaPolicy::default(),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn verify_certificates(mut self, verify: bool) -> Self {
        self.verify_certificates = verify;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn secondary_cooldown(mut self, cooldown: Duration) -> Self {
        self.secondary_cooldown = cooldown;
        self
    }

    pub fn quota_policy(mut self, policy: QuotaPolicy) -> Self {
        self.quota_policy = policy;
        self
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("verify_certificates", &self.verify_certificates)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("page_size", &self.page_size)
            .field("secondary_cooldown", &self.secondary_cooldown)
            .field("quota_policy", &self.quota_policy)
            .finish()
    }
}

/// Errors surfaced by client operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Connection failure, timeout or TLS failure; never retried
    #[error("Transport error: {0}")]
    Transport(String),

    /// Credential rejected or lacking permission
    #[error("Authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },

    /// The collection or record does not exist
    #[error("Not found: {body}")]
    NotFound { body: String },

    /// The request was rejected as invalid (422)
    #[error("Validation failed: {body}")]
    Validation { body: String },

    /// The undocumented abuse-detection limit
    #[error("Secondary rate limit ({status}): {body}")]
    SecondaryRateLimit { status: u16, body: String },

    /// The documented hourly allowance is used up
    #[error("Primary quota exhausted ({status}): {body}")]
    QuotaExhausted { status: u16, body: String },

    /// Any other non-success response
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A success response that could not be read
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ClientError {
    /// Classify a non-success response
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let code = status.as_u16();
        let text = truncate_body(body);

        match code {
            401 => ClientError::Auth { status: code, body: text },
            403 | 429 if is_secondary_limit(body) => ClientError::SecondaryRateLimit {
                status: code,
                body: text,
            },
            403 | 429 if body.to_ascii_lowercase().contains("rate limit exceeded") => {
                ClientError::QuotaExhausted { status: code, body: text }
            }
            403 => ClientError::Auth { status: code, body: text },
            429 => ClientError::QuotaExhausted { status: code, body: text },
            404 => ClientError::NotFound { body: text },
            422 => ClientError::Validation { body: text },
            _ => ClientError::Api { status: code, body: text },
        }
    }

    /// HTTP status behind the error, when there was a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Auth { status, .. }
            | ClientError::SecondaryRateLimit { status, .. }
            | ClientError::QuotaExhausted { status, .. }
            | ClientError::Api { status, .. } => Some(*status),
            ClientError::NotFound { .. } => Some(404),
            ClientError::Validation { .. } => Some(422),
            ClientError::Transport(_) | ClientError::InvalidRequest(_) | ClientError::Parse(_) => {
                None
            }
        }
    }

    pub fn is_secondary_rate_limit(&self) -> bool {
        matches!(self, ClientError::SecondaryRateLimit { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
