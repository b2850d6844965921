//! HTTP client utilities.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{ClientConfig, ClientError};

/// Media type requested on every call
pub const ACCEPT_MEDIA_TYPE: &str = "application/vnd.github+json";

/// User agent identifying this crate
pub fn default_user_agent() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
}

/// HTTP client carrying the credential, accept type and user agent on every request
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Build a client for the given configuration
    ///
    /// Certificate verification follows `config.verify_certificates`; the rest of
    /// the client is identical either way.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", config.token.trim()))
            .map_err(|_| {
                ClientError::InvalidRequest(
                    "Credential contains characters that cannot be sent in a header".to_string(),
                )
            })?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_MEDIA_TYPE));

        if !config.verify_certificates {
            tracing::warn!("TLS certificate verification is disabled for {}", config.base_url);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .danger_accept_invalid_certs(!config.verify_certificates)
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }
}
