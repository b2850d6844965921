//! The record repository client.

use reqwest::RequestBuilder;
use serde_json::json;
use std::time::Duration;

use crate::client::pages::{ListingPages, SearchPages};
use crate::client::{ClientConfig, ClientError};
use crate::models::{QueryCandidates, QuotaResource, QuotaState, Record};
use crate::quota::QuotaTracker;
use crate::search::{collect_pages, search_candidates};
use crate::utils::extract::{record_from_object, string_field};
use crate::utils::{HttpClient, RetryContext};

/// Client for one remote tracker account
///
/// Owns its quota state exclusively. Create one instance per worker; instances
/// do not coordinate their throttling.
#[derive(Debug)]
pub struct RepositoryClient {
    http: HttpClient,
    base_url: String,
    page_size: u32,
    secondary_cooldown: Duration,
    quota: QuotaTracker,
}

impl RepositoryClient {
    /// Create a client; fails on an empty credential
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.token.trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "Credential must not be empty".to_string(),
            ));
        }

        let http = HttpClient::new(&config)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            secondary_cooldown: config.secondary_cooldown,
            quota: QuotaTracker::new(config.quota_policy),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Copy of the last quota observation for a resource
    pub fn quota(&self, resource: QuotaResource) -> Option<QuotaState> {
        self.quota.state(resource).cloned()
    }

    /// Search with ordered fallback candidates
    ///
    /// Returns the records of the first candidate that matches anything, or an
    /// empty list when none does.
    pub async fn search(&mut self, candidates: &QueryCandidates) -> Result<Vec<Record>, ClientError> {
        let page_size = self.page_size;
        let mut pages = SearchPages { client: self };
        search_candidates(&mut pages, candidates, page_size).await
    }

    /// Every open record of a collection carrying all of `labels`
    pub async fn list(&mut self, collection: &str, labels: &[String]) -> Result<Vec<Record>, ClientError> {
        validate_collection(collection)?;

        let page_size = self.page_size;
        let filter = labels.join(",");
        let mut pages = ListingPages {
            client: self,
            collection,
        };
        collect_pages(&mut pages, &filter, page_size).await
    }

    /// Create a record and return it as the remote system stored it
    pub async fn create(
        &mut self,
        collection: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<Record, ClientError> {
        validate_collection(collection)?;
        if title.trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "Record title must not be empty".to_string(),
            ));
        }

        let url = format!("{}/repos/{}/issues", self.base_url, collection);
        let payload = json!({
            "title": title,
            "body": body,
            "labels": labels,
        });

        let response = self.post_with_retry(&url, &payload).await?;
        let record = record_from_object(&response)
            .map_err(|e| ClientError::Parse(format!("Created record could not be read: {}", e)))?;

        tracing::info!("Created {}", record);
        Ok(record)
    }

    /// Add a comment to an existing record
    pub async fn append_comment(
        &mut self,
        collection: &str,
        record_id: u64,
        text: &str,
    ) -> Result<(), ClientError> {
        validate_collection(collection)?;

        let url = format!(
            "{}/repos/{}/issues/{}/comments",
            self.base_url, collection, record_id
        );
        let payload = json!({ "body": text });

        self.post_with_retry(&url, &payload).await?;
        tracing::info!("Commented on #{} in {}", record_id, collection);
        Ok(())
    }

    /// Probe whether the credential works at all
    ///
    /// Callers run this before a batch so a bad credential stops the batch up
    /// front instead of failing it record by record.
    pub async fn check_connectivity(&mut self) -> bool {
        let url = format!("{}/user", self.base_url);

        match self.get(QuotaResource::Core, &url).await {
            Ok(body) => {
                match string_field(&body, "login") {
                    Some(login) => tracing::info!("Authenticated as {}", login),
                    None => tracing::debug!("Connectivity probe succeeded without a login field"),
                }
                true
            }
            Err(e) => {
                tracing::warn!("Connectivity check failed: {}", e);
                false
            }
        }
    }

    /// Read both quota resources from the status endpoint
    ///
    /// On failure the tracker falls back to its conservative delay.
    pub async fn refresh_quota(&mut self) -> Result<(), ClientError> {
        let url = format!("{}/rate_limit", self.base_url);
        let request = self.http.client().get(&url);

        let body = match self.dispatch(request).await {
            Ok(body) => body,
            Err(e) => {
                self.quota.mark_unavailable();
                return Err(e);
            }
        };

        if self.quota.observe_status(&body) == 0 {
            return Err(ClientError::Parse(
                "Quota status response had no resource data".to_string(),
            ));
        }
        Ok(())
    }

    /// Throttled GET returning the success body
    pub(crate) async fn get(&mut self, resource: QuotaResource, url: &str) -> Result<String, ClientError> {
        let request = self.http.client().get(url);
        self.send(resource, request).await
    }

    /// POST through the secondary-limit retry, refreshing quota first if it is unknown or unconfirmed
    async fn post_with_retry(
        &mut self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<String, ClientError> {
        if self.quota.state(QuotaResource::Core).is_none() || self.quota.is_degraded() {
            if let Err(e) = self.refresh_quota().await {
                tracing::warn!("Could not read quota status before write: {}", e);
            }
        }

        let mut retry = RetryContext::new(self.secondary_cooldown);
        loop {
            let request = self.http.client().post(url).json(payload);
            let err = match self.send(QuotaResource::Core, request).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };
            if !retry.should_retry(&err).await {
                return Err(err);
            }
        }
    }

    async fn send(&mut self, resource: QuotaResource, request: RequestBuilder) -> Result<String, ClientError> {
        self.quota.throttle_if_needed(resource).await;
        self.dispatch(request).await
    }

    /// Issue a request, record its quota headers and classify the outcome
    async fn dispatch(&mut self, request: RequestBuilder) -> Result<String, ClientError> {
        let response = request.send().await?;
        self.quota.observe_headers(response.headers());

        let status = response.status();
        let body = response.text().await?;
        tracing::debug!("{} {} ({} bytes)", status.as_u16(), response_kind(status), body.len());

        if status.is_success() {
            Ok(body)
        } else {
            Err(ClientError::from_response(status, &body))
        }
    }
}

fn validate_collection(collection: &str) -> Result<(), ClientError> {
    let mut parts = collection.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => Ok(()),
        _ => Err(ClientError::InvalidRequest(format!(
            "Collection must look like 'owner/name', got '{}'",
            collection
        ))),
    }
}

fn response_kind(status: reqwest::StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("response")
}
