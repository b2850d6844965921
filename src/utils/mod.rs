//! Utility modules supporting client operations.
//!
//! - [`extract`]: structural extraction of records from raw JSON text
//! - [`HttpClient`]: HTTP client carrying credential and identification headers
//! - [`RetryContext`]: the single bounded retry after a secondary rate limit
//!
//! # Extraction
//!
//! ```rust
//! use issue_scout::utils::extract::{array_field, records_from_objects, split_objects};
//!
//! let body = r#"{"total_count":1,"items":[{"number":7,"title":"Uses {braces}","html_url":"https://example.com/7"}]}"#;
//! let items = array_field(body, "items").unwrap_or_default();
//! let records = records_from_objects(split_objects(items));
//! assert_eq!(records[0].title, "Uses {braces}");
//! ```

pub mod extract;
mod http;
mod retry;

pub use http::{default_user_agent, HttpClient, ACCEPT_MEDIA_TYPE};
pub use retry::{is_secondary_limit, RetryContext, MAX_SECONDARY_RETRIES, SECONDARY_LIMIT_PHRASE};
