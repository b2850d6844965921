//! # Issue Scout
//!
//! A quota-aware client for a paginated, search-oriented issue tracker API.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Record, QuotaState, QueryCandidates)
//! - [`client`]: The [`RepositoryClient`] and its error type
//! - [`search`]: Paging executor and candidate fallback over a [`search::PageSource`]
//! - [`quota`]: Primary quota tracking and the throttle policy
//! - [`utils`]: HTTP client, secondary-limit retry and the JSON field extractor
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```no_run
//! use issue_scout::{ClientConfig, QueryCandidates, RepositoryClient};
//!
//! # async fn run() -> Result<(), issue_scout::ClientError> {
//! let mut client = RepositoryClient::new(ClientConfig::new("token"))?;
//! if client.check_connectivity().await {
//!     let candidates = QueryCandidates::label_then_title("acme/shop", "type:story", "[STORY]");
//!     for record in client.search(&candidates).await? {
//!         println!("{}", record);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod models;
pub mod quota;
pub mod search;
pub mod utils;

// Re-export commonly used types
pub use client::{ClientConfig, ClientError, RepositoryClient};
pub use models::{QueryCandidates, QuotaResource, Record};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
