//! Paginated execution of candidate queries.
//!
//! [`search_candidates`] tries each candidate in order and pages through it
//! with [`collect_pages`]; the first candidate that yields records wins. Page
//! retrieval is abstracted behind [`PageSource`] so the loop is the same for
//! every endpoint and can be driven by [`MockBackend`] in tests.

pub mod mock;

pub use mock::MockBackend;

use async_trait::async_trait;
use std::collections::HashSet;

use crate::client::ClientError;
use crate::models::{PageCursor, QueryCandidates, Record};

/// One page of results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Records that could be extracted, in remote order
    pub records: Vec<Record>,
    /// Objects the page held, including ones dropped as malformed or filtered
    pub item_count: usize,
}

impl Page {
    pub fn new(records: Vec<Record>, item_count: usize) -> Self {
        Self {
            records,
            item_count,
        }
    }

    /// A page where every object became a record
    pub fn from_records(records: Vec<Record>) -> Self {
        let item_count = records.len();
        Self::new(records, item_count)
    }
}

/// Something that can return one page of results for a query
#[async_trait]
pub trait PageSource: Send {
    async fn fetch_page(&mut self, query: &str, cursor: PageCursor) -> Result<Page, ClientError>;
}

/// Fetch every page of one query, in increasing page order
///
/// Paging stops at the first empty or under-full page. A validation rejection
/// ends the query without error, keeping whatever earlier pages returned.
/// Identifiers already collected are not appended again, and a page whose
/// records were all collected before also ends the loop.
pub async fn collect_pages<S>(
    source: &mut S,
    query: &str,
    page_size: u32,
) -> Result<Vec<Record>, ClientError>
where
    S: PageSource + ?Sized,
{
    let mut cursor = PageCursor::first(page_size);
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    loop {
        let page = match source.fetch_page(query, cursor).await {
            Ok(page) => page,
            Err(ClientError::Validation { body }) => {
                tracing::debug!(
                    "Query '{}' rejected as invalid on page {}: {}",
                    query,
                    cursor.page(),
                    body
                );
                break;
            }
            Err(e) => return Err(e),
        };

        let fetched = page.records.len();
        let before = records.len();
        for record in page.records {
            if seen.insert(record.id) {
                records.push(record);
            } else {
                tracing::debug!("Skipping repeated record #{} on page {}", record.id, cursor.page());
            }
        }
        let added = records.len() - before;

        tracing::debug!(
            "Page {} of '{}': {} items, {} new records",
            cursor.page(),
            query,
            page.item_count,
            added
        );

        if cursor.is_last(page.item_count) || (fetched > 0 && added == 0) {
            break;
        }
        cursor = cursor.next();
    }

    Ok(records)
}

/// Run candidates in order and return the first non-empty result
///
/// An empty result after every candidate is a valid outcome, not an error.
pub async fn search_candidates<S>(
    source: &mut S,
    candidates: &QueryCandidates,
    page_size: u32,
) -> Result<Vec<Record>, ClientError>
where
    S: PageSource + ?Sized,
{
    for (index, query) in candidates.iter().enumerate() {
        let records = collect_pages(source, query, page_size).await?;

        if !records.is_empty() {
            tracing::info!(
                "Candidate {} of {} matched {} records: {}",
                index + 1,
                candidates.len(),
                records.len(),
                query
            );
            return Ok(records);
        }

        tracing::debug!("Candidate {} matched nothing: {}", index + 1, query);
    }

    tracing::info!("No candidate among {} matched any records", candidates.len());
    Ok(Vec::new())
}
