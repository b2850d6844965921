//! In-memory page source for testing.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::client::ClientError;
use crate::models::{PageCursor, Record};
use crate::search::{Page, PageSource};

/// A backend that serves predefined records per query, paged like the remote API
#[derive(Debug, Default)]
pub struct MockBackend {
    results: HashMap<String, Vec<Record>>,
    failures: HashMap<String, ClientError>,
    calls: Vec<(String, u32)>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve these records, in order, for `query`
    pub fn with_results(mut self, query: &str, records: Vec<Record>) -> Self {
        self.results.insert(query.to_string(), records);
        self
    }

    /// Fail every page of `query` with `error`
    pub fn with_failure(mut self, query: &str, error: ClientError) -> Self {
        self.failures.insert(query.to_string(), error);
        self
    }

    /// Every (query, page) requested so far, in request order
    pub fn calls(&self) -> &[(String, u32)] {
        &self.calls
    }
}

#[async_trait]
impl PageSource for MockBackend {
    async fn fetch_page(&mut self, query: &str, cursor: PageCursor) -> Result<Page, ClientError> {
        self.calls.push((query.to_string(), cursor.page()));

        if let Some(error) = self.failures.get(query) {
            return Err(error.clone());
        }

        let per_page = cursor.per_page() as usize;
        let skip = (cursor.page() as usize - 1) * per_page;
        let records = self
            .results
            .get(query)
            .map(|all| all.iter().skip(skip).take(per_page).cloned().collect())
            .unwrap_or_default();

        Ok(Page::from_records(records))
    }
}

/// Helper function to create a mock record for testing.
pub fn make_record(id: u64) -> Record {
    Record::new(
        id,
        format!("Record {}", id),
        format!("https://example.com/o/r/issues/{}", id),
    )
}

/// `count` mock records with consecutive identifiers starting at `first`
pub fn make_records(first: u64, count: usize) -> Vec<Record> {
    (first..first + count as u64).map(make_record).collect()
}
