//! Search query candidates and page cursors.

/// Largest page the remote search API will return
pub const MAX_PAGE_SIZE: u32 = 100;

/// Ordered alternative phrasings of one search
///
/// Candidates are tried strictly in insertion order; the first one that yields
/// any records wins and the rest are never issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryCandidates {
    queries: Vec<String>,
}

impl QueryCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate
    pub fn push(mut self, query: impl Into<String>) -> Self {
        self.queries.push(query.into());
        self
    }

    /// Open issues in `repo` matched by label first, then by a title marker
    ///
    /// Label search and title search disagree often enough that either can come
    /// back empty while the other finds the records.
    pub fn label_then_title(repo: &str, label: &str, title_marker: &str) -> Self {
        Self::new()
            .push(format!(
                "repo:{} type:issue state:open label:\"{}\"",
                repo, label
            ))
            .push(format!(
                "repo:{} type:issue state:open \"{}\" in:title",
                repo, title_marker
            ))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.queries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for QueryCandidates {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            queries: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Position within one paginated fetch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    page: u32,
    per_page: u32,
}

impl PageCursor {
    /// Cursor at page 1; the page size is clamped to `1..=MAX_PAGE_SIZE`
    pub fn first(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// The following page with the same size
    pub fn next(self) -> Self {
        Self {
            page: self.page + 1,
            ..self
        }
    }

    /// Whether a page holding `item_count` items ends the loop
    pub fn is_last(&self, item_count: usize) -> bool {
        item_count == 0 || item_count < self.per_page as usize
    }
}
