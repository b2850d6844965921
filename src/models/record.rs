//! Record model representing a single issue observed on the remote tracker.

use serde::{Deserialize, Serialize};

/// An issue as returned by the remote tracker
///
/// Records are created by the remote system; the client only observes them or
/// requests their creation. Once read they are never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier, unique within the remote system (the issue number)
    pub id: u64,

    /// Record title
    pub title: String,

    /// Free-text body, empty when the remote body is absent or null
    #[serde(default)]
    pub body: String,

    /// Canonical link to the record's page
    pub url: String,

    /// Label names in the order the remote system reports them
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Record {
    /// Create a record with an empty body and no labels
    pub fn new(id: u64, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: String::new(),
            url: url.into(),
            labels: Vec::new(),
        }
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the labels
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the record carries a label, compared case-insensitively
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}: {} ({})", self.id, self.title, self.url)
    }
}
