//! Core data models for tracker records, quota observations and search queries.

mod query;
mod quota;
mod record;

pub use query::{PageCursor, QueryCandidates, MAX_PAGE_SIZE};
pub use quota::{QuotaResource, QuotaState};
pub use record::Record;
