//! Endpoint-specific page sources used by the client.

use async_trait::async_trait;

use crate::client::{ClientError, RepositoryClient};
use crate::models::{PageCursor, QuotaResource};
use crate::search::{Page, PageSource};
use crate::utils::extract::{
    array_field, has_field, int_field, records_from_objects, split_objects, top_level_array,
};

/// Pages of the issue search endpoint; the query is the search string
pub(crate) struct SearchPages<'a> {
    pub(crate) client: &'a mut RepositoryClient,
}

#[async_trait]
impl PageSource for SearchPages<'_> {
    async fn fetch_page(&mut self, query: &str, cursor: PageCursor) -> Result<Page, ClientError> {
        let url = format!(
            "{}/search/issues?q={}&page={}&per_page={}",
            self.client.base_url(),
            urlencoding::encode(query),
            cursor.page(),
            cursor.per_page()
        );

        let body = self.client.get(QuotaResource::Search, &url).await?;

        if cursor.page() == 1 {
            if let Some(total) = int_field(&body, "total_count") {
                tracing::debug!("Search '{}' reports {} total matches", query, total);
            }
        }

        let objects = match array_field(&body, "items") {
            Some(items) => split_objects(items),
            None => {
                tracing::warn!(
                    "Search response for page {} had no readable items array",
                    cursor.page()
                );
                Vec::new()
            }
        };

        let item_count = objects.len();
        Ok(Page::new(records_from_objects(objects), item_count))
    }
}

/// Pages of a collection's open-issue listing; the query is a label filter
pub(crate) struct ListingPages<'a> {
    pub(crate) client: &'a mut RepositoryClient,
    pub(crate) collection: &'a str,
}

#[async_trait]
impl PageSource for ListingPages<'_> {
    async fn fetch_page(&mut self, labels: &str, cursor: PageCursor) -> Result<Page, ClientError> {
        let mut url = format!(
            "{}/repos/{}/issues?state=open&page={}&per_page={}",
            self.client.base_url(),
            self.collection,
            cursor.page(),
            cursor.per_page()
        );
        if !labels.is_empty() {
            url.push_str("&labels=");
            url.push_str(&urlencoding::encode(labels));
        }

        let body = self.client.get(QuotaResource::Core, &url).await?;

        let objects = match top_level_array(&body) {
            Some(content) => split_objects(content),
            None => {
                tracing::warn!(
                    "Listing response for page {} was not a readable array",
                    cursor.page()
                );
                Vec::new()
            }
        };

        // The listing includes pull requests, which are not records.
        let item_count = objects.len();
        let issues = objects
            .into_iter()
            .filter(|object| !has_field(object, "pull_request"));

        Ok(Page::new(records_from_objects(issues), item_count))
    }
}
