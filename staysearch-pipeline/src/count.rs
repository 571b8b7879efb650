use std::sync::Arc;
use staysearch_core::{CoreResult, SearchRepository};
use staysearch_shared::SearchCountResult;
use tracing::debug;

/// Answers "how many searches look exactly like this one".
pub struct SearchCountService {
    repo: Arc<dyn SearchRepository>,
}

impl SearchCountService {
    pub fn new(repo: Arc<dyn SearchRepository>) -> Self {
        Self { repo }
    }

    /// `Ok(None)` when the search has not been persisted (yet). That is the
    /// normal answer right after submission, not an error.
    pub async fn get_count(&self, search_id: &str) -> CoreResult<Option<SearchCountResult>> {
        let Some(record) = self.repo.get_by_id(search_id).await? else {
            debug!("Search {} not persisted yet", search_id);
            return Ok(None);
        };

        let count = self.repo.count_by_criteria(&record.criteria).await?;

        Ok(Some(SearchCountResult {
            search_id: record.id,
            search: record.criteria,
            count,
        }))
    }
}
