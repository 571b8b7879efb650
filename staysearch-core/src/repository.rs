use async_trait::async_trait;
use staysearch_shared::{SearchCriteria, SearchRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(String),
    #[error("corrupt search record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Durable store for submitted searches, keyed by search id.
///
/// Implementations must make `upsert` a pure overwrite-by-key so that
/// redelivered events never produce a second record, and `count_by_criteria`
/// must compare all four criteria fields for strict equality (ages as an
/// ordered list), counting the seeding record too.
#[async_trait]
pub trait SearchRepository: Send + Sync {
    async fn exists(&self, search_id: &str) -> Result<bool, StoreError>;

    async fn get_by_id(&self, search_id: &str) -> Result<Option<SearchRecord>, StoreError>;

    async fn upsert(&self, record: &SearchRecord) -> Result<(), StoreError>;

    async fn count_by_criteria(&self, criteria: &SearchCriteria) -> Result<u64, StoreError>;
}
