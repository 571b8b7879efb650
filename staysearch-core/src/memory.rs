use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use async_trait::async_trait;
use tokio::sync::RwLock;
use staysearch_shared::{SearchCriteria, SearchRecord};
use crate::repository::{SearchRepository, StoreError};

/// Process-local store. Backs `store.backend = "memory"` and the test suites.
#[derive(Default)]
pub struct InMemorySearchRepository {
    records: RwLock<HashMap<String, SearchRecord>>,
    unavailable: AtomicBool,
}

impl InMemorySearchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `StoreError::Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchRepository for InMemorySearchRepository {
    async fn exists(&self, search_id: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self.records.read().await.contains_key(search_id))
    }

    async fn get_by_id(&self, search_id: &str) -> Result<Option<SearchRecord>, StoreError> {
        self.check_available()?;
        Ok(self.records.read().await.get(search_id).cloned())
    }

    async fn upsert(&self, record: &SearchRecord) -> Result<(), StoreError> {
        self.check_available()?;
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn count_by_criteria(&self, criteria: &SearchCriteria) -> Result<u64, StoreError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records.values().filter(|r| &r.criteria == criteria).count() as u64)
    }
}
