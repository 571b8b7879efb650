use std::sync::Arc;
use std::time::Duration;
use staysearch_core::{SearchRepository, StoreError};
use staysearch_shared::{SearchEvent, SearchRecord};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("malformed search event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("failed to persist search {search_id}: {source}")]
    Store {
        search_id: String,
        #[source]
        source: StoreError,
    },
}

impl SubscriberError {
    /// Whether the channel should hand the same event back later. Malformed
    /// payloads never get better on redelivery.
    pub fn should_redeliver(&self) -> bool {
        matches!(self, SubscriberError::Store { .. })
    }
}

/// Persists delivered search events. Safe to call from many consumers at
/// once; a repeated delivery overwrites the same key.
#[derive(Clone)]
pub struct SearchSubscriber {
    repo: Arc<dyn SearchRepository>,
}

impl SearchSubscriber {
    pub fn new(repo: Arc<dyn SearchRepository>) -> Self {
        Self { repo }
    }

    pub async fn on_payload(&self, payload: &[u8]) -> Result<(), SubscriberError> {
        let event = SearchEvent::from_json(payload)?;
        self.on_event(event).await
    }

    pub async fn on_event(&self, event: SearchEvent) -> Result<(), SubscriberError> {
        debug!("Received search event: {:?}", event);

        let record = SearchRecord::from(event);
        self.repo
            .upsert(&record)
            .await
            .map_err(|source| SubscriberError::Store {
                search_id: record.id.clone(),
                source,
            })?;

        debug!("Search {} persisted", record.id);
        Ok(())
    }
}

/// Feeds events from an in-process channel into the subscriber until every
/// sender is gone. A failed write puts the same event back after
/// `redelivery_backoff`, mirroring what the broker does for an uncommitted
/// offset.
pub async fn drain_local_channel(
    mut rx: mpsc::UnboundedReceiver<SearchEvent>,
    subscriber: SearchSubscriber,
    redelivery_backoff: Duration,
) {
    info!("Local search event worker started");

    while let Some(event) = rx.recv().await {
        loop {
            match subscriber.on_event(event.clone()).await {
                Ok(()) => break,
                Err(e) if e.should_redeliver() => {
                    warn!("{}; redelivering in {:?}", e, redelivery_backoff);
                    tokio::time::sleep(redelivery_backoff).await;
                }
                Err(e) => {
                    error!("Dropping search event: {}", e);
                    break;
                }
            }
        }
    }

    info!("Local search event worker stopped");
}
