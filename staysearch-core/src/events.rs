use std::sync::atomic::{AtomicI64, Ordering};
use async_trait::async_trait;
use tokio::sync::mpsc;
use staysearch_shared::SearchEvent;

/// Broker acknowledgement for a single send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("failed to send to {topic}: {reason}")]
    Send { topic: String, reason: String },
    #[error("failed to encode event {search_id}: {reason}")]
    Serialization { search_id: String, reason: String },
}

/// Transport that carries submitted searches from the accepting side to the
/// persisting side. At-least-once; no replay semantics beyond that.
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Topic or queue name, for logs.
    fn destination(&self) -> &str;

    async fn send(&self, event: &SearchEvent) -> Result<Delivery, ChannelError>;
}

/// Fire-and-forget hand-off of a search event. Must return without waiting
/// for the broker.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: SearchEvent);
}

/// Channel backed by an unbounded tokio mpsc queue. The receiving half is
/// drained by a local worker that feeds the subscriber.
pub struct InMemoryEventChannel {
    topic: String,
    tx: mpsc::UnboundedSender<SearchEvent>,
    next_offset: AtomicI64,
}

impl InMemoryEventChannel {
    pub fn new(topic: &str) -> (Self, mpsc::UnboundedReceiver<SearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Self {
            topic: topic.to_string(),
            tx,
            next_offset: AtomicI64::new(0),
        };
        (channel, rx)
    }
}

#[async_trait]
impl EventChannel for InMemoryEventChannel {
    fn destination(&self) -> &str {
        &self.topic
    }

    async fn send(&self, event: &SearchEvent) -> Result<Delivery, ChannelError> {
        self.tx.send(event.clone()).map_err(|_| ChannelError::Send {
            topic: self.topic.clone(),
            reason: "receiver dropped".to_string(),
        })?;

        Ok(Delivery {
            topic: self.topic.clone(),
            partition: 0,
            offset: self.next_offset.fetch_add(1, Ordering::SeqCst),
        })
    }
}
