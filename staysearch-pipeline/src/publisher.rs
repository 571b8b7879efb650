use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use staysearch_core::{ChannelError, Delivery, EventChannel, EventPublisher};
use staysearch_shared::SearchEvent;
use tracing::{error, info, warn};

/// Fixed-delay retry budget for a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Never below 1.
    pub max_attempts: u32,
    /// Pause between consecutive attempts. No jitter, no growth.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Called once per event when the retry budget runs out.
pub trait RecoveryHandler: Send + Sync {
    fn recover(&self, error: &ChannelError, event: &SearchEvent);
}

/// Unsent events are not stored anywhere; logging is the whole recovery.
pub struct LoggingRecovery;

impl RecoveryHandler for LoggingRecovery {
    fn recover(&self, error: &ChannelError, event: &SearchEvent) {
        error!(
            search_id = %event.search_id,
            hotel_id = %event.hotel_id,
            error = %error,
            "Could not publish search event after retries, dropping it: {:?}",
            event
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered { attempts: u32, delivery: Delivery },
    Recovered { attempts: u32 },
}

/// Publishes search events with bounded retry. `publish` hands the work to
/// a background task; `send_with_retry` is the same loop, awaited.
#[derive(Clone)]
pub struct SearchEventPublisher {
    channel: Arc<dyn EventChannel>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    recovery: Arc<dyn RecoveryHandler>,
}

impl SearchEventPublisher {
    pub fn new(channel: Arc<dyn EventChannel>, policy: RetryPolicy) -> Self {
        Self {
            channel,
            policy,
            sleeper: Arc::new(TokioSleeper),
            recovery: Arc::new(LoggingRecovery),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_recovery(mut self, recovery: Arc<dyn RecoveryHandler>) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn send_with_retry(&self, event: &SearchEvent) -> PublishOutcome {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.channel.send(event).await {
                Ok(delivery) => {
                    info!(
                        "Search event {} sent to {}: partition {} offset {}",
                        event.search_id, delivery.topic, delivery.partition, delivery.offset
                    );
                    return PublishOutcome::Delivered { attempts, delivery };
                }
                Err(e) if attempts >= self.policy.max_attempts => {
                    self.recovery.recover(&e, event);
                    return PublishOutcome::Recovered { attempts };
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{} to send search event {} to {} failed: {}",
                        attempts,
                        self.policy.max_attempts,
                        event.search_id,
                        self.channel.destination(),
                        e
                    );
                    self.sleeper.sleep(self.policy.delay).await;
                }
            }
        }
    }
}

impl EventPublisher for SearchEventPublisher {
    fn publish(&self, event: SearchEvent) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let publisher = self.clone();
                handle.spawn(async move {
                    publisher.send_with_retry(&event).await;
                });
            }
            Err(_) => {
                let e = ChannelError::Send {
                    topic: self.channel.destination().to_string(),
                    reason: "no async runtime to publish on".to_string(),
                };
                self.recovery.recover(&e, &event);
            }
        }
    }
}
