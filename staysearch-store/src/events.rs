use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{Message, OwnedMessage};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use staysearch_core::{ChannelError, Delivery, EventChannel};
use staysearch_pipeline::SearchSubscriber;
use staysearch_shared::SearchEvent;
use std::time::Duration;
use tracing::{error, info, warn};
use crate::app_config::KafkaConfig;

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Producer side of the search topic. Messages are keyed by search id and
/// carry the event as JSON.
#[derive(Clone)]
pub struct KafkaEventChannel {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl KafkaEventChannel {
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .set("linger.ms", "1")
            .create()?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            send_timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }
}

#[async_trait]
impl EventChannel for KafkaEventChannel {
    fn destination(&self) -> &str {
        &self.topic
    }

    async fn send(&self, event: &SearchEvent) -> Result<Delivery, ChannelError> {
        let payload = event.to_json().map_err(|e| ChannelError::Serialization {
            search_id: event.search_id.clone(),
            reason: e.to_string(),
        })?;

        let record = FutureRecord::to(&self.topic)
            .key(&event.search_id)
            .payload(&payload);

        match self.producer.send(record, Timeout::After(self.send_timeout)).await {
            Ok(delivery) => Ok(Delivery {
                topic: self.topic.clone(),
                partition: delivery.partition,
                offset: delivery.offset,
            }),
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", self.topic, e);
                Err(ChannelError::Send {
                    topic: self.topic.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// One member of the search consumer group. Offsets are committed by hand,
/// only after the event has been stored (or judged unreadable).
pub struct SearchConsumer {
    consumer: StreamConsumer,
    topic: String,
    redelivery_backoff: Duration,
}

impl SearchConsumer {
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .create()?;

        consumer.subscribe(&[config.topic.as_str()])?;

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
            redelivery_backoff: config.redelivery_backoff(),
        })
    }

    pub async fn run(self, subscriber: SearchSubscriber) {
        info!("Search consumer started, listening to {}...", self.topic);

        loop {
            let message = match self.consumer.recv().await {
                Ok(m) => m.detach(),
                Err(e) => {
                    error!("Kafka error: {}", e);
                    continue;
                }
            };

            deliver(&self, &subscriber, &message, self.redelivery_backoff).await;
        }
    }
}

/// Offset control the delivery loop needs from a consumer.
trait OffsetControl {
    fn commit(&self, message: &OwnedMessage);

    /// Moves the consumer back onto `message`. Returns false when the seek
    /// failed and the broker would carry on past it.
    fn rewind(&self, message: &OwnedMessage) -> bool;
}

impl OffsetControl for SearchConsumer {
    fn commit(&self, message: &OwnedMessage) {
        let mut tpl = TopicPartitionList::new();
        let next = Offset::Offset(message.offset() + 1);
        if let Err(e) = tpl.add_partition_offset(message.topic(), message.partition(), next) {
            error!("Invalid offset for commit: {}", e);
            return;
        }
        if let Err(e) = self.consumer.commit(&tpl, CommitMode::Async) {
            error!("Failed to commit offset {}: {}", message.offset(), e);
        }
    }

    fn rewind(&self, message: &OwnedMessage) -> bool {
        match self.consumer.seek(
            message.topic(),
            message.partition(),
            Offset::Offset(message.offset()),
            Timeout::After(SEEK_TIMEOUT),
        ) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to seek back to offset {}: {}", message.offset(), e);
                false
            }
        }
    }
}

// The offset is committed only once the event is stored or judged
// unreadable. A store failure leaves it uncommitted: normally the consumer
// seeks back and the broker redelivers, and if the seek fails the same
// message is retried here until it lands.
async fn deliver<C: OffsetControl>(
    control: &C,
    subscriber: &SearchSubscriber,
    message: &OwnedMessage,
    backoff: Duration,
) {
    let payload = message.payload().unwrap_or_default();

    loop {
        match subscriber.on_payload(payload).await {
            Ok(()) => {
                control.commit(message);
                return;
            }
            Err(e) if e.should_redeliver() => {
                warn!(
                    "{} (partition {} offset {}), redelivering in {:?}",
                    e,
                    message.partition(),
                    message.offset(),
                    backoff
                );
                let rewound = control.rewind(message);
                tokio::time::sleep(backoff).await;
                if rewound {
                    return;
                }
                warn!("Retrying offset {} in place", message.offset());
            }
            Err(e) => {
                error!(
                    "Skipping unreadable message at partition {} offset {}: {}",
                    message.partition(),
                    message.offset(),
                    e
                );
                control.commit(message);
                return;
            }
        }
    }
}
