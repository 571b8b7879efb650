use std::time::Duration;
use rdkafka::error::KafkaError;
use staysearch_pipeline::subscriber::drain_local_channel;
use staysearch_pipeline::SearchSubscriber;
use staysearch_shared::SearchEvent;
use staysearch_store::app_config::KafkaConfig;
use staysearch_store::SearchConsumer;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Starts `kafka.concurrency` consumers in the same group. The broker
/// spreads the topic's partitions across them.
pub fn start_search_consumers(
    config: &KafkaConfig,
    subscriber: SearchSubscriber,
) -> Result<Vec<JoinHandle<()>>, KafkaError> {
    let workers = config.concurrency.max(1);
    let mut handles = Vec::with_capacity(workers);

    for _ in 0..workers {
        let consumer = SearchConsumer::new(config)?;
        handles.push(tokio::spawn(consumer.run(subscriber.clone())));
    }

    info!("Started {} search consumers in group {}", workers, config.group_id);
    Ok(handles)
}

pub fn start_local_worker(
    rx: mpsc::UnboundedReceiver<SearchEvent>,
    subscriber: SearchSubscriber,
    redelivery_backoff: Duration,
) -> JoinHandle<()> {
    tokio::spawn(drain_local_channel(rx, subscriber, redelivery_backoff))
}
