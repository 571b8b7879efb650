use std::sync::Arc;
use anyhow::Context;
use staysearch_core::{
    EventChannel, InMemoryEventChannel, InMemorySearchRepository, SearchRepository, UuidAllocator,
};
use staysearch_pipeline::{
    RetryPolicy, SearchCountService, SearchEventPublisher, SearchService, SearchSubscriber,
};
use staysearch_store::app_config::{Config, StoreBackend};
use staysearch_store::{DbClient, KafkaEventChannel, PostgresSearchRepository};
use tokio::task::JoinHandle;
use tracing::info;
use crate::{state::AppState, worker};

/// Everything `main` needs to serve: the router state plus the background
/// tasks that move events from the channel into the store.
pub struct Runtime {
    pub state: AppState,
    pub workers: Vec<JoinHandle<()>>,
}

pub async fn build(config: &Config) -> anyhow::Result<Runtime> {
    let policy = RetryPolicy::new(config.publisher.max_attempts, config.publisher.backoff());

    let (repo, channel, workers): (Arc<dyn SearchRepository>, Arc<dyn EventChannel>, _) =
        match config.store.backend {
            StoreBackend::Postgres => {
                let db = DbClient::new(&config.database)
                    .await
                    .context("Failed to connect to Postgres")?;
                db.migrate().await.context("Failed to run migrations")?;
                let repo: Arc<dyn SearchRepository> = Arc::new(PostgresSearchRepository::new(db.pool.clone()));

                let channel = KafkaEventChannel::new(&config.kafka)
                    .context("Failed to create Kafka producer")?;
                let workers = worker::start_search_consumers(&config.kafka, SearchSubscriber::new(repo.clone()))
                    .context("Failed to start Kafka consumers")?;

                (repo, Arc::new(channel) as Arc<dyn EventChannel>, workers)
            }
            StoreBackend::Memory => {
                info!("Using in-memory store and channel");
                let repo: Arc<dyn SearchRepository> = Arc::new(InMemorySearchRepository::new());
                let (channel, rx) = InMemoryEventChannel::new(&config.kafka.topic);
                let worker = worker::start_local_worker(
                    rx,
                    SearchSubscriber::new(repo.clone()),
                    config.kafka.redelivery_backoff(),
                );

                (repo, Arc::new(channel) as Arc<dyn EventChannel>, vec![worker])
            }
        };

    let publisher = SearchEventPublisher::new(channel, policy);
    let state = AppState {
        searches: Arc::new(SearchService::new(repo.clone(), Arc::new(UuidAllocator), Arc::new(publisher))),
        counts: Arc::new(SearchCountService::new(repo)),
    };

    Ok(Runtime { state, workers })
}
