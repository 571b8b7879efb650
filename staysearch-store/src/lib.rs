pub mod app_config;
pub mod database;
pub mod search_repo;
pub mod events;

pub use database::DbClient;
pub use events::{KafkaEventChannel, SearchConsumer};
pub use search_repo::PostgresSearchRepository;
