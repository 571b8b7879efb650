pub mod events;
pub mod search;
pub mod repository;
pub mod memory;
pub mod identity;

pub use events::{ChannelError, Delivery, EventChannel, EventPublisher, InMemoryEventChannel};
pub use identity::{IdAllocator, UuidAllocator};
pub use memory::InMemorySearchRepository;
pub use repository::{SearchRepository, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Search store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

pub type CoreResult<T> = Result<T, CoreError>;
