pub mod publisher;
pub mod subscriber;
pub mod submission;
pub mod count;

pub use publisher::{
    LoggingRecovery, PublishOutcome, RecoveryHandler, RetryPolicy, SearchEventPublisher, Sleeper,
    TokioSleeper,
};
pub use subscriber::{SearchSubscriber, SubscriberError};
pub use submission::SearchService;
pub use count::SearchCountService;
