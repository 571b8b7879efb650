pub mod models;

pub use models::events::SearchEvent;
pub use models::search::{SearchCountResult, SearchCriteria, SearchRecord};
