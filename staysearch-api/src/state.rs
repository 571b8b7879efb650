use std::sync::Arc;
use staysearch_pipeline::{SearchCountService, SearchService};

#[derive(Clone)]
pub struct AppState {
    pub searches: Arc<SearchService>,
    pub counts: Arc<SearchCountService>,
}
