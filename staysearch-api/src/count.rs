use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use staysearch_shared::SearchCountResult;
use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountQuery {
    pub search_id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/count", get(get_search_count))
}

async fn get_search_count(
    State(state): State<AppState>,
    Query(query): Query<CountQuery>,
) -> Result<Json<SearchCountResult>, AppError> {
    // Not found right after submission is expected; the client retries.
    let result = state
        .counts
        .get_count(&query.search_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Search {} not found", query.search_id)))?;

    Ok(Json(result))
}
