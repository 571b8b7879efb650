use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use staysearch_core::search::{validate_criteria, ValidationErrors};
use staysearch_shared::SearchCriteria;
use crate::{error::AppError, state::AppState};

// Everything optional so a missing field becomes a field error, not a
// deserialization rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub hotel_id: Option<String>,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub ages: Option<Vec<i64>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub search_id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/search", post(submit_search))
}

impl SearchRequest {
    pub fn into_criteria(self) -> Result<SearchCriteria, ValidationErrors> {
        let raw_ages = self.ages.unwrap_or_default();
        let ages: Vec<u32> = raw_ages
            .iter()
            .filter_map(|age| u32::try_from(*age).ok())
            .collect();
        let age_error = if raw_ages.iter().any(|age| *age < 0) {
            Some("Ages must be non-negative integers".to_string())
        } else if ages.len() != raw_ages.len() {
            Some(format!("Ages must not exceed {}", u32::MAX))
        } else {
            None
        };

        let criteria = SearchCriteria::new(
            self.hotel_id.unwrap_or_default(),
            self.check_in.unwrap_or_default(),
            self.check_out.unwrap_or_default(),
            ages,
        );

        let mut errors = match validate_criteria(&criteria) {
            Ok(()) => ValidationErrors::default(),
            Err(errors) => errors,
        };
        if let Some(message) = age_error {
            errors.0.insert("ages".to_string(), message);
        }

        if errors.is_empty() {
            Ok(criteria)
        } else {
            Err(errors)
        }
    }
}

async fn submit_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(req) = payload.map_err(AppError::from_json_rejection)?;
    let criteria = req.into_criteria().map_err(AppError::ValidationError)?;

    let search_id = state.searches.submit(criteria).await?;

    Ok(Json(SearchResponse { search_id }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(ages: Vec<i64>) -> SearchRequest {
        SearchRequest {
            hotel_id: Some("1234".to_string()),
            check_in: Some("29/12/2023".to_string()),
            check_out: Some("12/01/2024".to_string()),
            ages: Some(ages),
        }
    }

    #[test]
    fn test_valid_request_keeps_age_order() {
        let criteria = request(vec![12, 32, 61, 19]).into_criteria().unwrap();
        assert_eq!(criteria.ages, vec![12, 32, 61, 19]);
        assert_eq!(criteria.hotel_id, "1234");
    }

    #[test]
    fn test_negative_age_rejected() {
        let errors = request(vec![12, -3]).into_criteria().unwrap_err();
        assert_eq!(
            errors.0.get("ages").map(String::as_str),
            Some("Ages must be non-negative integers")
        );
    }

    #[test]
    fn test_age_above_u32_range_rejected() {
        let errors = request(vec![12, i64::from(u32::MAX) + 1]).into_criteria().unwrap_err();
        assert_eq!(
            errors.0.get("ages").map(String::as_str),
            Some("Ages must not exceed 4294967295")
        );
    }

    #[test]
    fn test_missing_fields_reported() {
        let errors = SearchRequest::default().into_criteria().unwrap_err();
        for field in ["hotelId", "checkIn", "checkOut", "ages"] {
            assert!(errors.0.contains_key(field), "missing error for {}", field);
        }
    }
}
