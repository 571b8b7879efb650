use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use staysearch_core::search::ValidationErrors;

#[derive(Debug)]
pub enum AppError {
    ValidationError(ValidationErrors),
    MalformedRequest(String),
    NotFoundError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::ValidationError(errors) => {
                let body = json!({
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "status": StatusCode::BAD_REQUEST.as_u16(),
                    "errors": errors.0,
                });
                (StatusCode::BAD_REQUEST, body)
            }
            AppError::MalformedRequest(msg) => {
                let body = json!({
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "status": StatusCode::BAD_REQUEST.as_u16(),
                    "errors": { "request": msg },
                });
                (StatusCode::BAD_REQUEST, body)
            }
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
            },
        };

        (status, Json(body)).into_response()
    }
}

impl AppError {
    /// Bodies that are not JSON, or whose fields have the wrong type, are
    /// answered like any other bad request.
    pub fn from_json_rejection(rejection: JsonRejection) -> Self {
        Self::MalformedRequest(rejection.body_text())
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
