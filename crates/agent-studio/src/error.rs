//! Errors returned by the HTTP handlers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors reported before the response stream starts.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body is unusable.
    #[error("{0}")]
    BadRequest(String),
    /// A required credential is missing, named by its variable.
    #[error("{0} not configured")]
    NotConfigured(&'static str),
    /// The tool broker could not provide the tools.
    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    /// Returns the status code of the error response.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
