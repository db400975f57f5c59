use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// A request that could not be served, mapped to an HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request is structurally invalid; no work was started.
    #[error("{0}")]
    BadRequest(String),

    /// The named resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The server could not complete the request.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
