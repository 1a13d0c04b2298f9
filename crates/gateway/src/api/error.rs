//! Domain error → HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use cc_domain::error::Error;

/// Build a standardized JSON error response: `{ "ok": false, "error": "<message>" }`.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "ok": false, "error": message.into() })),
    )
        .into_response()
}

/// Wrapper so handlers can `?` domain errors straight into responses.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            Error::BadRequest(msg) => api_error(StatusCode::BAD_REQUEST, msg),
            Error::Unauthorized => api_error(StatusCode::UNAUTHORIZED, "unauthorized"),
            Error::NotFound => api_error(StatusCode::NOT_FOUND, "not found"),
            Error::Conflict(msg) => api_error(StatusCode::CONFLICT, msg),
            Error::RateLimited { retry_in_secs } => api_error(
                StatusCode::TOO_MANY_REQUESTS,
                format!("rate limited — try again in {retry_in_secs}s"),
            ),
            err => {
                tracing::error!(%err, "request failed");
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}
