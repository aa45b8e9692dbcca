//! Service error taxonomy and HTTP mapping.
//!
//! Only `BadRequest` and `RateLimited` ever reach a caller as non-200
//! statuses. `Config` and `Provider` are absorbed by the orchestrator's
//! pro-tier fallback; their HTTP mapping exists for completeness but is
//! unreachable on the enhance path.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed body, empty input, or unknown tier.
    #[error("{0}")]
    BadRequest(String),

    /// Sliding-window threshold exceeded.
    #[error("too many requests, slow down")]
    RateLimited,

    /// Pro tier requested without a configured credential.
    #[error("no API credential configured: {0}")]
    Config(String),

    /// Every candidate model was exhausted; carries the last observed
    /// error for diagnostics.
    #[error("all candidate models failed: {0}")]
    Provider(String),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Config(_) | ServiceError::Provider(_) => StatusCode::BAD_GATEWAY,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
