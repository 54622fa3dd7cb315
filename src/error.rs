use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

/// Terminal error taxonomy for the submission pipeline. Degraded enrichment
/// is not represented here: it affects ship status and card quality only,
/// never the accept/reject decision.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("persistence failure")]
    Persistence(anyhow::Error),
}

/// Uniform JSON error body.
pub fn json_error(status: StatusCode, error: &str, detail: Value) -> impl IntoResponse {
    (status, Json(json!({ "error": error, "detail": detail })))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Authentication(reason) => json_error(
                StatusCode::UNAUTHORIZED,
                "authentication_failed",
                json!({ "reason": reason }),
            )
            .into_response(),
            ApiError::Validation(reason) => json_error(
                StatusCode::BAD_REQUEST,
                "validation_failed",
                json!({ "reason": reason }),
            )
            .into_response(),
            ApiError::RateLimited { retry_after_secs } => {
                let mut resp = json_error(
                    StatusCode::TOO_MANY_REQUESTS,
                    "rate_limited",
                    json!({ "retry_after_secs": retry_after_secs }),
                )
                .into_response();
                if let Ok(v) = retry_after_secs.to_string().parse() {
                    resp.headers_mut().insert(header::RETRY_AFTER, v);
                }
                resp
            }
            ApiError::NotFound(what) => json_error(
                StatusCode::NOT_FOUND,
                "not_found",
                json!({ "what": what }),
            )
            .into_response(),
            // Storage failed after every check passed; surface generically.
            ApiError::Persistence(_) => json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "persistence_failed",
                json!({}),
            )
            .into_response(),
        }
    }
}
