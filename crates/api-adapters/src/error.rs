//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;
use serde_json::{json, Value};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("tile {tile_hash} is already flagged")]
    AlreadyFlagged { tile_hash: String },

    #[error("rate limit exceeded")]
    RateLimited { limit: u32, window_secs: u64 },

    /// Logged, never returned to the caller.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::AlreadyFlagged { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            Self::BadRequest(message) | Self::NotFound(message) => json!({ "error": message }),
            Self::AlreadyFlagged { tile_hash } => json!({
                "error": "Tile already flagged",
                "tileHash": tile_hash,
            }),
            Self::RateLimited { limit, window_secs } => json!({
                "error": "Rate limit exceeded",
                "message": rate_limit_message(*limit, *window_secs),
            }),
            Self::Internal(_) => json!({ "error": "Internal server error" }),
        }
    }
}

fn rate_limit_message(limit: u32, window_secs: u64) -> String {
    match window_secs {
        60 => format!("Maximum {limit} flags per minute"),
        3600 => format!("Maximum {limit} flags per hour"),
        secs => format!("Maximum {limit} flags per {secs} seconds"),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(message) => Self::BadRequest(message),
            DomainError::InvalidCursor(message) => Self::BadRequest(message),
            DomainError::Conflict(message) => Self::BadRequest(message),
            DomainError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            DomainError::RateLimited { limit, window_secs } => {
                Self::RateLimited { limit, window_secs }
            }
            DomainError::StoreUnavailable(detail) => Self::Internal(detail),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            error!(error = %detail, "request failed");
        }
        (self.status_code(), Json(self.body())).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (DomainError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (DomainError::Conflict("dup".into()), StatusCode::BAD_REQUEST),
            (
                DomainError::RateLimited {
                    limit: 10,
                    window_secs: 60,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (DomainError::NotFound("tile".into()), StatusCode::NOT_FOUND),
            (DomainError::store("timeout"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn internal_details_stay_private() {
        let body = ApiError::from(DomainError::store("secret table arn")).body();
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }

    #[test]
    fn rate_limit_body_names_the_window() {
        let body = ApiError::RateLimited {
            limit: 10,
            window_secs: 60,
        }
        .body();
        assert_eq!(body["message"], "Maximum 10 flags per minute");
        assert_eq!(rate_limit_message(3, 90), "Maximum 3 flags per 90 seconds");
    }
}
