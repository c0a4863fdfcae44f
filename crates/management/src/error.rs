//! HTTP mapping for workspace errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reach_core::ReachError;
use tracing::error;

use crate::models::ErrorResponse;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str),
    Reach(ReachError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<ReachError> for ApiError {
    fn from(e: ReachError) -> Self {
        ApiError::Reach(e)
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Reach(ReachError::Validation(msg.into()))
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Reach(e) => match e {
                ReachError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_failed"),
                ReachError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                ReachError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
                ReachError::Config(_)
                | ReachError::Storage(_)
                | ReachError::Serialization(_)
                | ReachError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let message = match self {
            ApiError::Unauthorized(msg) => msg.to_string(),
            ApiError::Reach(e) => {
                if status.is_server_error() {
                    error!(error = %e, "Request failed");
                }
                e.to_string()
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: code.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reach_errors_map_to_status_codes() {
        let cases = [
            (ReachError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ReachError::not_found("campaign", "c-1"), StatusCode::NOT_FOUND),
            (ReachError::Conflict("busy".into()), StatusCode::CONFLICT),
            (ReachError::Storage("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
        assert_eq!(
            ApiError::Unauthorized("missing").into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
