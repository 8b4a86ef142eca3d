//! Gateway error types.
//!
//! Maps the kernel error taxonomy onto HTTP: configuration and
//! unroutable-event faults are the client's problem, missing entities
//! are 404, exhausted retries point at the upstream, and snapshot
//! corruption is a server fault.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use recourse_kernel::EngineError;

/// Gateway-level errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::Engine(err) => match err {
                EngineError::UnroutableEvent(_) | EngineError::DuplicateStep(_) => {
                    (StatusCode::BAD_REQUEST, "UNROUTABLE_EVENT")
                }
                EngineError::Config(_) => (StatusCode::BAD_REQUEST, "CONFIGURATION_ERROR"),
                EngineError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                EngineError::Transient(_) | EngineError::TransientExhausted { .. } => {
                    (StatusCode::BAD_GATEWAY, "UPSTREAM_EXHAUSTED")
                }
                EngineError::Deserialization(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "STATE_CORRUPT")
                }
                EngineError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "RUN_CANCELLED"),
                EngineError::StepLimitExceeded(_)
                | EngineError::Step(_)
                | EngineError::Io(_)
                | EngineError::Serialization(_)
                | EngineError::Other(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        } else {
            tracing::warn!(code, error = %self, "request rejected");
        }
        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

/// Gateway result type
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.status_and_code().0
    }

    #[test]
    fn test_taxonomy_mapping() {
        assert_eq!(
            status_of(EngineError::not_found("STORY-1").into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(EngineError::config("no credentials").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(EngineError::UnroutableEvent("StoryFetched".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                EngineError::TransientExhausted {
                    attempts: 10,
                    last: "timeout".into()
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(EngineError::Deserialization("corrupt".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(EngineError::Cancelled.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ApiError::InvalidRequest("bad body".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
