//! API error mapping.
//!
//! Every handler error is a [`CoreError`] wrapped with the request path.
//! The response body is the standard error shape
//! `{statusCode, timestamp, path, message, error}` with the status mapping
//! `InvalidInput -> 400`, `NotFound -> 404`, `Conflict -> 409`, everything
//! else `500`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use leaklens_core::{CoreError, Timestamp};
use serde::Serialize;

/// A handler error: the domain error plus request context.
#[derive(Debug)]
pub struct ApiError {
    error: CoreError,
    path: Option<String>,
}

impl ApiError {
    /// Attaches the request path for the error body.
    #[must_use]
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The HTTP status for the wrapped error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match &self.error {
            CoreError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            CoreError::Conflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable kind of the wrapped error.
    #[must_use]
    pub fn error_kind(&self) -> &'static str {
        match &self.error {
            CoreError::InvalidInput { .. } => "INVALID_INPUT",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Conflict { .. } => "CONFLICT",
            CoreError::InvariantViolation { .. } => "INVARIANT_VIOLATION",
            CoreError::SimulatorUnavailable { .. } => "SIMULATOR_UNAVAILABLE",
            CoreError::SimulationFailed { .. } => "SIMULATION_FAILED",
            CoreError::NoValidReadings { .. } => "NO_VALID_READINGS",
            CoreError::LocalizationUndetermined { .. } => "LOCALIZATION_UNDETERMINED",
            CoreError::Timeout { .. } => "TIMEOUT",
            CoreError::Io(_) => "IO_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        Self { error, path: None }
    }
}

/// Standard error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// HTTP status code
    pub status_code: u16,
    /// When the error response was produced
    pub timestamp: Timestamp,
    /// Request path, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Human-readable message
    pub message: String,
    /// Machine-readable error kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self.error, "API error");
        } else {
            tracing::warn!(error = %self.error, "API error");
        }

        let error_kind = self.error_kind().to_string();
        let body = ErrorBody {
            status_code: status.as_u16(),
            timestamp: Utc::now(),
            path: self.path,
            message: self.error.to_string(),
            error: Some(error_kind),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err: ApiError = CoreError::invalid_input("bad").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err: ApiError = CoreError::not_found("Network", "x").into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err: ApiError = CoreError::conflict("dup").into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err: ApiError = CoreError::invariant("cycle").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: ApiError = CoreError::undetermined("n/a").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_kinds() {
        let err: ApiError = CoreError::undetermined("n/a").into();
        assert_eq!(err.error_kind(), "LOCALIZATION_UNDETERMINED");
        let err: ApiError = CoreError::simulation_failed("diverged").into();
        assert_eq!(err.error_kind(), "SIMULATION_FAILED");
    }
}
