//! Maps domain `AppError` to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use callhub_core::error::{AppError, ErrorKind};

/// Standard API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

/// `AppError` carried out of a handler.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

/// HTTP status for an error kind.
pub fn status_for(kind: &ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound | ErrorKind::CallNotFound => StatusCode::NOT_FOUND,
        ErrorKind::NotParticipant => StatusCode::FORBIDDEN,
        ErrorKind::AlreadyInCall
        | ErrorKind::AlreadyInOtherCall
        | ErrorKind::AllBusy
        | ErrorKind::InvalidTransition => StatusCode::CONFLICT,
        ErrorKind::MediaUnavailable => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal
        | ErrorKind::Database
        | ErrorKind::Configuration
        | ErrorKind::Serialization => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err.kind);
        if status.is_server_error() {
            tracing::error!(error = %err, "Internal server error");
        }

        let body = ApiErrorResponse {
            error: err.kind.code().to_string(),
            message: err.message.clone(),
        };
        (status, Json(body)).into_response()
    }
}
