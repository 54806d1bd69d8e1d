//! JSON error responses
//!
//! Every failure leaves the API as `{"error": {"kind", "message"}}` with a
//! status chosen by the error's kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::ai::GenAiError;
use crate::media::{AnalysisError, MediaError};
use crate::session::SessionError;

/// An error ready to be sent to the client
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    kind: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(kind = self.kind, status = %self.status, message = %self.message, "request failed");
        } else {
            tracing::debug!(kind = self.kind, status = %self.status, message = %self.message, "request rejected");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind,
                message: &self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<GenAiError> for ApiError {
    fn from(e: GenAiError) -> Self {
        let message = e.to_string();
        match e {
            GenAiError::Authentication(_) => {
                Self::new(StatusCode::BAD_GATEWAY, "upstream_auth", message)
            }
            GenAiError::RateLimited { .. } => Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "upstream_rate_limited",
                message,
            ),
            GenAiError::Io(_) | GenAiError::Config(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
            _ => Self::new(StatusCode::BAD_GATEWAY, "upstream_error", message),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        let status = match e {
            MediaError::UnsupportedExtension { .. } | MediaError::UnsupportedMime { .. } => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            MediaError::MissingFileName | MediaError::EmptyData => StatusCode::BAD_REQUEST,
        };
        Self::new(status, "invalid_input", e.to_string())
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::MissingPrompt => Self::invalid_input(e.to_string()),
            AnalysisError::Input(e) => e.into(),
            AnalysisError::ProcessingFailed { .. } => {
                Self::new(StatusCode::BAD_GATEWAY, "processing_failed", e.to_string())
            }
            AnalysisError::ProcessingTimedOut { .. } => Self::new(
                StatusCode::GATEWAY_TIMEOUT,
                "processing_timed_out",
                e.to_string(),
            ),
            AnalysisError::Inference(e) => e.into(),
            AnalysisError::Staging(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::EmptyMessage => Self::invalid_input(e.to_string()),
            SessionError::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "session_not_found", e.to_string())
            }
            SessionError::Full(_) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "sessions_full", e.to_string())
            }
            SessionError::Backend(e) => e.into(),
        }
    }
}
