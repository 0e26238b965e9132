//! Mapping of gateway errors onto HTTP responses.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shoal_core::{
    ContentId, RangeError, ResolveError, SelectError, SessionError, ShoalError,
};

/// Error returned by every handler. Rendered as `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing locator query parameter")]
    MissingLocator,

    #[error("no active session for {content_id}")]
    SessionNotFound { content_id: ContentId },

    #[error(transparent)]
    Gateway(#[from] ShoalError),
}

impl From<ResolveError> for ApiError {
    fn from(error: ResolveError) -> Self {
        ApiError::Gateway(error.into())
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        ApiError::Gateway(error.into())
    }
}

impl From<SelectError> for ApiError {
    fn from(error: SelectError) -> Self {
        ApiError::Gateway(error.into())
    }
}

impl From<RangeError> for ApiError {
    fn from(error: RangeError) -> Self {
        ApiError::Gateway(error.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingLocator => StatusCode::BAD_REQUEST,
            ApiError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Gateway(error) => match error {
                ShoalError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
                ShoalError::NoPlayableFile(_) => StatusCode::NOT_FOUND,
                ShoalError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
                ShoalError::Session(
                    SessionError::Destroyed { .. } | SessionError::NotReady { .. },
                ) => StatusCode::SERVICE_UNAVAILABLE,
                ShoalError::Session(_) | ShoalError::Configuration { .. } | ShoalError::Io(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Gateway(error) => error.user_message(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }

        let body = Json(json!({ "error": self.message() }));
        match &self {
            ApiError::Gateway(ShoalError::RangeNotSatisfiable(range)) => (
                status,
                [(header::CONTENT_RANGE, format!("bytes */{}", range.size()))],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}
