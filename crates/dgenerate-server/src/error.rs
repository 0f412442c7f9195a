use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use dgenerate_shared::DgenError;
use dgenerate_store::StoreError;

use crate::ledger::LedgerError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Validation(#[from] DgenError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Media already exists: {0}")]
    MediaExists(String),

    #[error("Media too large: {size} bytes (max {max})")]
    MediaTooLarge { size: usize, max: usize },

    #[error("Upload exceeds the {max} byte limit")]
    BodyTooLarge { max: usize },

    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("Media storage error: {0}")]
    MediaStorage(String),

    #[error("Too many requests")]
    RateLimited,

    /// A write to the store failed; `context` is the user-facing summary.
    #[error("{context}: {source}")]
    Persistence {
        context: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Failed to mint tokens")]
    MintFailed(serde_json::Value),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn persistence(context: &'static str, source: StoreError) -> Self {
        ServerError::Persistence { context, source }
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Validation(v) => ServerError::Validation(v),
            LedgerError::Persistence(s) => ServerError::persistence("Failed to save guess", s),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            ServerError::Validation(_) | ServerError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string(), None)
            }
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string(), None),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string(), None),
            ServerError::MediaExists(_) => (StatusCode::CONFLICT, self.to_string(), None),
            ServerError::MediaTooLarge { .. } | ServerError::BodyTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, self.to_string(), None)
            }
            ServerError::UnsupportedMedia(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, self.to_string(), None)
            }
            ServerError::MediaStorage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Media storage error".to_string(),
                None,
            ),
            ServerError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string(), None),
            ServerError::Persistence { context, source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                context.to_string(),
                Some(serde_json::Value::String(source.to_string())),
            ),
            ServerError::MintFailed(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                self.to_string(),
                Some(details.clone()),
            ),
            ServerError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                None,
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = match details {
            Some(details) => serde_json::json!({ "error": message, "details": details }),
            None => serde_json::json!({ "error": message }),
        };

        (status, axum::Json(body)).into_response()
    }
}
