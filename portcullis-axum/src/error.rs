use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use portcullis_core::error::ConfigError;

/// Errors surfaced by the HTTP facade.
///
/// A blocked verdict is not an error: rate-limit state is data and travels in
/// a 200 response with `allow: false`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The action kind has no configured limiter.
    #[error("Unknown action kind: {0}")]
    UnknownAction(String),

    /// The request payload failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Anything the client cannot act on.
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<portcullis::Error> for ApiError {
    fn from(error: portcullis::Error) -> Self {
        match error {
            portcullis::Error::Config(ConfigError::UnknownActionKind(kind)) => {
                ApiError::UnknownAction(kind)
            }
            portcullis::Error::Validation(e) => ApiError::InvalidRequest(e.to_string()),
            other => {
                tracing::error!(error = %other, "Engine call failed");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::UnknownAction(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
