//! HTTP server error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::api::ErrorResponse;
use crate::pipeline::CoreError;

/// Errors that can occur while serving requests.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration does not fit the routes being served.
    #[error("Invalid server configuration: {0}")]
    Config(String),

    /// Serving failed after the listener was bound.
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    /// A required request field is missing or blank.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ServerError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Core(CoreError::DocumentNotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Core(CoreError::Generation(_)) => StatusCode::BAD_GATEWAY,
            Self::BindError { .. } | Self::Config(_) | Self::Serve(_) | Self::Core(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
