//! HTTP surface over the chat core.

mod api;
mod error;
mod handlers;
mod http;

pub use api::{ChatQuery, ErrorResponse, UploadRequest, UploadResponse};
pub use error::ServerError;
pub use handlers::{AppState, DOCUMENT_CATEGORY, SERVICE_CATEGORY};
pub use http::ChatServer;
