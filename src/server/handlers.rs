//! HTTP handlers for the chat API.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::api::{ChatQuery, UploadRequest, UploadResponse};
use super::error::ServerError;
use crate::ai::ChatModel;
use crate::history::{ConversationKey, Message};
use crate::pipeline::ChatCore;

/// Category of customer-service conversations.
pub const SERVICE_CATEGORY: &str = "service";

/// Category of document QA conversations.
pub const DOCUMENT_CATEGORY: &str = "pdf";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<ChatCore>,
    pub model: Arc<dyn ChatModel>,
}

impl AppState {
    #[must_use]
    pub fn new(core: Arc<ChatCore>, model: Arc<dyn ChatModel>) -> Self {
        Self { core, model }
    }
}

fn require(field: &str, value: &str) -> Result<(), ServerError> {
    if value.trim().is_empty() {
        return Err(ServerError::InvalidRequest(format!("{field} must not be blank")));
    }
    Ok(())
}

async fn stream_chat(
    state: &AppState,
    category: &str,
    query: ChatQuery,
) -> Result<Response, ServerError> {
    require("prompt", &query.prompt)?;
    require("chatId", &query.chat_id)?;

    let key = ConversationKey::new(category, query.chat_id);
    let reply = state
        .core
        .chat(&key, &query.prompt, state.model.as_ref())
        .await?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(reply),
    )
        .into_response())
}

/// GET /ai/service - Stream a customer-service reply.
pub async fn get_service_chat(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
) -> Result<Response, ServerError> {
    stream_chat(&state, SERVICE_CATEGORY, query).await
}

/// GET /ai/pdf/chat - Stream a reply grounded on the uploaded document.
pub async fn get_document_chat(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
) -> Result<Response, ServerError> {
    stream_chat(&state, DOCUMENT_CATEGORY, query).await
}

/// POST /ai/pdf/upload/:chatId - Store extracted document text.
pub async fn post_document_upload(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ServerError> {
    require("chatId", &chat_id)?;
    require("text", &request.text)?;

    let key = ConversationKey::new(DOCUMENT_CATEGORY, chat_id);
    let document = state
        .core
        .upload_document(&key, request.file_name, &request.text)
        .await?;
    Ok(Json(UploadResponse::from(&document)))
}

/// GET /ai/history/:category - List conversation ids.
pub async fn get_conversations(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<String>>, ServerError> {
    Ok(Json(state.core.conversations(&category).await?))
}

/// GET /ai/history/:category/:chatId - List messages of one conversation.
pub async fn get_messages(
    State(state): State<AppState>,
    Path((category, chat_id)): Path<(String, String)>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let key = ConversationKey::new(category, chat_id);
    Ok(Json(state.core.messages(&key).await?))
}
