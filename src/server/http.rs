//! Chat HTTP server with axum router and graceful shutdown.

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::ServerError;
use super::handlers::{
    get_conversations, get_document_chat, get_messages, get_service_chat, post_document_upload,
    AppState, DOCUMENT_CATEGORY,
};
use crate::config::ServerConfig;

/// HTTP server exposing the chat core.
pub struct ChatServer {
    config: ServerConfig,
    state: AppState,
    cancel: CancellationToken,
}

impl ChatServer {
    /// Create a new server with default configuration.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self {
            config: ServerConfig::default(),
            state,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the server configuration (builder pattern).
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an externally owned shutdown token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the server when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get the configured address as a string.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Build the axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/ai/service", get(get_service_chat))
            .route("/ai/pdf/chat", get(get_document_chat))
            .route("/ai/pdf/upload/:chat_id", post(post_document_upload))
            .route("/ai/history/:category", get(get_conversations))
            .route("/ai/history/:category/:chat_id", get(get_messages))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.cors_permissive {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Check that the `/ai/pdf` routes will be grounded on uploaded documents.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the retrieval config does not treat
    /// the document route category as document-grounded.
    pub fn validate(&self) -> Result<(), ServerError> {
        let retrieval = self.state.core.retrieval();
        if retrieval.is_document_category(DOCUMENT_CATEGORY) {
            return Ok(());
        }
        Err(ServerError::Config(format!(
            "retrieval.document_categories {:?} must include \"{DOCUMENT_CATEGORY}\"",
            retrieval.document_categories
        )))
    }

    /// Validate the configuration and bind the configured address.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if [`Self::validate`] fails, or
    /// `ServerError::BindError` if the address cannot be bound.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        self.validate()?;
        let address = self.address();
        TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::BindError { address, source })
    }

    /// Serve on an already bound listener until the cancellation token fires.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let cancel = self.cancel.clone();
        let app = self.build_router();

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Starting chat server");
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                tracing::info!("Chat server shutting down gracefully");
            })
            .await
    }

    /// Bind and serve until the cancellation token fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await.map_err(ServerError::Serve)
    }
}
