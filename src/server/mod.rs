//! HTTP server
//!
//! Serves the single-page UI plus the JSON API:
//!
//! - `GET /`, `GET /health`, `GET /api/media-kinds`
//! - `POST /api/chat/sessions`, `GET|DELETE /api/chat/sessions/{id}`
//! - `POST /api/chat/sessions/{id}/messages`
//! - `POST /api/analyze/{kind}` (multipart `file` + `prompt`)

pub mod error;
pub mod handlers;
pub mod page;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::ai::gemini::GeminiClient;
use crate::ai::{GenAiError, GenerativeBackend};
use crate::config::Config;
use crate::media::Analyzer;
use crate::session::SessionStore;

pub use error::ApiError;

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid listen address '{addr}': {message}")]
    InvalidAddress { addr: String, message: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Backend(#[from] GenAiError),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn GenerativeBackend>,
    pub analyzer: Analyzer,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn GenerativeBackend>) -> Self {
        let analyzer = Analyzer::new(backend.clone(), &config);
        let sessions = Arc::new(SessionStore::new(&config.sessions));
        Self {
            config: Arc::new(config),
            backend,
            analyzer,
            sessions,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/media-kinds", get(handlers::media_kinds))
        .route("/api/chat/sessions", post(handlers::create_session))
        .route(
            "/api/chat/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/api/chat/sessions/{id}/messages",
            post(handlers::send_message),
        )
        .route("/api/analyze/{kind}", post(handlers::analyze))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server until Ctrl-C.
pub async fn serve(config: Config) -> Result<(), ServerError> {
    let listen = config.listen_addr();
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e: std::net::AddrParseError| ServerError::InvalidAddress {
            addr: listen.clone(),
            message: e.to_string(),
        })?;

    let backend: Arc<dyn GenerativeBackend> = Arc::new(GeminiClient::from_config(&config)?);
    let state = AppState::new(config, backend);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    tracing::info!(address = %addr, "genai-studio listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
