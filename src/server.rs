use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{self, Authorizer};
use crate::config::ServerConfig;
use crate::handlers::{DispatchOutcome, Dispatcher, RequestContext};
use crate::upstream::{BackendError, ChatBackend, HttpChatBackend};

/// Maximum bytes per JSON-RPC message (1 MiB).
const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

const ALLOW_METHODS: &str = "POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, Accept";
const PREFLIGHT_MAX_AGE: &str = "86400";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("cannot build upstream client: {0}")]
    Backend(#[from] BackendError),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state of the HTTP layer.
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub authorizer: Arc<dyn Authorizer>,
}

/// Build the `/mcp` router. Any other path gets connection instructions.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp).options(preflight))
        .fallback(landing)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_MESSAGE_BYTES))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
        .layer(TraceLayer::new_for_http())
}

/// MCP server speaking JSON-RPC 2.0 over HTTP POST.
pub struct McpServer {
    config: Arc<ServerConfig>,
    state: Arc<AppState>,
}

impl McpServer {
    /// Server backed by the HTTP upstream described in `config`.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let backend = HttpChatBackend::new(&config.upstream)?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    /// Server backed by an arbitrary [`ChatBackend`].
    pub fn with_backend(config: ServerConfig, backend: Arc<dyn ChatBackend>) -> Self {
        let config = Arc::new(config);
        let state = Arc::new(AppState {
            dispatcher: Dispatcher::new(config.clone(), backend),
            authorizer: auth::from_mode(&config.auth),
        });
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        info!(
            addr = %self.config.listen_addr,
            upstream = %self.config.upstream.endpoint(),
            model = %self.config.upstream.model,
            "MCP bridge listening on /mcp"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("MCP bridge stopped");
        Ok(())
    }
}

async fn handle_mcp(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let ctx = RequestContext {
        wants_stream: accepts_event_stream(&headers),
        auth: state.authorizer.authorize(&headers),
    };

    match state.dispatcher.dispatch_bytes(&body, &ctx).await {
        DispatchOutcome::Json { status, response } => (status, Json(response)).into_response(),
        DispatchOutcome::Accepted => StatusCode::ACCEPTED.into_response(),
        DispatchOutcome::Stream(frames) => {
            Sse::new(frames.map(|frame| Event::default().json_data(frame))).into_response()
        }
    }
}

async fn preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        [(header::ACCESS_CONTROL_MAX_AGE, PREFLIGHT_MAX_AGE)],
    )
        .into_response()
}

async fn landing(headers: HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!("Connect 'npx @modelcontextprotocol/inspector' with http://{host}/mcp")
}

/// Whether the client's `Accept` header names `text/event-stream`.
pub fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("text/event-stream"))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
