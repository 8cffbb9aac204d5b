pub mod catalog;
pub mod chat_completion;

use std::sync::Arc;

use axum::http::StatusCode;
use futures::stream::BoxStream;
use tracing::debug;

use crate::auth::AuthContext;
use crate::config::ServerConfig;
use crate::protocol::{InitializeParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::reassembler::Frame;
use crate::upstream::ChatBackend;

/// Per-request facts the HTTP layer derives before dispatch.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// The client's `Accept` header names `text/event-stream`.
    pub wants_stream: bool,
    pub auth: AuthContext,
}

/// What the HTTP layer should send back.
pub enum DispatchOutcome {
    /// A single JSON-RPC response.
    Json {
        status: StatusCode,
        response: JsonRpcResponse,
    },
    /// Notification or client response: 202, empty body.
    Accepted,
    /// Live SSE stream of progress notifications and one terminal frame.
    Stream(BoxStream<'static, Frame>),
}

impl DispatchOutcome {
    pub fn json(response: JsonRpcResponse) -> Self {
        Self::Json { status: StatusCode::OK, response }
    }
}

/// Routes one JSON-RPC message to its handler.
///
/// Holds only read-only configuration and the upstream backend; every call
/// is independent.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<ServerConfig>,
    backend: Arc<dyn ChatBackend>,
}

impl Dispatcher {
    pub fn new(config: Arc<ServerConfig>, backend: Arc<dyn ChatBackend>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Parse a raw request body and dispatch it.
    pub async fn dispatch_bytes(&self, body: &[u8], ctx: &RequestContext) -> DispatchOutcome {
        let value: serde_json::Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "request body is not JSON");
                return DispatchOutcome::json(JsonRpcResponse::error(
                    None,
                    JsonRpcError::parse_error(),
                ));
            }
        };

        let req: JsonRpcRequest = match serde_json::from_value(value.clone()) {
            Ok(r) => r,
            Err(e) => {
                let id = value
                    .get("id")
                    .and_then(|id| serde_json::from_value(id.clone()).ok());
                return DispatchOutcome::json(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request_with(format!("Invalid Request: {e}")),
                ));
            }
        };

        self.dispatch(&req, ctx).await
    }

    /// Dispatch a parsed JSON-RPC message.
    pub async fn dispatch(&self, req: &JsonRpcRequest, ctx: &RequestContext) -> DispatchOutcome {
        // Validate jsonrpc version
        if req.jsonrpc != "2.0" {
            return DispatchOutcome::json(JsonRpcResponse::error(
                req.id.clone(),
                JsonRpcError::invalid_request(),
            ));
        }

        if req.is_response() {
            return DispatchOutcome::Accepted;
        }

        let Some(method) = req.method.as_deref() else {
            return DispatchOutcome::json(JsonRpcResponse::error(
                req.id.clone(),
                JsonRpcError::invalid_request(),
            ));
        };
        debug!(method, notification = req.is_notification(), "dispatching");

        match method {
            "initialize" => {
                if let Some(params) = req
                    .params
                    .as_ref()
                    .and_then(|p| serde_json::from_value::<InitializeParams>(p.clone()).ok())
                {
                    debug!(
                        client = params.client_info.as_ref().and_then(|c| c.name.as_deref()),
                        requested = params.protocol_version.as_deref(),
                        "initialize"
                    );
                }
                let result = serde_json::json!({
                    "protocolVersion": self.config.protocol_version,
                    "capabilities": {
                        "tools": {}
                    },
                    "serverInfo": {
                        "name": "mcp-chat-bridge",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                });
                DispatchOutcome::json(JsonRpcResponse::success(req.id.clone(), result))
            }

            "notifications/initialized" => DispatchOutcome::Accepted,

            m if m.starts_with("notifications/") && req.is_notification() => {
                DispatchOutcome::Accepted
            }

            "ping" => DispatchOutcome::json(JsonRpcResponse::success(
                req.id.clone(),
                serde_json::json!({}),
            )),

            "tools/list" => {
                DispatchOutcome::json(JsonRpcResponse::success(req.id.clone(), catalog::tools_list()))
            }

            "tools/call" => {
                chat_completion::handle(
                    req.id.clone(),
                    req.params.as_ref(),
                    ctx,
                    &self.config,
                    self.backend.as_ref(),
                )
                .await
            }

            _ => DispatchOutcome::json(JsonRpcResponse::error(
                req.id.clone(),
                JsonRpcError::method_not_found(method),
            )),
        }
    }
}
