//! Shared fixtures: an in-memory [`ChatBackend`] and dispatch helpers.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{json, Value};

use mcp_chat_bridge::auth::AuthContext;
use mcp_chat_bridge::config::{AuthMode, ServerConfig, UpstreamConfig, DEFAULT_PROTOCOL_VERSION};
use mcp_chat_bridge::handlers::{DispatchOutcome, Dispatcher, RequestContext};
use mcp_chat_bridge::upstream::{BackendError, ChatBackend, ChatCompletionRequest, UpstreamReply};

pub fn test_config() -> ServerConfig {
    ServerConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
        upstream: UpstreamConfig {
            api_key: "sk-test".into(),
            base_path: "http://upstream.invalid/v1".into(),
            model: "test-model".into(),
            timeout: Duration::from_secs(5),
        },
        auth: AuthMode::Open,
    }
}

/// One recorded upstream call.
#[derive(Debug, Clone)]
pub struct Call {
    pub request: ChatCompletionRequest,
    pub bearer: Option<String>,
}

#[derive(Debug, Clone)]
enum Script {
    Reply {
        status: u16,
        content_type: &'static str,
        chunks: Vec<Result<Vec<u8>, String>>,
    },
    Unreachable(String),
}

/// Backend that replays a fixed reply and records every request.
pub struct ScriptedBackend {
    script: Script,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self { script, calls: Mutex::new(Vec::new()) })
    }

    /// A non-streaming JSON reply.
    pub fn json(status: u16, body: impl Into<String>) -> Arc<Self> {
        Self::new(Script::Reply {
            status,
            content_type: "application/json",
            chunks: vec![Ok(body.into().into_bytes())],
        })
    }

    /// A plain-text reply, as error pages usually are.
    pub fn text(status: u16, body: impl Into<String>) -> Arc<Self> {
        Self::new(Script::Reply {
            status,
            content_type: "text/plain",
            chunks: vec![Ok(body.into().into_bytes())],
        })
    }

    /// A 200 SSE reply delivered as the given chunks.
    pub fn sse(chunks: &[&str]) -> Arc<Self> {
        Self::new(Script::Reply {
            status: 200,
            content_type: "text/event-stream",
            chunks: chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect(),
        })
    }

    /// A 200 SSE reply whose body fails after the given chunks.
    pub fn sse_then_error(chunks: &[&str], error: &str) -> Arc<Self> {
        let mut body: Vec<Result<Vec<u8>, String>> =
            chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
        body.push(Err(error.to_string()));
        Self::new(Script::Reply { status: 200, content_type: "text/event-stream", chunks: body })
    }

    /// The request never reaches the upstream.
    pub fn unreachable(message: &str) -> Arc<Self> {
        Self::new(Script::Unreachable(message.to_string()))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn send(
        &self,
        request: &ChatCompletionRequest,
        bearer: Option<&str>,
    ) -> Result<UpstreamReply, BackendError> {
        self.calls.lock().unwrap().push(Call {
            request: request.clone(),
            bearer: bearer.map(String::from),
        });

        match self.script.clone() {
            Script::Unreachable(message) => Err(BackendError::Request(message)),
            Script::Reply { status, content_type, chunks } => Ok(UpstreamReply {
                status,
                reason: StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or_default()
                    .to_string(),
                content_type: Some(content_type.to_string()),
                body: futures::stream::iter(
                    chunks
                        .into_iter()
                        .map(|c| c.map(Bytes::from).map_err(BackendError::Stream)),
                )
                .boxed(),
            }),
        }
    }
}

pub fn dispatcher(backend: Arc<ScriptedBackend>) -> Dispatcher {
    dispatcher_with(test_config(), backend)
}

pub fn dispatcher_with(config: ServerConfig, backend: Arc<ScriptedBackend>) -> Dispatcher {
    Dispatcher::new(Arc::new(config), backend)
}

/// Authenticated, non-streaming context.
pub fn json_ctx() -> RequestContext {
    RequestContext { wants_stream: false, auth: AuthContext::granted() }
}

/// Authenticated context whose client accepts SSE.
pub fn sse_ctx() -> RequestContext {
    RequestContext { wants_stream: true, auth: AuthContext::granted() }
}

pub async fn call(dispatcher: &Dispatcher, message: Value, ctx: &RequestContext) -> DispatchOutcome {
    let body = serde_json::to_vec(&message).unwrap();
    dispatcher.dispatch_bytes(&body, ctx).await
}

/// Unwrap a JSON outcome into its status and serialized body.
pub fn expect_json(outcome: DispatchOutcome) -> (StatusCode, Value) {
    match outcome {
        DispatchOutcome::Json { status, response } => {
            (status, serde_json::to_value(&response).unwrap())
        }
        DispatchOutcome::Accepted => panic!("expected a JSON response, got 202 Accepted"),
        DispatchOutcome::Stream(_) => panic!("expected a JSON response, got a stream"),
    }
}

/// Drain a streaming outcome into serialized frames.
pub async fn expect_stream(outcome: DispatchOutcome) -> Vec<Value> {
    match outcome {
        DispatchOutcome::Stream(frames) => frames
            .map(|frame| serde_json::to_value(&frame).unwrap())
            .collect()
            .await,
        DispatchOutcome::Json { response, .. } => {
            panic!("expected a stream, got {}", serde_json::to_string(&response).unwrap())
        }
        DispatchOutcome::Accepted => panic!("expected a stream, got 202 Accepted"),
    }
}

/// One upstream SSE line carrying a content delta.
pub fn delta(content: &str) -> String {
    format!("data: {}\n\n", json!({ "choices": [{ "index": 0, "delta": { "content": content } }] }))
}

pub fn tool_call(id: i64, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": "chat_completion", "arguments": arguments }
    })
}
