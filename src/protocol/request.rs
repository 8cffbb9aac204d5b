use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 ID: a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    Str(String),
}

/// MCP progress token, opaque to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    Number(i64),
    Str(String),
}

/// Inbound JSON-RPC 2.0 message.
///
/// Requests carry `method` and `id`, notifications carry `method` only.
/// Clients may also post responses (`result` / `error`, no `method`).
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<RpcId>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.method.is_some() && self.id.is_none()
    }

    pub fn is_response(&self) -> bool {
        self.method.is_none() && (self.result.is_some() || self.error.is_some())
    }
}

/// MCP `initialize` params.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(rename = "clientInfo")]
    pub client_info: Option<ClientInfo>,
}

/// Client information sent during `initialize`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// Parameters for `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    pub arguments: Option<serde_json::Value>,
    #[serde(rename = "_meta")]
    pub meta: Option<RequestMeta>,
}

impl ToolCallParams {
    /// Progress token from `params._meta`, falling back to `arguments._meta`.
    pub fn progress_token(&self) -> Option<ProgressToken> {
        if let Some(token) = self.meta.as_ref().and_then(|m| m.progress_token.clone()) {
            return Some(token);
        }
        self.arguments
            .as_ref()
            .and_then(|args| args.get("_meta"))
            .and_then(|meta| serde_json::from_value::<RequestMeta>(meta.clone()).ok())
            .and_then(|meta| meta.progress_token)
    }
}

/// Request metadata attached to `tools/call`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestMeta {
    #[serde(rename = "progressToken")]
    pub progress_token: Option<ProgressToken>,
}

/// Arguments for the `chat_completion` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatToolArgs {
    pub prompt: String,
    pub model: Option<String>,
}
