use axum::http::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::handlers::catalog::{self, TOOL_NAME};
use crate::handlers::{DispatchOutcome, RequestContext};
use crate::protocol::{
    ChatToolArgs, JsonRpcError, JsonRpcResponse, RpcId, ToolCallParams, ToolResult,
};
use crate::reassembler::{reassemble, Reassembler};
use crate::schema::validate_json;
use crate::upstream::{BackendError, ChatBackend, ChatCompletionRequest};

/// Handle a `tools/call` request.
///
/// Protocol problems (bad params, unknown tool, missing credentials) become
/// JSON-RPC errors. Anything that goes wrong while running the tool becomes
/// a successful response carrying an `isError: true` tool result.
pub async fn handle(
    id: Option<RpcId>,
    params: Option<&Value>,
    ctx: &RequestContext,
    config: &ServerConfig,
    backend: &dyn ChatBackend,
) -> DispatchOutcome {
    let params: ToolCallParams = match params {
        Some(v) => match serde_json::from_value(v.clone()) {
            Ok(p) => p,
            Err(e) => {
                return invalid_params(id, format!("Invalid tools/call params: {e}"));
            }
        },
        None => return invalid_params(id, "Missing params for tools/call"),
    };

    if params.name != TOOL_NAME {
        return invalid_params(id, format!("Unknown tool: {}", params.name));
    }

    let args = match validate_arguments(params.arguments.as_ref()) {
        Ok(args) => args,
        Err(message) => return invalid_params(id, message),
    };

    if !ctx.auth.authenticated {
        debug!("rejecting unauthenticated tools/call");
        return DispatchOutcome::Json {
            status: StatusCode::UNAUTHORIZED,
            response: JsonRpcResponse::error(id, JsonRpcError::unauthorized()),
        };
    }

    let model = args.model.unwrap_or_else(|| config.upstream.model.clone());
    let request = ChatCompletionRequest::single_prompt(model, args.prompt, ctx.wants_stream);

    match run(id.clone(), &params, &request, ctx, backend).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "chat completion failed");
            tool_result(
                id,
                ToolResult::error(format!("Error executing chat completion: {e}")),
            )
        }
    }
}

async fn run(
    id: Option<RpcId>,
    params: &ToolCallParams,
    request: &ChatCompletionRequest,
    ctx: &RequestContext,
    backend: &dyn ChatBackend,
) -> Result<DispatchOutcome, BackendError> {
    let reply = backend.send(request, ctx.auth.access_token.as_deref()).await?;

    if !reply.is_success() {
        let status = reply.status;
        let reason = reply.reason.clone();
        let body = reply.text().await.unwrap_or_else(|e| e.to_string());
        warn!(status, "upstream returned an error status");
        return Ok(tool_result(
            id,
            ToolResult::error(format!("Error: {status} {reason}\n{body}")),
        ));
    }

    if request.stream && reply.is_event_stream() {
        let state = Reassembler::new(id, params.progress_token());
        return Ok(DispatchOutcome::Stream(reassemble(reply.body, state)));
    }

    let completion = reply.completion().await?;
    Ok(tool_result(id, ToolResult::text(completion.first_content())))
}

/// Check arguments: prompt present and non-empty, then the advertised schema.
fn validate_arguments(arguments: Option<&Value>) -> Result<ChatToolArgs, String> {
    const MISSING_PROMPT: &str = "Missing required parameter: prompt";

    let arguments = arguments.ok_or(MISSING_PROMPT)?;
    match arguments.get("prompt") {
        None | Some(Value::Null) => return Err(MISSING_PROMPT.into()),
        Some(Value::String(s)) if s.is_empty() => return Err(MISSING_PROMPT.into()),
        _ => {}
    }

    validate_json(&catalog::input_schema(), arguments)
        .map_err(|e| format!("Invalid arguments for {TOOL_NAME}: {e}"))?;

    serde_json::from_value(arguments.clone())
        .map_err(|e| format!("Invalid arguments for {TOOL_NAME}: {e}"))
}

fn invalid_params(id: Option<RpcId>, message: impl Into<String>) -> DispatchOutcome {
    DispatchOutcome::json(JsonRpcResponse::error(id, JsonRpcError::invalid_params(message)))
}

fn tool_result(id: Option<RpcId>, result: ToolResult) -> DispatchOutcome {
    DispatchOutcome::json(JsonRpcResponse::tool_result(id, result))
}
