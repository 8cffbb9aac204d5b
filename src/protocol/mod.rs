pub mod request;
pub mod response;

pub use request::{
    ChatToolArgs, ClientInfo, InitializeParams, JsonRpcRequest, ProgressToken, RequestMeta, RpcId,
    ToolCallParams,
};
pub use response::{
    JsonRpcError, JsonRpcNotification, JsonRpcResponse, ProgressParams, ToolResult,
    ToolResultContent,
};
