use serde_json::{json, Value};

/// Name of the single tool this server exposes.
pub const TOOL_NAME: &str = "chat_completion";

/// JSON Schema for `chat_completion` arguments.
pub fn input_schema() -> Value {
    json!({
        "type": "object",
        "required": ["prompt"],
        "properties": {
            "prompt": {
                "type": "string",
                "minLength": 1,
                "description": "The prompt to send to the chat model"
            },
            "model": {
                "type": "string",
                "description": "Model to use instead of the server default"
            }
        }
    })
}

/// `tools/list` result.
pub fn tools_list() -> Value {
    json!({
        "tools": [
            {
                "name": TOOL_NAME,
                "title": "Chat Completion",
                "description": "Generate chat completion using the configured model",
                "inputSchema": input_schema()
            }
        ]
    })
}
