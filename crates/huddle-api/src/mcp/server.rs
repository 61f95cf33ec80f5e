//! MCP JSON-RPC dispatch, shared by the SSE and stdio transports.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use huddle_bus::ChatBus;
use huddle_core::{defaults, Error};

use super::protocol::{
    error_response, response, JsonRpcRequest, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND,
    PROTOCOL_VERSION,
};
use super::{prompts, resources, tools};

/// One MCP endpoint over the shared bus. Each connection gets its own
/// instance carrying the per-connection language preference.
pub struct McpServer {
    bus: Arc<ChatBus>,
    session_lang: Option<String>,
}

impl McpServer {
    pub fn new(bus: Arc<ChatBus>, session_lang: Option<String>) -> Self {
        Self { bus, session_lang }
    }

    /// Handle one JSON-RPC message. Notifications yield no response.
    ///
    /// `cancel` covers the connection lifetime: a disconnect mid-`msg_wait`
    /// resolves the wait instead of leaking it.
    pub async fn handle(&self, req: JsonRpcRequest, cancel: &CancellationToken) -> Option<Value> {
        if req.is_notification() {
            tracing::debug!(method = %req.method, "MCP notification");
            return None;
        }
        let id = req.id.clone().unwrap_or(Value::Null);

        let result = match req.method.as_str() {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {},
                    "resources": {},
                    "prompts": {},
                },
                "serverInfo": {
                    "name": "huddle",
                    "version": defaults::BUS_VERSION,
                },
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({"tools": tools::tool_list()})),
            "tools/call" => return Some(self.handle_tool_call(id, &req.params, cancel).await),
            "resources/list" => resources::resource_list(&self.bus)
                .await
                .map(|resources| json!({"resources": resources})),
            "resources/read" => match req.params.get("uri").and_then(Value::as_str) {
                Some(uri) => resources::read_resource(&self.bus, self.session_lang.as_deref(), uri)
                    .await
                    .map(|(mime_type, text)| {
                        json!({
                            "contents": [{"uri": uri, "mimeType": mime_type, "text": text}]
                        })
                    }),
                None => Err(Error::InvalidInput("Missing 'uri' parameter".into())),
            },
            "prompts/list" => Ok(json!({"prompts": prompts::prompt_list()})),
            "prompts/get" => match req.params.get("name").and_then(Value::as_str) {
                Some(name) => prompts::get_prompt(
                    name,
                    req.params.get("arguments").unwrap_or(&Value::Null),
                ),
                None => Err(Error::InvalidInput("Missing 'name' parameter".into())),
            },
            other => {
                return Some(error_response(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Unknown method: {}", other),
                ))
            }
        };

        Some(match result {
            Ok(result) => response(id, result),
            Err(Error::InvalidInput(msg)) => error_response(id, INVALID_PARAMS, msg),
            Err(e) => error_response(id, INTERNAL_ERROR, e.to_string()),
        })
    }

    /// Tool calls report domain failures inside the tool result (`isError`)
    /// rather than as protocol errors, so agents can read the reason.
    async fn handle_tool_call(&self, id: Value, params: &Value, cancel: &CancellationToken) -> Value {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return error_response(id, INVALID_PARAMS, "Missing tool name");
        };
        let args = params.get("arguments").cloned().unwrap_or(json!({}));

        match tools::dispatch_tool(&self.bus, self.session_lang.as_deref(), name, &args, cancel)
            .await
        {
            Ok(payload) => response(
                id,
                json!({
                    "content": [{"type": "text", "text": payload.to_string()}],
                    "isError": false,
                }),
            ),
            Err(e) => {
                tracing::debug!(tool = name, error = %e, "tool call failed");
                let body = json!({"error": e.to_string(), "kind": e.kind()});
                response(
                    id,
                    json!({
                        "content": [{"type": "text", "text": body.to_string()}],
                        "isError": true,
                    }),
                )
            }
        }
    }
}
