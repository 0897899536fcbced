//! MCP request handler.
//!
//! Transport-independent: takes one decoded [`JsonRpcRequest`] and produces
//! at most one [`JsonRpcResponse`].

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::jsonrpc::{
    INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse,
    METHOD_NOT_FOUND,
};
use super::tools::DatapointTools;

// ============================================================================
// Constants
// ============================================================================

/// Server name reported in `initialize`.
pub const SERVER_NAME: &str = "winccoa";

/// Protocol version used when the client does not send one.
const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

// ============================================================================
// Types
// ============================================================================

/// Parameters of `tools/call`.
#[derive(Debug, Deserialize)]
struct ToolsCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

// ============================================================================
// McpServer
// ============================================================================

/// Handles MCP requests using the datapoint tools.
#[derive(Debug, Clone)]
pub struct McpServer {
    tools: DatapointTools,
}

impl McpServer {
    /// Creates a server over `tools`.
    #[must_use]
    pub fn new(tools: DatapointTools) -> Self {
        Self { tools }
    }

    /// Handles one request; returns `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "invalid jsonrpc version",
            ));
        }

        let Some(id) = request.id else {
            debug!(method = %request.method, "Notification received");
            return None;
        };

        let response = match request.method.as_str() {
            "initialize" => {
                let protocol_version = request
                    .params
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL_VERSION);

                info!(protocol_version, "MCP client initialized");

                JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": protocol_version,
                        "serverInfo": {
                            "name": SERVER_NAME,
                            "version": env!("CARGO_PKG_VERSION")
                        },
                        "capabilities": {
                            "tools": {}
                        }
                    }),
                )
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                JsonRpcResponse::success(id, json!({ "tools": DatapointTools::definitions() }))
            }
            "tools/call" => self.handle_tools_call(id, request.params).await,
            other => {
                debug!(method = other, "Unknown method");
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, "method not found")
            }
        };

        Some(response)
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let params: ToolsCallParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {e}"));
            }
        };

        debug!(tool = %params.name, "Tool call");

        match self.tools.invoke(&params.name, &params.arguments).await {
            Ok(text) => JsonRpcResponse::success(
                id,
                json!({ "content": [{ "type": "text", "text": text }] }),
            ),
            Err(e) => JsonRpcResponse::error(id, INVALID_PARAMS, e.to_string()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
