//! Tool-invocation transport: JSON-RPC 2.0 over `POST /mcp`.
//!
//! Supports `initialize`, `tools/list` and `tools/call`. The
//! `linkedin_request` tool forwards `{service_name, method, parameters}` to
//! the registry and returns the serialized [`ServiceResponse`] as text.
//!
//! Error codes:
//! - `-32601`: unknown JSON-RPC method
//! - `-32602`: unknown tool or bad arguments
//! - `-32603`: response could not be serialized

use crate::api::AppState;
use crate::registry::ServiceRegistry;
use crate::types::{Parameters, ServiceRequest, ServiceResponse};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "linkgate";

pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent for notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct EchoArgs {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ServiceCallArgs {
    service_name: String,
    method: String,
    #[serde(default)]
    parameters: Option<Parameters>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl ToolCallResult {
    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text,
            }],
            is_error,
        }
    }
}

/// Tools advertised by `tools/list`.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "echo".to_string(),
            description: "Echo a message back".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string" }
                },
                "required": ["message"]
            }),
        },
        ToolDefinition {
            name: "linkedin_request".to_string(),
            description: "Execute LinkedIn API requests through the service registry".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "service_name": { "type": "string" },
                    "method": { "type": "string" },
                    "parameters": { "type": "object" }
                },
                "required": ["service_name", "method"]
            }),
        },
    ]
}

/// POST /mcp
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    if request.id.is_none() {
        debug!(method = %request.method, "Tool protocol notification");
        return StatusCode::ACCEPTED.into_response();
    }
    Json(handle_request(&state.registry, request).await).into_response()
}

/// Answers one JSON-RPC request.
pub async fn handle_request(registry: &ServiceRegistry, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.unwrap_or(Value::Null);
    debug!(method = %request.method, "Tool protocol request");

    match request.method.as_str() {
        "initialize" => JsonRpcResponse::result(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        ),
        "tools/list" => JsonRpcResponse::result(id, json!({ "tools": tool_definitions() })),
        "tools/call" => call_tool(registry, id, request.params).await,
        other => {
            warn!(method = %other, "Unknown tool protocol method");
            JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other))
        }
    }
}

async fn call_tool(registry: &ServiceRegistry, id: Value, params: Option<Value>) -> JsonRpcResponse {
    let params: ToolCallParams = match serde_json::from_value(params.unwrap_or(Value::Null)) {
        Ok(p) => p,
        Err(e) => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e))
        }
    };
    let arguments = params.arguments.unwrap_or_else(|| json!({}));

    let result = match params.name.as_str() {
        "echo" => match serde_json::from_value::<EchoArgs>(arguments) {
            Ok(args) => ToolCallResult::text(format!("Echo: {}", args.message), false),
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid arguments: {}", e))
            }
        },
        "linkedin_request" => {
            let args = match serde_json::from_value::<ServiceCallArgs>(arguments) {
                Ok(args) => args,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        format!("Invalid arguments: {}", e),
                    )
                }
            };
            let request = ServiceRequest::new(args.service_name, args.method)
                .with_params(args.parameters.unwrap_or_default());
            let response: ServiceResponse = registry.dispatch(request).await;

            match serde_json::to_string(&response) {
                Ok(text) => ToolCallResult::text(text, !response.success),
                Err(e) => return JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
            }
        }
        other => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {}", other))
        }
    };

    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::result(id, value),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
    }
}
