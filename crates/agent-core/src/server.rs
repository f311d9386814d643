//! Tool Server
//!
//! Exposes a [`ToolRegistry`] over the line protocol in [`crate::protocol`].
//! Every handler failure (error, validation miss, panic) leaves the server as
//! an `{"error": ...}` envelope; nothing raw crosses the wire.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

use crate::error::{AgentError, Result};
use crate::protocol::{
    code, method, read_message, write_message, CallToolParams, CallToolResult, InitializeResult,
    ListToolsResult, RpcRequest, RpcResponse, ServerInfo, ToolDescriptor, JSONRPC_VERSION,
    PROTOCOL_VERSION,
};
use crate::tool::{ToolCall, ToolDefinition, ToolRegistry, ToolResult};

/// Dispatches protocol requests to a tool catalog
pub struct ToolServer {
    registry: Arc<ToolRegistry>,
    info: ServerInfo,
}

impl ToolServer {
    pub fn new(registry: ToolRegistry, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::shared(Arc::new(registry), name, version)
    }

    pub fn shared(registry: Arc<ToolRegistry>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            registry,
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
        }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Catalog in registration order. No side effects.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Invoke one tool and classify the outcome
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        match self.dispatch(call).await {
            Ok(payload) => ToolResult::from_payload(payload),
            Err(message) => ToolResult::Err(message),
        }
    }

    async fn dispatch(&self, call: &ToolCall) -> std::result::Result<Value, String> {
        tracing::debug!(tool = %call.name, "Dispatching tool call");

        let outcome = AssertUnwindSafe(self.registry.execute(call)).catch_unwind().await;
        match outcome {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(e)) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                Err(e.to_string())
            }
            Err(_) => {
                tracing::error!(tool = %call.name, "Tool handler panicked");
                Err(format!("tool '{}' failed unexpectedly", call.name))
            }
        }
    }

    /// Handle one raw protocol line. Notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<RpcResponse> {
        match serde_json::from_str::<RpcRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => Some(RpcResponse::failure(
                Value::Null,
                code::PARSE_ERROR,
                format!("Parse error: {e}"),
            )),
        }
    }

    pub async fn handle(&self, request: RpcRequest) -> Option<RpcResponse> {
        let Some(id) = request.id.clone() else {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(RpcResponse::failure(
                id,
                code::INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            ));
        }

        let response = match request.method.as_str() {
            method::INITIALIZE => {
                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.into(),
                    server_info: self.info.clone(),
                    capabilities: json!({ "tools": {} }),
                };
                to_response(id, &result)
            }
            method::LIST_TOOLS => {
                let result = ListToolsResult {
                    tools: self.registry.definitions().iter().map(ToolDescriptor::from).collect(),
                };
                to_response(id, &result)
            }
            method::CALL_TOOL => match serde_json::from_value::<CallToolParams>(request.params) {
                Ok(params) => {
                    let call = ToolCall::new(params.name, params.arguments);
                    let result = match self.dispatch(&call).await {
                        // Handler payloads go out verbatim, including
                        // error-shaped data such as `{"error": .., "products": []}`
                        Ok(payload) => {
                            let is_error = payload.get("error").is_some();
                            CallToolResult::text(ToolResult::Ok(payload).to_text(), is_error)
                        }
                        Err(message) => CallToolResult::from(&ToolResult::Err(message)),
                    };
                    to_response(id, &result)
                }
                Err(e) => RpcResponse::failure(id, code::INVALID_PARAMS, format!("Invalid params: {e}")),
            },
            other => RpcResponse::failure(id, code::METHOD_NOT_FOUND, format!("Method not found: {other}")),
        };

        Some(response)
    }

    /// Serve requests until the reader reaches EOF. Requests are handled one
    /// at a time, in arrival order.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut pending = Vec::new();
        tracing::info!(server = %self.info.name, tools = self.registry.len(), "Tool server ready");

        loop {
            let response = match read_message(&mut reader, &mut pending).await {
                Ok(Some(line)) => self.handle_line(&line).await,
                Ok(None) => break,
                // Undecodable or oversized line: answer it and keep serving
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    tracing::warn!(error = %e, "Rejected malformed message");
                    Some(RpcResponse::failure(Value::Null, code::PARSE_ERROR, format!("Parse error: {e}")))
                }
                Err(e) => return Err(e.into()),
            };
            if let Some(response) = response {
                write_message(&mut writer, &response).await?;
            }
        }

        tracing::info!(server = %self.info.name, "Client closed the channel, tool server stopping");
        Ok(())
    }
}

fn to_response<T: serde::Serialize>(id: Value, result: &T) -> RpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => RpcResponse::success(id, value),
        Err(e) => RpcResponse::failure(id, code::INTERNAL_ERROR, AgentError::from(e).to_string()),
    }
}
