//! Minimal MCP client: initialize, list tools, call tools

use connect_core::{ConnectError, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::McpServerConfig;
use crate::transport::Transport;
use crate::types::{
    ClientCapabilities, ClientInfo, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpTool, ToolCallParams, ToolCallResult,
    PROTOCOL_VERSION,
};

pub struct McpClient {
    name: String,
    transport: Box<dyn Transport>,
    request_id: AtomicU64,
    timeout_ms: u64,
}

impl McpClient {
    /// Open the transport described by `config`. Call [`initialize`](Self::initialize) next.
    pub async fn connect(name: impl Into<String>, config: &McpServerConfig) -> Result<Self> {
        let transport = config.create_transport().await?;
        Ok(Self::with_transport(name, transport, config.timeout()))
    }

    pub fn with_transport(
        name: impl Into<String>,
        transport: Box<dyn Transport>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            transport,
            request_id: AtomicU64::new(1),
            timeout_ms,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn next_request_id(&self) -> String {
        self.request_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    pub async fn initialize(&mut self) -> Result<InitializeResult> {
        info!("Initializing MCP client: {}", self.name);

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo::default(),
        };
        let request = JsonRpcRequest::new(
            self.next_request_id(),
            "initialize",
            Some(serde_json::to_value(params)?),
        );

        let result: InitializeResult = self.request_result(request, "initialize").await?;
        if let Some(server) = &result.server_info {
            info!("Connected to MCP server: {} v{}", server.name, server.version);
        }

        self.transport
            .send_notification(JsonRpcNotification::new(
                "notifications/initialized",
                Some(serde_json::json!({})),
            ))
            .await?;

        Ok(result)
    }

    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        debug!("Listing tools from MCP server: {}", self.name);
        let request = JsonRpcRequest::new(self.next_request_id(), "tools/list", None);
        let result: ListToolsResult = self.request_result(request, "tools/list").await?;
        info!("MCP server '{}' offers {} tools", self.name, result.tools.len());
        Ok(result.tools)
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        debug!("Calling MCP tool '{}' on server '{}'", name, self.name);
        let params = ToolCallParams {
            name: name.to_string(),
            arguments,
        };
        let request = JsonRpcRequest::new(
            self.next_request_id(),
            "tools/call",
            Some(serde_json::to_value(params)?),
        );

        let result: ToolCallResult = self.request_result(request, name).await?;
        if result.is_error.unwrap_or(false) {
            return Err(ConnectError::Bridge(format!(
                "Tool '{}' returned an error: {}",
                name,
                result.text().unwrap_or_default()
            )));
        }
        Ok(result)
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.is_connected().await
    }

    pub async fn close(&mut self) -> Result<()> {
        debug!("Closing MCP client: {}", self.name);
        self.transport.close().await
    }

    async fn request_result<T: serde::de::DeserializeOwned>(
        &mut self,
        request: JsonRpcRequest,
        what: &str,
    ) -> Result<T> {
        let response = self.send_request(request).await?;
        if let Some(error) = response.error {
            return Err(ConnectError::Bridge(format!("{} failed: {}", what, error.message)));
        }
        let result = response
            .result
            .ok_or_else(|| ConnectError::Bridge(format!("{} response missing result", what)))?;
        Ok(serde_json::from_value(result)?)
    }

    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let request_id = request.id.clone();
        self.transport.send_request(request).await?;

        let limit = Duration::from_millis(self.timeout_ms);
        timeout(limit, self.wait_for_response(&request_id))
            .await
            .map_err(|_| {
                ConnectError::Bridge(format!(
                    "Request {} timed out after {}ms",
                    request_id, self.timeout_ms
                ))
            })?
    }

    async fn wait_for_response(&mut self, request_id: &str) -> Result<JsonRpcResponse> {
        let started = Instant::now();
        loop {
            if let Some(response) = self.transport.receive_response().await? {
                if response.id == request_id {
                    debug!("Response {} after {:?}", request_id, started.elapsed());
                    return Ok(response);
                }
                warn!(
                    "Received response for different request: {} (expected: {})",
                    response.id, request_id
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    use crate::types::JsonRpcError;

    /// Replies to each request with the next canned result
    #[derive(Debug, Default)]
    struct ScriptedTransport {
        replies: VecDeque<std::result::Result<Value, String>>,
        ready: VecDeque<JsonRpcResponse>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send_request(&mut self, request: JsonRpcRequest) -> Result<()> {
            let (result, error) = match self.replies.pop_front() {
                Some(Ok(value)) => (Some(value), None),
                Some(Err(message)) => (
                    None,
                    Some(JsonRpcError { code: -32000, message, data: None }),
                ),
                None => return Ok(()),
            };
            self.ready.push_back(JsonRpcResponse {
                jsonrpc: "2.0".into(),
                id: request.id,
                result,
                error,
            });
            Ok(())
        }

        async fn send_notification(&mut self, _notification: JsonRpcNotification) -> Result<()> {
            Ok(())
        }

        async fn receive_response(&mut self) -> Result<Option<JsonRpcResponse>> {
            Ok(self.ready.pop_front())
        }

        async fn is_connected(&self) -> bool {
            true
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn client(replies: Vec<std::result::Result<Value, String>>) -> McpClient {
        let transport = ScriptedTransport {
            replies: replies.into(),
            ..Default::default()
        };
        McpClient::with_transport("test", Box::new(transport), 200)
    }

    #[tokio::test]
    async fn test_initialize_and_call_tool() {
        let mut client = client(vec![
            Ok(serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "serverInfo": {"name": "figma", "version": "1.0"}
            })),
            Ok(serde_json::json!({"content": [{"type": "text", "text": "<Button />"}]})),
        ]);

        let init = client.initialize().await.unwrap();
        assert_eq!(init.server_info.unwrap().name, "figma");

        let result = client
            .call_tool("get_code", serde_json::json!({"nodeId": "1:2"}))
            .await
            .unwrap();
        assert_eq!(result.text().as_deref(), Some("<Button />"));
    }

    #[tokio::test]
    async fn test_tool_error_is_reported() {
        let mut client = client(vec![
            Err("node not found".into()),
            Ok(serde_json::json!({"content": [{"type": "text", "text": "boom"}], "isError": true})),
        ]);

        let err = client.call_tool("get_code", Value::Null).await.unwrap_err();
        assert!(err.to_string().contains("node not found"));

        let err = client.call_tool("get_code", Value::Null).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_times_out() {
        let mut client = client(vec![]);
        let err = client.list_tools().await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
