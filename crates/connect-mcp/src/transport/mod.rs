//! Transports carrying JSON-RPC between the bridge and a design-tool MCP server.
//!
//! - Stdio: the server is a child process speaking line-delimited JSON
//! - SSE: the server is an HTTP endpoint (Figma's Dev Mode server listens on
//!   `http://127.0.0.1:3845/sse`)

use async_trait::async_trait;
use connect_core::Result;
use std::fmt::Debug;

use crate::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

pub mod sse;
pub mod stdio;

pub use sse::SseTransport;
pub use stdio::StdioTransport;

#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<()>;

    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()>;

    /// Next response if one is ready; `Ok(None)` means try again later
    async fn receive_response(&mut self) -> Result<Option<JsonRpcResponse>>;

    async fn is_connected(&self) -> bool;

    async fn close(&mut self) -> Result<()>;
}

/// Resolve `${VAR}` and `${VAR:-default}` values used in env and header maps
pub(crate) fn resolve_env_value(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let inner = &value[2..value.len() - 1];
        if let Some((var_name, default)) = inner.split_once(":-") {
            std::env::var(var_name).unwrap_or_else(|_| default.to_string())
        } else {
            std::env::var(inner).unwrap_or_else(|_| value.to_string())
        }
    } else {
        value.to_string()
    }
}
