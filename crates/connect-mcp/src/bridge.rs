//! The design-bridge capability.
//!
//! A [`DesignBridge`] answers two questions about a design node: which code
//! components it maps to, and what code the design tool generates for it.
//! It is injected wherever a fetch happens, so fetch flows run against an
//! unreachable bridge or a test double with no other changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::McpClient;
use crate::config::McpServerConfig;

pub const CODE_CONNECT_MAP_TOOL: &str = "get_code_connect_map";
pub const GET_CODE_TOOL: &str = "get_code";

/// Message recorded when no bridge is reachable
pub const BRIDGE_UNAVAILABLE: &str =
    "Design bridge is not available. Start the Figma Dev Mode MCP server or configure bridge.server.";

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{}", BRIDGE_UNAVAILABLE)]
    Unavailable,

    #[error("Bridge call '{tool}' failed: {message}")]
    Call { tool: String, message: String },

    #[error("Bridge returned malformed data for '{tool}': {message}")]
    Malformed { tool: String, message: String },
}

/// Arguments sent with every bridge call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRequest {
    pub node_id: String,
    pub client_name: String,
    pub client_frameworks: String,
    pub client_languages: String,
}

impl NodeRequest {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            client_name: "codeconnect-bridge".to_string(),
            client_frameworks: "react".to_string(),
            client_languages: "typescript".to_string(),
        }
    }

    pub fn with_client(
        mut self,
        name: impl Into<String>,
        frameworks: impl Into<String>,
        languages: impl Into<String>,
    ) -> Self {
        self.client_name = name.into();
        self.client_frameworks = frameworks.into();
        self.client_languages = languages.into();
        self
    }
}

#[async_trait]
pub trait DesignBridge: Send + Sync {
    fn is_available(&self) -> bool;

    /// Code Connect mapping for the node; an empty object when nothing is mapped
    async fn get_code_connect_map(&self, request: &NodeRequest) -> Result<Value, BridgeError>;

    /// Generated code for the node, if the tool produced any text
    async fn get_code(&self, request: &NodeRequest) -> Result<Option<String>, BridgeError>;
}

/// Bridge used when nothing is reachable: every call fails with [`BridgeError::Unavailable`]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBridge;

#[async_trait]
impl DesignBridge for UnavailableBridge {
    fn is_available(&self) -> bool {
        false
    }

    async fn get_code_connect_map(&self, _request: &NodeRequest) -> Result<Value, BridgeError> {
        Err(BridgeError::Unavailable)
    }

    async fn get_code(&self, _request: &NodeRequest) -> Result<Option<String>, BridgeError> {
        Err(BridgeError::Unavailable)
    }
}

/// Bridge backed by a live MCP session
pub struct McpDesignBridge {
    client: Mutex<McpClient>,
}

impl McpDesignBridge {
    pub async fn connect(config: &McpServerConfig) -> Result<Self, BridgeError> {
        let call_err = |e: connect_core::ConnectError| BridgeError::Call {
            tool: "initialize".to_string(),
            message: e.to_string(),
        };

        let mut client = McpClient::connect("figma", config).await.map_err(call_err)?;
        client.initialize().await.map_err(call_err)?;

        match client.list_tools().await {
            Ok(tools) => {
                for required in [CODE_CONNECT_MAP_TOOL, GET_CODE_TOOL] {
                    if !tools.iter().any(|t| t.name == required) {
                        warn!("MCP server does not advertise tool '{}'", required);
                    }
                }
            }
            Err(e) => debug!("Could not list MCP tools: {}", e),
        }

        Ok(Self {
            client: Mutex::new(client),
        })
    }

    async fn call_text(&self, tool: &str, request: &NodeRequest) -> Result<Option<String>, BridgeError> {
        let arguments = serde_json::to_value(request).map_err(|e| BridgeError::Malformed {
            tool: tool.to_string(),
            message: e.to_string(),
        })?;

        let mut client = self.client.lock().await;
        let result = client
            .call_tool(tool, arguments)
            .await
            .map_err(|e| BridgeError::Call {
                tool: tool.to_string(),
                message: e.to_string(),
            })?;
        Ok(result.text())
    }
}

#[async_trait]
impl DesignBridge for McpDesignBridge {
    fn is_available(&self) -> bool {
        true
    }

    async fn get_code_connect_map(&self, request: &NodeRequest) -> Result<Value, BridgeError> {
        let text = match self.call_text(CODE_CONNECT_MAP_TOOL, request).await? {
            Some(text) => text,
            None => return Ok(Value::Object(Default::default())),
        };
        parse_mapping_text(&text)
    }

    async fn get_code(&self, request: &NodeRequest) -> Result<Option<String>, BridgeError> {
        self.call_text(GET_CODE_TOOL, request).await
    }
}

/// The mapping tool answers with JSON in a text part; blank text means no mapping
pub fn parse_mapping_text(text: &str) -> Result<Value, BridgeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(trimmed).map_err(|e| BridgeError::Malformed {
        tool: CODE_CONNECT_MAP_TOOL.to_string(),
        message: e.to_string(),
    })
}

/// Connect to the configured server, falling back to [`UnavailableBridge`]
pub async fn connect_bridge(server: Option<&McpServerConfig>) -> Box<dyn DesignBridge> {
    let Some(config) = server else {
        info!("No design bridge configured");
        return Box::new(UnavailableBridge);
    };

    if config.is_disabled() {
        info!("Design bridge is disabled in configuration");
        return Box::new(UnavailableBridge);
    }

    match McpDesignBridge::connect(config).await {
        Ok(bridge) => {
            info!("Design bridge connected via {}", config.transport_type());
            Box::new(bridge)
        }
        Err(e) => {
            warn!("Design bridge unavailable: {}", e);
            Box::new(UnavailableBridge)
        }
    }
}
