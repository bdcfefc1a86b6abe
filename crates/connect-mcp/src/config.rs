//! Design-bridge server definition, in the usual `mcpServers` entry shape

use connect_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::transport::{SseTransport, StdioTransport, Transport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpServerConfig {
    /// Server launched as a child process
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        /// Per-request timeout in milliseconds
        #[serde(default = "default_timeout")]
        timeout: u64,
        #[serde(default)]
        disabled: bool,
    },

    /// Server reachable over HTTP Server-Sent Events
    Sse {
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        transport_type: Option<String>,
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default = "default_timeout")]
        timeout: u64,
        #[serde(default)]
        disabled: bool,
    },
}

fn default_timeout() -> u64 {
    30000
}

impl McpServerConfig {
    /// Figma's Dev Mode MCP server on its default local port
    pub fn figma_dev_mode() -> Self {
        McpServerConfig::Sse {
            transport_type: Some("sse".to_string()),
            url: "http://127.0.0.1:3845/sse".to_string(),
            headers: HashMap::new(),
            timeout: default_timeout(),
            disabled: false,
        }
    }

    pub fn is_disabled(&self) -> bool {
        match self {
            McpServerConfig::Stdio { disabled, .. } | McpServerConfig::Sse { disabled, .. } => {
                *disabled
            }
        }
    }

    pub fn timeout(&self) -> u64 {
        match self {
            McpServerConfig::Stdio { timeout, .. } | McpServerConfig::Sse { timeout, .. } => {
                *timeout
            }
        }
    }

    pub fn transport_type(&self) -> &str {
        match self {
            McpServerConfig::Stdio { .. } => "stdio",
            McpServerConfig::Sse { .. } => "sse",
        }
    }

    pub async fn create_transport(&self) -> Result<Box<dyn Transport>> {
        match self {
            McpServerConfig::Stdio { command, args, env, .. } => {
                let transport =
                    StdioTransport::spawn(command.clone(), args.clone(), env.clone()).await?;
                Ok(Box::new(transport))
            }
            McpServerConfig::Sse { url, headers, timeout, .. } => {
                let transport = SseTransport::connect(url.clone(), headers.clone(), *timeout).await?;
                Ok(Box::new(transport))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdio_parsing() {
        let yaml = r#"
command: npx
args: ["-y", "figma-developer-mcp", "--stdio"]
env:
  FIGMA_API_KEY: "${FIGMA_API_KEY}"
timeout: 60000
"#;
        let config: McpServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.transport_type(), "stdio");
        assert_eq!(config.timeout(), 60000);
        assert!(!config.is_disabled());
    }

    #[test]
    fn test_sse_parsing() {
        let yaml = r#"
type: sse
url: http://127.0.0.1:3845/sse
disabled: true
"#;
        let config: McpServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.transport_type(), "sse");
        assert_eq!(config.timeout(), 30000);
        assert!(config.is_disabled());
    }
}
