pub mod bridge;
pub mod client;
pub mod config;
pub mod transport;
pub mod types;

pub use bridge::{
    connect_bridge, BridgeError, DesignBridge, McpDesignBridge, NodeRequest, UnavailableBridge,
    BRIDGE_UNAVAILABLE,
};
pub use client::McpClient;
pub use config::McpServerConfig;
pub use transport::Transport;
