use async_trait::async_trait;
use connect_mcp::{BridgeError, DesignBridge, NodeRequest};
use mockall::mock;
use serde_json::Value;

mock! {
    pub Bridge {}

    #[async_trait]
    impl DesignBridge for Bridge {
        fn is_available(&self) -> bool;
        async fn get_code_connect_map(&self, request: &NodeRequest) -> Result<Value, BridgeError>;
        async fn get_code(&self, request: &NodeRequest) -> Result<Option<String>, BridgeError>;
    }
}
