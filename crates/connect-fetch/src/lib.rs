//! The fetch flow: ask the design bridge about a node, shape the answer into
//! a [`FetchResult`] and make it the current component or frame.

use connect_config::BridgeSettings;
use connect_core::snippet;
use connect_core::{FetchResult, FrameFetchResult, NodeId, Result};
use connect_mcp::{BridgeError, DesignBridge, NodeRequest};
use connect_store::{process_frame, Store};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use watcher::RequestWatcher;

/// A saved fetch and where it was written
#[derive(Debug, Clone)]
pub struct Saved<T> {
    pub result: T,
    pub path: PathBuf,
}

pub struct Fetcher {
    bridge: Arc<dyn DesignBridge>,
    store: Store,
    client_name: String,
    client_frameworks: String,
    client_languages: String,
}

impl Fetcher {
    pub fn new(bridge: Arc<dyn DesignBridge>, store: Store) -> Self {
        let defaults = NodeRequest::new("");
        Self {
            bridge,
            store,
            client_name: defaults.client_name,
            client_frameworks: defaults.client_frameworks,
            client_languages: defaults.client_languages,
        }
    }

    pub fn with_client(mut self, settings: &BridgeSettings) -> Self {
        self.client_name = settings.client_name.clone();
        self.client_frameworks = settings.client_frameworks.clone();
        self.client_languages = settings.client_languages.clone();
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn bridge_available(&self) -> bool {
        self.bridge.is_available()
    }

    fn node_request(&self, node_id: &NodeId) -> NodeRequest {
        NodeRequest::new(node_id.as_str()).with_client(
            self.client_name.as_str(),
            self.client_frameworks.as_str(),
            self.client_languages.as_str(),
        )
    }

    /// Fetch one node. Never fails: bridge errors end up in `error`.
    pub async fn fetch(&self, node_id: &NodeId) -> FetchResult {
        let mut result = FetchResult::new(node_id.clone());

        if !self.bridge.is_available() {
            warn!("Design bridge unavailable, recording error for {}", node_id);
            result.error = Some(BridgeError::Unavailable.to_string());
            return result;
        }

        let request = self.node_request(node_id);
        match self.call_bridge(&request).await {
            Ok((mapping, code)) => {
                result.variants = mapping
                    .as_ref()
                    .and_then(|m| m.get("variants"))
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                result.published_code = Some(snippet::extract(code.as_deref()));
                result.mapping = mapping;
                result.code = code;
                result.refresh_published();

                info!(
                    "Fetched {}: mapping={}, code={}, variants={}, published={}",
                    node_id,
                    result.mapping.is_some(),
                    result.code.is_some(),
                    result.variants.len(),
                    result.published
                );
            }
            Err(e) => {
                warn!("Fetch failed for {}: {}", node_id, e);
                result.error = Some(e.to_string());
            }
        }

        result
    }

    async fn call_bridge(
        &self,
        request: &NodeRequest,
    ) -> std::result::Result<(Option<Value>, Option<String>), BridgeError> {
        debug!("Getting Code Connect mapping for {}", request.node_id);
        let mapping = self.bridge.get_code_connect_map(request).await?;

        debug!("Getting code for {}", request.node_id);
        let code = self
            .bridge
            .get_code(request)
            .await?
            .filter(|code| !code.is_empty());

        let mapping = match mapping {
            Value::Null => None,
            other => Some(other),
        };
        Ok((mapping, code))
    }

    /// Fetch a node and make it the current component
    pub async fn fetch_and_save(&self, node_id: &NodeId) -> Result<Saved<FetchResult>> {
        let result = self.fetch(node_id).await;
        let path = self.store.save_component(&result).await?;
        info!("Component {} is now the current component", node_id);
        Ok(Saved { result, path })
    }

    /// Fetch a frame node, extract its children and make it the current frame
    pub async fn fetch_frame_and_save(&self, node_id: &NodeId) -> Result<Saved<FrameFetchResult>> {
        let fetched = self.fetch(node_id).await;
        let frame = process_frame(&fetched);
        info!(
            "Frame {}: {} children, {} with code",
            node_id,
            frame.children.len(),
            frame.valid_children()
        );

        let path = self.store.save_frame(&frame).await?;
        Ok(Saved { result: frame, path })
    }
}
