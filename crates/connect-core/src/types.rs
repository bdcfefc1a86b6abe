use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::figma_url::NodeId;

/// Source tag written into every persisted result
pub const FETCH_SOURCE: &str = "figma-mcp";

fn default_source() -> String {
    FETCH_SOURCE.to_string()
}

/// Result of fetching one design node through the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub node_id: NodeId,
    pub mapping: Option<Value>,
    pub code: Option<String>,
    #[serde(default)]
    pub variants: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_code: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_source")]
    pub source: String,
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchResult {
    /// Empty, unpublished result stamped with the current time
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            mapping: None,
            code: None,
            variants: Vec::new(),
            published_code: None,
            timestamp: Utc::now(),
            source: default_source(),
            published: false,
            error: None,
        }
    }

    /// Recompute `published` from `mapping` and `code`
    pub fn refresh_published(&mut self) {
        self.published = mapping_has_content(self.mapping.as_ref())
            || self.code.as_deref().map_or(false, |c| !c.is_empty());
    }

    /// Whether the record is younger than `max_age`
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        is_fresh(self.timestamp, max_age)
    }

    /// Declared component name from the mapping, if any.
    ///
    /// Looks at a top-level `component` field first, then at the first
    /// entry of a node-keyed mapping (`componentName`, then `codeConnectName`).
    pub fn declared_component_name(&self) -> Option<String> {
        let mapping = self.mapping.as_ref()?.as_object()?;

        if let Some(name) = mapping.get("component").and_then(Value::as_str) {
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }

        let (_, first) = mapping.iter().next()?;
        ["componentName", "codeConnectName"]
            .iter()
            .filter_map(|key| first.get(*key).and_then(Value::as_str))
            .find(|name| !name.is_empty())
            .map(str::to_string)
    }
}

/// True when a mapping value carries anything worth calling published
pub fn mapping_has_content(mapping: Option<&Value>) -> bool {
    match mapping {
        None | Some(Value::Null) => false,
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

pub fn is_fresh(timestamp: DateTime<Utc>, max_age: Duration) -> bool {
    Utc::now().signed_duration_since(timestamp) < max_age
}

/// One Code Connect child inside a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildComponent {
    pub node_id: String,
    pub component_name: String,
    pub snippet: String,
    #[serde(default)]
    pub imports: Vec<String>,
    pub published_code: String,
}

/// Result of fetching a frame (a container node) through the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameFetchResult {
    pub frame_node_id: NodeId,
    pub frame_code: Option<String>,
    pub children: Vec<ChildComponent>,
    #[serde(default)]
    pub imports: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_source")]
    pub source: String,
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameFetchResult {
    pub fn valid_children(&self) -> usize {
        self.children
            .iter()
            .filter(|c| !c.published_code.trim().is_empty())
            .count()
    }
}

/// FetchResult joined with whatever local source could be found for it.
/// Built per request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedComponentView {
    pub node_id: NodeId,
    pub figma_data: Option<FetchResult>,
    pub component_name: String,
    pub react_code: Option<String>,
    pub react_path: Option<String>,
    pub code_connect_file: Option<String>,
    pub code_connect_path: Option<String>,
    pub published: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Completed,
    Failed,
}

/// Ephemeral marker asking the watcher to fetch a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMarker {
    pub node_id: NodeId,
    pub requested_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub request_id: String,
}

impl RequestMarker {
    pub fn pending(node_id: NodeId) -> Self {
        let requested_at = Utc::now();
        let request_id = format!(
            "req_{}_{}",
            requested_at.timestamp_millis(),
            node_id.file_stem()
        );
        Self {
            node_id,
            requested_at,
            status: RequestStatus::Pending,
            request_id,
        }
    }
}
