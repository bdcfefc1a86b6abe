//! Joins the cached fetch result with local component sources

use chrono::Utc;
use connect_config::{AppConfig, ComponentSettings};
use connect_core::{AggregatedComponentView, FetchResult, NodeId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::store::Store;

const SOURCE_EXTENSIONS: [&str; 2] = ["tsx", "ts"];
const CODE_CONNECT_EXTENSIONS: [&str; 2] = ["figma.tsx", "figma.ts"];

/// A local file found for a component, with its path relative to the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub code: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct ComponentDataService {
    store: Store,
    project_root: PathBuf,
    known: HashMap<String, String>,
    default_name: String,
    source_dirs: Vec<PathBuf>,
}

impl ComponentDataService {
    pub fn new(store: Store, project_root: impl Into<PathBuf>, components: &ComponentSettings) -> Self {
        Self {
            store,
            project_root: project_root.into(),
            known: components.known.clone(),
            default_name: components.default_name.clone(),
            source_dirs: components.source_dirs.clone(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Store::new(&config.paths.data_dir),
            &config.paths.project_root,
            &config.components,
        )
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Configured table first, then the name the mapping declares, then the default
    pub fn resolve_component_name(&self, node_id: &NodeId, figma_data: Option<&FetchResult>) -> String {
        if let Some(name) = self.known.get(node_id.as_str()) {
            return name.clone();
        }
        figma_data
            .and_then(FetchResult::declared_component_name)
            .map(|name| name.to_lowercase())
            .filter(|name| {
                let usable = is_plain_file_name(name);
                if !usable {
                    warn!("Ignoring component name '{}' declared for {}", name, node_id);
                }
                usable
            })
            .unwrap_or_else(|| self.default_name.clone())
    }

    /// First `<source_dir>/<name>.tsx|ts` that exists under the project root
    pub async fn read_react_component(&self, name: &str) -> Option<SourceFile> {
        for dir in &self.source_dirs {
            for ext in SOURCE_EXTENSIONS {
                let relative = dir.join(format!("{}.{}", name, ext));
                if let Some(code) = read_if_exists(&self.project_root.join(&relative)).await {
                    return Some(SourceFile {
                        code,
                        path: relative.to_string_lossy().to_string(),
                    });
                }
            }
        }
        debug!("No local source found for component '{}'", name);
        None
    }

    /// `<name>.figma.tsx|ts` in the project root or up to two parents,
    /// accepted only if it references `node_id`
    pub async fn find_code_connect_file(&self, name: &str, node_id: &NodeId) -> Option<SourceFile> {
        let stem = node_id.file_stem();
        for prefix in ["", "..", "../.."] {
            let base = Path::new(prefix);
            for ext in CODE_CONNECT_EXTENSIONS {
                let relative = base.join(format!("{}.{}", name, ext));
                let Some(code) = read_if_exists(&self.project_root.join(&relative)).await else {
                    continue;
                };
                if code.contains(node_id.as_str()) || code.contains(&stem) {
                    return Some(SourceFile {
                        code,
                        path: relative.to_string_lossy().to_string(),
                    });
                }
            }
        }
        None
    }

    /// Aggregated view for `node_id`. Cached data is used only when the
    /// current component is that node.
    pub async fn component_data(&self, node_id: &NodeId) -> AggregatedComponentView {
        let figma_data = self
            .store
            .current_component()
            .await
            .filter(|current| &current.node_id == node_id);
        self.build_view(node_id.clone(), figma_data).await
    }

    /// Aggregated view of whatever is current, `None` if nothing was fetched yet
    pub async fn current_component_data(&self) -> Option<AggregatedComponentView> {
        let current = self.store.current_component().await?;
        Some(self.build_view(current.node_id.clone(), Some(current)).await)
    }

    async fn build_view(&self, node_id: NodeId, figma_data: Option<FetchResult>) -> AggregatedComponentView {
        let component_name = self.resolve_component_name(&node_id, figma_data.as_ref());
        let react = self.read_react_component(&component_name).await;
        let code_connect = self.find_code_connect_file(&component_name, &node_id).await;

        AggregatedComponentView {
            published: figma_data.as_ref().map_or(false, |d| d.published),
            timestamp: figma_data.as_ref().map_or_else(Utc::now, |d| d.timestamp),
            error: figma_data.as_ref().and_then(|d| d.error.clone()),
            node_id,
            figma_data,
            component_name,
            react_code: react.as_ref().map(|f| f.code.clone()),
            react_path: react.map(|f| f.path),
            code_connect_file: code_connect.as_ref().map(|f| f.code.clone()),
            code_connect_path: code_connect.map(|f| f.path),
        }
    }
}

/// A name usable as a single path component: no separators, no `..`
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(|c: char| c == '/' || c == '\\') && !name.contains("..")
}

async fn read_if_exists(path: &Path) -> Option<String> {
    match fs::read_to_string(path).await {
        Ok(code) => Some(code),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn service(temp: &TempDir) -> ComponentDataService {
        ComponentDataService::new(
            Store::new(temp.path().join("mcp-data")),
            temp.path(),
            &ComponentSettings::default(),
        )
    }

    fn node(id: &str) -> NodeId {
        NodeId::parse(id).unwrap()
    }

    #[test]
    fn test_name_resolution_order() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        let mut data = FetchResult::new(node("28:1289"));
        data.mapping = Some(json!({"28:1289": {"componentName": "Alert"}}));
        assert_eq!(service.resolve_component_name(&node("28:1289"), Some(&data)), "button");

        data.node_id = node("40:1");
        assert_eq!(service.resolve_component_name(&node("40:1"), Some(&data)), "alert");

        assert_eq!(service.resolve_component_name(&node("99:999"), None), "button");
    }

    #[test]
    fn test_declared_name_cannot_escape_source_dirs() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        for declared in ["../../../secret", "ui/button", "..\\x", ".."] {
            let mut data = FetchResult::new(node("40:1"));
            data.mapping = Some(json!({"40:1": {"componentName": declared}}));
            assert_eq!(
                service.resolve_component_name(&node("40:1"), Some(&data)),
                "button",
                "declared name {declared:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_react_source_lookup_order() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        assert!(service.read_react_component("input").await.is_none());

        let fallback = temp.path().join("components/ui");
        std::fs::create_dir_all(&fallback).unwrap();
        std::fs::write(fallback.join("input.tsx"), "export function Input() {}").unwrap();

        let found = service.read_react_component("input").await.unwrap();
        assert_eq!(found.path, "components/ui/input.tsx");

        let preferred = temp.path().join("registry/new-york-v4/ui");
        std::fs::create_dir_all(&preferred).unwrap();
        std::fs::write(preferred.join("input.ts"), "export const Input = 1").unwrap();

        let found = service.read_react_component("input").await.unwrap();
        assert_eq!(found.path, "registry/new-york-v4/ui/input.ts");
        assert_eq!(found.code, "export const Input = 1");
    }

    #[tokio::test]
    async fn test_code_connect_file_must_reference_node() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("apps/v4");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("button.figma.tsx"), "figma.connect(Button, '...?node-id=1-1')").unwrap();
        std::fs::write(
            temp.path().join("button.figma.ts"),
            "figma.connect(Button, 'https://x.com/design/K/F?node-id=28-1289')",
        )
        .unwrap();

        let service = ComponentDataService::new(
            Store::new(temp.path().join("mcp-data")),
            &root,
            &ComponentSettings::default(),
        );

        let found = service
            .find_code_connect_file("button", &node("28:1289"))
            .await
            .unwrap();
        assert_eq!(found.path, "../../button.figma.ts");

        let local = service.find_code_connect_file("button", &node("1:1")).await.unwrap();
        assert_eq!(local.path, "button.figma.tsx");

        assert!(service.find_code_connect_file("button", &node("7:7")).await.is_none());
    }

    #[tokio::test]
    async fn test_component_data_only_uses_matching_cache() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        let mut cached = FetchResult::new(node("12:272"));
        cached.code = Some("<Input />".into());
        cached.refresh_published();
        service.store().save_component(&cached).await.unwrap();

        let view = service.component_data(&node("12:272")).await;
        assert_eq!(view.component_name, "input");
        assert!(view.published);
        assert_eq!(view.figma_data, Some(cached.clone()));
        assert_eq!(view.timestamp, cached.timestamp);

        let other = service.component_data(&node("99:999")).await;
        assert!(other.figma_data.is_none());
        assert!(!other.published);
        assert_eq!(other.component_name, "button");
    }

    #[tokio::test]
    async fn test_current_component_data() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        assert!(service.current_component_data().await.is_none());

        let mut cached = FetchResult::new(node("5:6"));
        cached.error = Some("bridge down".into());
        service.store().save_component(&cached).await.unwrap();

        let view = service.current_component_data().await.unwrap();
        assert_eq!(view.node_id, node("5:6"));
        assert_eq!(view.error.as_deref(), Some("bridge down"));
        assert!(view.react_code.is_none());
    }
}
