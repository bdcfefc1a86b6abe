use connect_config::ComponentSettings;
use connect_core::{FetchResult, NodeId};
use connect_store::{process_frame, Category, ComponentDataService, Store};
use serde_json::json;
use tempfile::TempDir;

fn fetched(id: &str) -> FetchResult {
    let mut result = FetchResult::new(NodeId::parse(id).unwrap());
    let mut mapping = serde_json::Map::new();
    mapping.insert(
        id.to_string(),
        json!({
            "componentName": "Button",
            "snippet": "<CodeConnectSnippet><Button>Go</Button></CodeConnectSnippet>"
        }),
    );
    result.mapping = Some(mapping.into());
    result.code = Some("import { Button } from \"@/components/ui/button\"\n<Button>Go</Button>".into());
    result.refresh_published();
    result
}

#[tokio::test]
async fn write_then_read_returns_equal_value() {
    let temp = TempDir::new().unwrap();
    let store = Store::new(temp.path());

    let component = fetched("28:1289");
    store.save_component(&component).await.unwrap();
    assert_eq!(store.current_component().await, Some(component.clone()));

    let frame = process_frame(&fetched("22:1167"));
    store.save_frame(&frame).await.unwrap();
    assert_eq!(store.current_frame().await, Some(frame));

    // Categories do not overwrite each other
    assert_eq!(store.current_component().await, Some(component));
}

#[tokio::test]
async fn repeated_writes_leave_identical_file() {
    let temp = TempDir::new().unwrap();
    let store = Store::new(temp.path());
    let component = fetched("12:272");

    store.save_component(&component).await.unwrap();
    let first = std::fs::read_to_string(store.path(Category::Component)).unwrap();
    store.save_component(&component).await.unwrap();
    let second = std::fs::read_to_string(store.path(Category::Component)).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn last_write_wins() {
    let temp = TempDir::new().unwrap();
    let store = Store::new(temp.path());

    store.save_component(&fetched("1:1")).await.unwrap();
    store.save_component(&fetched("2:2")).await.unwrap();

    let current = store.current_component().await.unwrap();
    assert_eq!(current.node_id.as_str(), "2:2");
}

#[tokio::test]
async fn aggregator_falls_back_to_known_and_default_names() {
    let temp = TempDir::new().unwrap();
    let service = ComponentDataService::new(
        Store::new(temp.path().join("mcp-data")),
        temp.path(),
        &ComponentSettings::default(),
    );

    let known = service.component_data(&NodeId::parse("28:1289").unwrap()).await;
    assert_eq!(known.component_name, "button");
    assert!(known.figma_data.is_none());

    let unknown = service.component_data(&NodeId::parse("99:999").unwrap()).await;
    assert_eq!(unknown.component_name, "button");
    assert!(!unknown.published);
    assert!(unknown.react_code.is_none());
}

#[tokio::test]
async fn aggregator_reads_local_source() {
    let temp = TempDir::new().unwrap();
    let ui = temp.path().join("registry/new-york-v4/ui");
    std::fs::create_dir_all(&ui).unwrap();
    std::fs::write(ui.join("button.tsx"), "export function Button() {}").unwrap();

    let service = ComponentDataService::new(
        Store::new(temp.path().join("mcp-data")),
        temp.path(),
        &ComponentSettings::default(),
    );
    service.store().save_component(&fetched("28:1289")).await.unwrap();

    let view = service.current_component_data().await.unwrap();
    assert!(view.published);
    assert_eq!(view.react_path.as_deref(), Some("registry/new-york-v4/ui/button.tsx"));
    assert_eq!(view.react_code.as_deref(), Some("export function Button() {}"));
}
