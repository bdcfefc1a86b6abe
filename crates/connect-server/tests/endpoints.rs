use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use connect_config::ComponentSettings;
use connect_core::{FetchResult, NodeId};
use connect_server::{router, AppState};
use connect_store::{process_frame, ComponentDataService, RequestQueue, Store};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn app(temp: &TempDir) -> Router {
    let data_dir = temp.path().join("mcp-data");
    let state = AppState {
        service: ComponentDataService::new(
            Store::new(&data_dir),
            temp.path(),
            &ComponentSettings::default(),
        ),
        queue: RequestQueue::new(&data_dir),
    };
    router(Arc::new(state))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn component_data_is_404_before_any_fetch() {
    let temp = TempDir::new().unwrap();
    let (status, body) = send(app(&temp), get("/api/mcp-data")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No current component found");
    assert!(body["suggestion"].as_str().unwrap().contains("connect fetch"));
}

#[tokio::test]
async fn component_data_after_fetch() {
    let temp = TempDir::new().unwrap();
    let ui = temp.path().join("components/ui");
    std::fs::create_dir_all(&ui).unwrap();
    std::fs::write(ui.join("button.tsx"), "export function Button() {}").unwrap();

    let mut fetched = FetchResult::new(NodeId::parse("28:1289").unwrap());
    fetched.code = Some("<Button />".into());
    fetched.refresh_published();
    Store::new(temp.path().join("mcp-data"))
        .save_component(&fetched)
        .await
        .unwrap();

    let (status, body) = send(app(&temp), get("/api/mcp-data")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["nodeId"], "28:1289");
    assert_eq!(body["data"]["componentName"], "button");
    assert_eq!(body["data"]["published"], true);
    assert_eq!(body["data"]["reactPath"], "components/ui/button.tsx");
    assert_eq!(body["data"]["figmaData"]["code"], "<Button />");
}

#[tokio::test]
async fn frame_data_404_then_200() {
    let temp = TempDir::new().unwrap();
    let (status, body) = send(app(&temp), get("/api/frame-data")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No current frame found");

    let mut fetched = FetchResult::new(NodeId::parse("22:1167").unwrap());
    fetched.mapping = Some(json!({
        "12:65": {"componentName": "Button", "snippet": "<Button />"}
    }));
    fetched.refresh_published();
    Store::new(temp.path().join("mcp-data"))
        .save_frame(&process_frame(&fetched))
        .await
        .unwrap();

    let (status, body) = send(app(&temp), get("/api/frame-data")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["frameNodeId"], "22:1167");
    assert_eq!(body["data"]["children"][0]["publishedCode"], "<Button />");
}

#[tokio::test]
async fn request_endpoint_queues_marker() {
    let temp = TempDir::new().unwrap();

    let (status, body) = send(
        app(&temp),
        post_json(
            "/api/mcp-request",
            json!({"url": "https://x.com/design/ABC123/Name?node-id=28-1289"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["nodeId"], "28:1289");
    assert!(body["requestId"].as_str().unwrap().starts_with("req_"));

    let pending = RequestQueue::new(temp.path().join("mcp-data"))
        .pending()
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn request_endpoint_rejects_bad_input() {
    let temp = TempDir::new().unwrap();

    let (status, body) = send(app(&temp), post_json("/api/mcp-request", json!({"nodeId": "abc"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(app(&temp), post_json("/api/mcp-request", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn request_endpoint_wraps_malformed_json() {
    let temp = TempDir::new().unwrap();

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/mcp-request")
        .header("content-type", "application/json")
        .body(Body::from("{\"nodeId\": "))
        .unwrap();
    let (status, body) = send(app(&temp), malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let untyped = Request::builder()
        .method("POST")
        .uri("/api/mcp-request")
        .body(Body::from(r#"{"nodeId": "1:2"}"#))
        .unwrap();
    let (status, body) = send(app(&temp), untyped).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn health_reports_cache_state() {
    let temp = TempDir::new().unwrap();
    let (status, body) = send(app(&temp), get("/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["hasComponent"], false);
    assert_eq!(body["hasFrame"], false);
}
