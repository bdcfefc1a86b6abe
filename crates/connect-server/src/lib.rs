//! HTTP read endpoints over the on-disk cache.
//!
//! - `GET  /api/mcp-data`    current component joined with local sources
//! - `GET  /api/frame-data`  current frame
//! - `POST /api/mcp-request` queue a fetch for the watcher
//! - `GET  /api/health`
//!
//! Handlers only read files; they never reach the design bridge.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use connect_config::AppConfig;
use connect_core::{ConnectError, FigmaUrl, NodeId, Result};
use connect_store::{ComponentDataService, RequestQueue};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

const COMPONENT_SUGGESTION: &str = "Fetch a component first:\n\nconnect fetch <nodeId>\n\nOr for URLs:\nconnect fetch-url \"https://figma.com/design/...\"";
const FRAME_SUGGESTION: &str = "Fetch a frame first:\n\nconnect fetch <frameNodeId> --frame\n\nOr for URLs:\nconnect fetch-url \"https://figma.com/design/...\" --frame";

pub struct AppState {
    pub service: ComponentDataService,
    pub queue: RequestQueue,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            service: ComponentDataService::from_config(config),
            queue: RequestQueue::new(&config.paths.data_dir),
        }
    }
}

/// Error body shared by every endpoint: `{success: false, error, suggestion?}`
#[derive(Debug)]
pub enum ApiError {
    NotFound { error: &'static str, suggestion: &'static str },
    BadRequest(String),
    Internal(String),
}

impl From<ConnectError> for ApiError {
    fn from(e: ConnectError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound { error, suggestion } => (
                StatusCode::NOT_FOUND,
                json!({"success": false, "error": error, "suggestion": suggestion}),
            ),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({"success": false, "error": message}),
            ),
            ApiError::Internal(message) => {
                error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "success": false,
                        "error": "Internal server error",
                        "suggestion": "Check server logs for details"
                    }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/mcp-data", get(get_component_data))
        .route("/api/frame-data", get(get_frame_data))
        .route("/api/mcp-request", post(create_request))
        .route("/api/health", get(health_check))
        .layer(cors)
        .with_state(state)
}

async fn get_component_data(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<Value>, ApiError> {
    let view = state
        .service
        .current_component_data()
        .await
        .ok_or(ApiError::NotFound {
            error: "No current component found",
            suggestion: COMPONENT_SUGGESTION,
        })?;

    info!(
        "Returning component data for {} (published: {}, react source: {})",
        view.node_id,
        view.published,
        if view.react_code.is_some() { "found" } else { "missing" }
    );
    let data = serde_json::to_value(&view).map_err(ConnectError::from)?;
    Ok(Json(json!({"success": true, "data": data})))
}

async fn get_frame_data(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<Value>, ApiError> {
    let frame = state
        .service
        .store()
        .current_frame()
        .await
        .ok_or(ApiError::NotFound {
            error: "No current frame found",
            suggestion: FRAME_SUGGESTION,
        })?;

    info!(
        "Returning frame data for {} ({} children, {} with code)",
        frame.frame_node_id,
        frame.children.len(),
        frame.valid_children()
    );
    let data = serde_json::to_value(&frame).map_err(ConnectError::from)?;
    Ok(Json(json!({"success": true, "data": data})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchRequestBody {
    node_id: Option<String>,
    url: Option<String>,
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<FetchRequestBody>, JsonRejection>,
) -> std::result::Result<(StatusCode, Json<Value>), ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let node_id = match (body.node_id, body.url) {
        (Some(raw), _) => NodeId::parse(&raw).map_err(|e| ApiError::BadRequest(e.to_string()))?,
        (None, Some(url)) => {
            FigmaUrl::parse(&url)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid Figma URL: {}", url)))?
                .node_id
        }
        (None, None) => {
            return Err(ApiError::BadRequest("Either nodeId or url is required".into()))
        }
    };

    let marker = state.queue.create(node_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "requestId": marker.request_id,
            "nodeId": marker.node_id,
        })),
    ))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store = state.service.store();
    Json(json!({
        "status": "ok",
        "service": "codeconnect-bridge",
        "version": env!("CARGO_PKG_VERSION"),
        "dataDir": store.data_dir().to_string_lossy(),
        "hasComponent": store.current_component().await.is_some(),
        "hasFrame": store.current_frame().await.is_some(),
    }))
}

/// Serve on the configured address until Ctrl-C
pub async fn serve(config: &AppConfig) -> Result<()> {
    let listener = TcpListener::bind(config.listen_addr()).await?;
    let state = Arc::new(AppState::from_config(config));
    serve_with_shutdown(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await
}

pub async fn serve_with_shutdown<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("Serving on http://{}", addr);
    info!("  GET  /api/mcp-data");
    info!("  GET  /api/frame-data");
    info!("  POST /api/mcp-request");
    info!("  GET  /api/health");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}
