//! SSE transport for HTTP-based MCP servers.
//!
//! Responses arrive on the event stream; requests are POSTed to the
//! messages endpoint announced by the server's `endpoint` event.

use async_trait::async_trait;
use connect_core::{ConnectError, Result};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_eventsource::{Event, EventSource};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info};

use super::{resolve_env_value, Transport};
use crate::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

pub struct SseTransport {
    url: String,
    client: reqwest::Client,
    response_rx: Arc<Mutex<mpsc::Receiver<JsonRpcResponse>>>,
    connected: Arc<RwLock<bool>>,
    messages_url: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseTransport")
            .field("url", &self.url)
            .finish()
    }
}

impl SseTransport {
    pub async fn connect(
        url: String,
        headers: HashMap<String, String>,
        timeout_ms: u64,
    ) -> Result<Self> {
        info!("Connecting to design-bridge MCP server via SSE: {}", url);

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConnectError::Bridge(
                "SSE URL must start with http:// or https://".into(),
            ));
        }

        let mut default_headers = HeaderMap::new();
        for (key, value) in &headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ConnectError::Bridge(format!("Invalid header name '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(&resolve_env_value(value))
                .map_err(|e| ConnectError::Bridge(format!("Invalid header value for '{}': {}", key, e)))?;
            default_headers.insert(name, value);
        }

        // No overall timeout here: the event stream stays open for the
        // whole session. Per-request deadlines live in the client.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(timeout_ms))
            .default_headers(default_headers)
            .build()
            .map_err(|e| ConnectError::Bridge(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = url.trim_end_matches("/sse").trim_end_matches('/').to_string();
        let sse_url = format!("{}/sse", base_url);

        let (response_tx, response_rx) = mpsc::channel::<JsonRpcResponse>(100);
        let connected = Arc::new(RwLock::new(false));
        let messages_url = Arc::new(RwLock::new(None::<String>));

        let request = client.get(&sse_url);
        let connected_listener = connected.clone();
        let messages_listener = messages_url.clone();
        tokio::spawn(async move {
            let mut event_source = match EventSource::new(request) {
                Ok(source) => source,
                Err(e) => {
                    error!("Failed to open event stream {}: {}", sse_url, e);
                    return;
                }
            };

            while let Some(event) = event_source.next().await {
                match event {
                    Ok(Event::Open) => {
                        info!("SSE connection opened");
                        *connected_listener.write().await = true;
                    }
                    Ok(Event::Message(msg)) if msg.event == "endpoint" => {
                        let endpoint = if msg.data.starts_with("http") {
                            msg.data.clone()
                        } else {
                            format!("{}{}", base_url, msg.data)
                        };
                        info!("Discovered messages endpoint: {}", endpoint);
                        *messages_listener.write().await = Some(endpoint);
                    }
                    Ok(Event::Message(msg)) => {
                        debug!("SSE event '{}' ({} bytes)", msg.event, msg.data.len());
                        match serde_json::from_str::<JsonRpcResponse>(&msg.data) {
                            Ok(response) => {
                                if response_tx.send(response).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => debug!("Ignoring non-response SSE message: {}", e),
                        }
                    }
                    Err(e) => {
                        error!("SSE stream error: {}", e);
                        break;
                    }
                }
            }
            event_source.close();
            *connected_listener.write().await = false;
            info!("SSE event listener ended");
        });

        // Give the server a moment to announce its messages endpoint
        tokio::time::sleep(Duration::from_millis(500)).await;

        Ok(Self {
            url,
            client,
            response_rx: Arc::new(Mutex::new(response_rx)),
            connected,
            messages_url,
        })
    }

    async fn post(&self, body: String) -> Result<()> {
        let target = match self.messages_url.read().await.as_ref() {
            Some(url) => url.clone(),
            None => format!("{}/messages", self.url.trim_end_matches("/sse").trim_end_matches('/')),
        };

        debug!("Posting to {}: {}", target, body);
        let response = self
            .client
            .post(&target)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ConnectError::Bridge(format!("Failed to send HTTP request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ConnectError::Bridge(format!(
                "HTTP request failed with status {}: {}",
                status, text
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<()> {
        self.post(serde_json::to_string(&request)?).await
    }

    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()> {
        self.post(serde_json::to_string(&notification)?).await
    }

    async fn receive_response(&mut self) -> Result<Option<JsonRpcResponse>> {
        let mut rx = self.response_rx.lock().await;
        match rx.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(ConnectError::Bridge("SSE stream closed".into()))
            }
        }
    }

    async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    async fn close(&mut self) -> Result<()> {
        info!("Closing SSE transport");
        *self.connected.write().await = false;
        Ok(())
    }
}
