//! Stdio transport for MCP servers launched as child processes

use async_trait::async_trait;
use connect_core::{ConnectError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info};

use super::{resolve_env_value, Transport};
use crate::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

pub struct StdioTransport {
    process: Arc<Mutex<Option<Child>>>,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    response_rx: Arc<Mutex<mpsc::Receiver<JsonRpcResponse>>>,
    command: String,
    args: Vec<String>,
    connected: Arc<RwLock<bool>>,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("command", &self.command)
            .field("args", &self.args)
            .finish()
    }
}

impl StdioTransport {
    /// Spawn the server process and start reading its stdout
    pub async fn spawn(
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    ) -> Result<Self> {
        info!("Starting design-bridge MCP server via stdio: {} {:?}", command, args);

        let mut cmd = Command::new(&command);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &env {
            cmd.env(key, resolve_env_value(value));
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ConnectError::Bridge(format!("Failed to spawn MCP server process: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ConnectError::Bridge("Failed to get process stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConnectError::Bridge("Failed to get process stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConnectError::Bridge("Failed to get process stderr".into()))?;

        let (response_tx, response_rx) = mpsc::channel::<JsonRpcResponse>(100);
        let connected = Arc::new(RwLock::new(true));
        let connected_reader = connected.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        debug!("Received from MCP server: {}", trimmed);
                        match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                            Ok(response) => {
                                if response_tx.send(response).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => debug!("Non-response message from server: {} - {}", trimmed, e),
                        }
                    }
                    Ok(None) => {
                        info!("MCP server process stdout closed");
                        break;
                    }
                    Err(e) => {
                        error!("Error reading from MCP server stdout: {}", e);
                        break;
                    }
                }
            }
            *connected_reader.write().await = false;
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.trim().is_empty() {
                    debug!("MCP server stderr: {}", line.trim());
                }
            }
        });

        Ok(Self {
            process: Arc::new(Mutex::new(Some(child))),
            stdin: Arc::new(Mutex::new(Some(stdin))),
            response_rx: Arc::new(Mutex::new(response_rx)),
            command,
            args,
            connected,
        })
    }

    async fn write_line<T: Serialize>(&self, message: &T) -> Result<()> {
        let json = serde_json::to_string(message)?;
        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| ConnectError::Bridge("Process stdin not available".into()))?;

        debug!("Sending to MCP server: {}", json);
        stdin
            .write_all(json.as_bytes())
            .await
            .map_err(|e| ConnectError::Bridge(format!("Failed to write to stdin: {}", e)))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| ConnectError::Bridge(format!("Failed to write newline: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| ConnectError::Bridge(format!("Failed to flush stdin: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<()> {
        self.write_line(&request).await
    }

    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()> {
        self.write_line(&notification).await
    }

    async fn receive_response(&mut self) -> Result<Option<JsonRpcResponse>> {
        let mut rx = self.response_rx.lock().await;
        match rx.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(ConnectError::Bridge("MCP server closed the connection".into()))
            }
        }
    }

    async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    async fn close(&mut self) -> Result<()> {
        info!("Closing stdio transport");

        if let Some(mut stdin) = self.stdin.lock().await.take() {
            let _ = stdin.shutdown().await;
        }

        if let Some(mut child) = self.process.lock().await.take() {
            if let Err(e) = child.kill().await {
                error!("Failed to kill MCP server process: {}", e);
            }
        }

        *self.connected.write().await = false;
        Ok(())
    }
}
