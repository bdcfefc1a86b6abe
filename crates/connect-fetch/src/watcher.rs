//! Watches the request directory and fetches each pending marker, one at a time

use connect_core::{ConnectError, RequestStatus, Result};
use connect_store::requests::is_marker_path;
use connect_store::RequestQueue;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::Fetcher;

#[derive(Clone)]
pub struct RequestWatcher {
    fetcher: Arc<Fetcher>,
    queue: RequestQueue,
    settle: Duration,
}

impl RequestWatcher {
    pub fn new(fetcher: Arc<Fetcher>, queue: RequestQueue, settle_ms: u64) -> Self {
        Self {
            fetcher,
            queue,
            settle: Duration::from_millis(settle_ms),
        }
    }

    /// Fetch the node a marker asks for, then delete the marker.
    /// Returns `false` when the marker was gone or not pending.
    pub async fn process_marker(&self, path: &Path) -> Result<bool> {
        let Some(marker) = self.queue.read(path).await else {
            return Ok(false);
        };

        if marker.status != RequestStatus::Pending {
            info!("Skipping {} - status: {:?}", marker.request_id, marker.status);
            return Ok(false);
        }

        info!("Processing request {} for {}", marker.request_id, marker.node_id);
        match self.fetcher.fetch_and_save(&marker.node_id).await {
            Ok(saved) => match &saved.result.error {
                None => info!("Processed request {}", marker.request_id),
                Some(e) => warn!("Request {} saved with error: {}", marker.request_id, e),
            },
            Err(e) => error!("Failed to process request {}: {}", marker.request_id, e),
        }

        self.queue.remove(path).await?;
        Ok(true)
    }

    /// Process markers already on disk, oldest first
    pub async fn drain_pending(&self) -> Result<usize> {
        let pending = self.queue.pending().await?;
        if !pending.is_empty() {
            info!("Found {} pending request(s)", pending.len());
        }

        let mut processed = 0;
        for (path, _) in pending {
            match self.process_marker(&path).await {
                Ok(true) => processed += 1,
                Ok(false) => {}
                Err(e) => error!("Error processing request {:?}: {}", path, e),
            }
        }
        Ok(processed)
    }

    /// Watch until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await
    }

    /// Watch until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.queue.ensure_dir().await?;
        self.drain_pending().await?;

        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| {
                if tx.send(res).is_err() {
                    debug!("Watch event dropped after shutdown");
                }
            })
            .map_err(|e| ConnectError::Watch(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(self.queue.dir(), RecursiveMode::NonRecursive)
            .map_err(|e| ConnectError::Watch(format!("Failed to watch directory: {}", e)))?;

        info!("Watching for requests in {:?}", self.queue.dir());

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down request watcher");
                    break;
                }
                event = rx.recv() => match event {
                    Some(Ok(event)) => {
                        for path in new_markers(event) {
                            tokio::time::sleep(self.settle).await;
                            if let Err(e) = self.process_marker(&path).await {
                                error!("Error processing request {:?}: {}", path, e);
                            }
                        }
                    }
                    Some(Err(e)) => warn!("Watch error: {}", e),
                    None => {
                        error!("Watcher channel disconnected");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Marker files that appeared in the directory, by creation or rename
fn new_markers(event: Event) -> Vec<PathBuf> {
    let appeared = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
    );
    if !appeared {
        return Vec::new();
    }
    event
        .paths
        .into_iter()
        .filter(|path| is_marker_path(path) && path.exists())
        .collect()
}
