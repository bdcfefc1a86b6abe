//! Request markers: small JSON files asking the watcher to fetch a node

use connect_core::{NodeId, RequestMarker, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RequestQueue {
    dir: PathBuf,
}

impl RequestQueue {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("requests"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Write a pending marker for `node_id`
    pub async fn create(&self, node_id: NodeId) -> Result<RequestMarker> {
        self.ensure_dir().await?;

        let marker = RequestMarker::pending(node_id);
        let path = self.dir.join(format!("{}.json", marker.request_id));
        // The watcher only reacts to `req_*.json`, so it sees the marker once complete
        let temp = self.dir.join(format!("{}.json.tmp", marker.request_id));
        fs::write(&temp, serde_json::to_string_pretty(&marker)?).await?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        info!("Created request {} for node {}", marker.request_id, marker.node_id);
        Ok(marker)
    }

    /// Marker at `path`, or `None` if it is gone or unreadable
    pub async fn read(&self, path: &Path) -> Option<RequestMarker> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("Request marker {:?} not readable: {}", path, e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(marker) => Some(marker),
            Err(e) => {
                warn!("Invalid request marker {:?}: {}", path, e);
                None
            }
        }
    }

    /// All pending markers, oldest first
    pub async fn pending(&self) -> Result<Vec<(PathBuf, RequestMarker)>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut pending = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_marker_path(&path) {
                continue;
            }
            if let Some(marker) = self.read(&path).await {
                if marker.status == connect_core::RequestStatus::Pending {
                    pending.push((path, marker));
                }
            }
        }

        pending.sort_by(|a, b| a.1.requested_at.cmp(&b.1.requested_at));
        Ok(pending)
    }

    pub async fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("Removed request marker {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// `req_*.json` files are markers; anything else in the directory is ignored
pub fn is_marker_path(path: &Path) -> bool {
    let is_json = path.extension().map_or(false, |ext| ext == "json");
    let is_request = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with("req_"));
    is_json && is_request
}

#[cfg(test)]
mod tests {
    use super::*;
    use connect_core::RequestStatus;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_and_list_pending() {
        let temp = TempDir::new().unwrap();
        let queue = RequestQueue::new(temp.path());
        assert!(queue.pending().await.unwrap().is_empty());

        let marker = queue.create(NodeId::parse("28-1289").unwrap()).await.unwrap();
        assert_eq!(marker.node_id.as_str(), "28:1289");

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].1, marker);
        assert!(pending[0].0.ends_with(format!("{}.json", marker.request_id)));
    }

    #[tokio::test]
    async fn test_create_leaves_only_the_final_marker() {
        let temp = TempDir::new().unwrap();
        let queue = RequestQueue::new(temp.path());
        let marker = queue.create(NodeId::parse("5:6").unwrap()).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(queue.dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![format!("{}.json", marker.request_id)]);

        // A half-written marker is not picked up
        std::fs::write(queue.dir().join("req_9_9-9.json.tmp"), "{\"requestId\":").unwrap();
        assert_eq!(queue.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_pending_and_foreign_files_are_skipped() {
        let temp = TempDir::new().unwrap();
        let queue = RequestQueue::new(temp.path());
        queue.ensure_dir().await.unwrap();

        let mut done = RequestMarker::pending(NodeId::parse("1:2").unwrap());
        done.status = RequestStatus::Completed;
        std::fs::write(
            queue.dir().join("req_1_1-2.json"),
            serde_json::to_string(&done).unwrap(),
        )
        .unwrap();
        std::fs::write(queue.dir().join("notes.txt"), "hello").unwrap();
        std::fs::write(queue.dir().join("req_broken.json"), "{").unwrap();

        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let queue = RequestQueue::new(temp.path());
        let marker = queue.create(NodeId::parse("3:4").unwrap()).await.unwrap();
        let path = queue.dir().join(format!("{}.json", marker.request_id));

        queue.remove(&path).await.unwrap();
        queue.remove(&path).await.unwrap();
        assert!(queue.read(&path).await.is_none());
    }

    #[test]
    fn test_is_marker_path() {
        assert!(is_marker_path(Path::new("/tmp/req_1_2-3.json")));
        assert!(!is_marker_path(Path::new("/tmp/req_1_2-3.json.tmp")));
        assert!(!is_marker_path(Path::new("/tmp/other.json")));
    }
}
