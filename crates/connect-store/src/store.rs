//! Single-document JSON store for the current component and current frame

use connect_core::{FetchResult, FrameFetchResult, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Component,
    Frame,
}

impl Category {
    fn dir_name(&self) -> &'static str {
        match self {
            Category::Component => "components",
            Category::Frame => "frames",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Category::Component => "current-component.json",
            Category::Frame => "current-frame.json",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Component => "component",
            Category::Frame => "frame",
        }
    }
}

/// File-backed store holding one current document per category
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        debug!("Store initialized: data_dir={:?}", data_dir);
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path(&self, category: Category) -> PathBuf {
        self.data_dir
            .join(category.dir_name())
            .join(category.file_name())
    }

    /// Read the current document. Missing or unparseable files read as `None`.
    pub async fn read<T: DeserializeOwned>(&self, category: Category) -> Option<T> {
        let path = self.path(category);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No current {} at {:?}", category.label(), path);
                return None;
            }
            Err(e) => {
                warn!("Failed to read current {} from {:?}: {}", category.label(), path, e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to parse current {} at {:?}: {}", category.label(), path, e);
                None
            }
        }
    }

    /// Replace the current document, creating directories as needed
    pub async fn write<T: Serialize>(&self, category: Category, value: &T) -> Result<PathBuf> {
        let path = self.path(category);
        let dir = self.data_dir.join(category.dir_name());
        fs::create_dir_all(&dir).await?;

        let json = serde_json::to_string_pretty(value)?;

        // Readers see either the old file or the new one, never a partial write
        let tmp = dir.join(format!(".{}.{}.tmp", category.file_name(), Uuid::new_v4()));
        fs::write(&tmp, json).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!("Saved current {} to {:?}", category.label(), path);
        Ok(path)
    }

    /// Remove the current document; `false` if there was none
    pub async fn clear(&self, category: Category) -> Result<bool> {
        match fs::remove_file(self.path(category)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn current_component(&self) -> Option<FetchResult> {
        self.read(Category::Component).await
    }

    pub async fn save_component(&self, result: &FetchResult) -> Result<PathBuf> {
        self.write(Category::Component, result).await
    }

    pub async fn current_frame(&self) -> Option<FrameFetchResult> {
        self.read(Category::Frame).await
    }

    pub async fn save_frame(&self, result: &FrameFetchResult) -> Result<PathBuf> {
        self.write(Category::Frame, result).await
    }
}
