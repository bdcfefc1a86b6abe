use thiserror::Error;

pub mod figma_url;
pub mod snippet;
pub mod types;

pub use figma_url::{FigmaUrl, NodeId};
pub use snippet::Snippet;
pub use types::{
    AggregatedComponentView, ChildComponent, FetchResult, FrameFetchResult, RequestMarker,
    RequestStatus, FETCH_SOURCE,
};

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid Figma URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("Design bridge error: {0}")]
    Bridge(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Watcher error: {0}")]
    Watch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConnectError>;
