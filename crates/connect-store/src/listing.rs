use chrono::{DateTime, Duration, Utc};
use connect_core::{FetchResult, FrameFetchResult, Result};

use crate::requests::RequestQueue;
use crate::store::Store;

/// Cached data older than this is reported as stale
pub fn stale_after() -> Duration {
    Duration::hours(1)
}

/// `2h 5m ago`, `12m ago` or `Just now`
pub fn format_age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(timestamp);
    let hours = age.num_hours();
    let minutes = age.num_minutes() % 60;

    if hours > 0 {
        format!("{}h {}m ago", hours, minutes)
    } else if minutes > 0 {
        format!("{}m ago", minutes)
    } else {
        "Just now".to_string()
    }
}

/// Everything `list` reports
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSummary {
    pub component: Option<FetchResult>,
    pub frame: Option<FrameFetchResult>,
    pub pending_requests: usize,
}

impl CacheSummary {
    pub async fn collect(store: &Store, queue: &RequestQueue) -> Result<Self> {
        Ok(Self {
            component: store.current_component().await,
            frame: store.current_frame().await,
            pending_requests: queue.pending().await?.len(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.component.is_none() && self.frame.is_none() && self.pending_requests == 0
    }
}
