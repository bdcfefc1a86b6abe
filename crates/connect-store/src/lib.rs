//! On-disk state for the bridge: the current component and frame, pending
//! fetch requests, and the aggregated view served over HTTP.

pub mod aggregator;
pub mod frame;
pub mod layout;
pub mod listing;
pub mod requests;
pub mod store;

pub use aggregator::{ComponentDataService, SourceFile};
pub use frame::{extract_children, extract_imports, process_frame};
pub use layout::{generate_layout, LayoutStyle};
pub use listing::{format_age, stale_after, CacheSummary};
pub use requests::RequestQueue;
pub use store::{Category, Store};
