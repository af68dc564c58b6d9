//! wayfarer/crates/wf-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Wayfarer.

pub mod error;
pub mod feed;
pub mod filter;
pub mod journal;
pub mod models;
pub mod session;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use feed::{FeedController, TextField};
pub use filter::{filter_posts, filter_refs, map_markers, FilterCriteria, SortBy, SortOrder};
pub use journal::Journal;
pub use models::*;
pub use session::SessionContext;
pub use traits::*;
