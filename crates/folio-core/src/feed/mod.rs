//! Content feeds: the cache-then-fetch-then-render cycle.
//!
//! A `FeedProfile` describes one feed (endpoint, cache keys, freshness
//! window, container, triggers). `ContentLoader` runs one load cycle for a
//! profile and `FeedManager` owns the refresh triggers that re-run it.

pub mod error;
pub mod events;
pub mod loader;
pub mod manager;
pub mod profile;

pub use error::FeedError;
pub use events::{PageEvent, PageEvents};
pub use loader::{ContentLoader, LoadOutcome};
pub use manager::FeedManager;
pub use profile::{FeedKind, FeedProfile, FreshnessPolicy};
