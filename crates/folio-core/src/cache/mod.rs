//! Origin-scoped content caching.
//!
//! This module provides the key/value storage the feeds persist into and
//! the `ContentCache` that keeps one payload and one timestamp per feed.
//!
//! - `KeyValueStore`: backend trait with file and in-memory implementations
//! - `LocalStorage`: shared handle with per-tab change notifications
//! - `ContentCache`: cache entries for fetched collections

pub mod manager;
pub mod store;

pub use manager::{CacheEntry, CacheKeys, ContentCache};
pub use store::{FileStore, KeyValueStore, LocalStorage, MemoryStore, StorageEvent, StorageEvents, TabId};
