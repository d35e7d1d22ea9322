//! Core library for folio.
//!
//! A portfolio page shows a handful of content feeds (featured series,
//! project gallery) that are fetched as JSON, cached in origin-scoped
//! key/value storage and rendered into named containers. This crate holds
//! the generic cache-then-fetch-then-render machinery and the tooling that
//! produces the JSON documents in the first place.

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod feed;
pub mod models;
pub mod render;
pub mod utils;

pub use api::{ContentSource, FetchError, FileSource, HttpSource};
pub use cache::{CacheEntry, CacheKeys, ContentCache, LocalStorage};
pub use catalog::{CatalogLayout, CatalogScanner, CatalogWatcher};
pub use config::Config;
pub use feed::{ContentLoader, FeedError, FeedKind, FeedManager, FeedProfile, LoadOutcome, PageEvents};
pub use models::{ContentCollection, ContentItem, ItemId};
pub use render::{Container, ContainerHandle, Page};
