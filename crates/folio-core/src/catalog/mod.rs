//! Tooling that produces the feed documents.
//!
//! Photos are organised in folders, each holding one image and an optional
//! `.txt` story. The scanner turns such a tree into a feed JSON file and
//! copies the images into the site's assets; the watcher re-runs the scan
//! whenever the tree changes.

pub mod scanner;
pub mod watcher;

pub use scanner::{CatalogLayout, CatalogScanner, ScanReport};
pub use watcher::{CatalogWatcher, UpdateThrottle};
