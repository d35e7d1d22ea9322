//! Content sources for feed documents.
//!
//! This module provides the `ContentSource` seam the loader fetches
//! through, with an HTTP implementation for a served site and a file
//! implementation reading a site directory directly.

pub mod client;
pub mod error;

pub use client::{ContentSource, FileSource, HttpSource};
pub use error::FetchError;
