//! Data models for portfolio content.
//!
//! - `ContentItem`, `ItemId`: one renderable card (image, title, description, meta)
//! - `ContentCollection`: a fetched or cached feed, either a bare list of items
//!   or an envelope object carrying `items` plus series metadata

pub mod collection;
pub mod item;

pub use collection::{CollectionEnvelope, ContentCollection, SeriesInfo};
pub use item::{ContentItem, ItemId};
