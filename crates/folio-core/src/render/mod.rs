//! Rendering collections into page containers.
//!
//! - `Page`, `ContainerHandle`: the containers a page exposes, by id
//! - `Container`: ordered child nodes with tag-based removal
//! - `ItemTemplate`, `SeriesCard`: item-to-node mapping
//! - `render`: replace a container's children with one node per item

pub mod container;
pub mod page;
pub mod renderer;
pub mod template;

pub use container::{Child, Container, ItemNode};
pub use page::{ContainerHandle, Page};
pub use renderer::{render, EmptyState};
pub use template::{ItemTemplate, SeriesCard};
