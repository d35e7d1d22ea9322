use tracing::debug;

use crate::models::ContentCollection;
use crate::utils::escape_html;

use super::{Child, Container, ItemTemplate};

/// Placeholder shown when a collection has no items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyState {
    pub class: &'static str,
    pub message: &'static str,
}

impl EmptyState {
    pub fn to_html(&self) -> String {
        format!(r#"<p class="{}">{}</p>"#, self.class, escape_html(self.message))
    }
}

/// Replace the container's children with one node per item, in order.
///
/// Prior contents are discarded unconditionally. An empty collection leaves
/// only the placeholder.
pub fn render(
    container: &mut Container,
    collection: &ContentCollection,
    template: &dyn ItemTemplate,
    empty: &EmptyState,
) {
    let items = collection.items();
    debug!(container = container.id(), items = items.len(), "Rendering collection");

    if items.is_empty() {
        container.replace_children(vec![Child::Placeholder(empty.to_html())]);
        return;
    }

    let children = items
        .iter()
        .enumerate()
        .map(|(index, item)| Child::Item(template.build(item, item.tag(index))))
        .collect();
    container.replace_children(children);
}
