use crate::utils::{escape_html, strip_html};

/// A rendered item, tagged so it can be removed later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemNode {
    /// Attribute carrying the tag, e.g. `data-series-id`.
    pub tag_attribute: &'static str,
    pub tag: String,
    /// Inner markup of the node.
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    Item(ItemNode),
    Placeholder(String),
}

impl Child {
    fn to_html(&self) -> String {
        match self {
            Child::Item(node) => format!(
                r#"<div class="series-item" {}="{}">{}</div>"#,
                node.tag_attribute,
                escape_html(&node.tag),
                node.html
            ),
            Child::Placeholder(html) => html.clone(),
        }
    }
}

/// A page element that feed content is rendered into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    id: String,
    children: Vec<Child>,
}

impl Container {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemNode> {
        self.children.iter().filter_map(|child| match child {
            Child::Item(node) => Some(node),
            Child::Placeholder(_) => None,
        })
    }

    pub fn item_count(&self) -> usize {
        self.items().count()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn replace_children(&mut self, children: Vec<Child>) {
        self.children = children;
    }

    pub fn append(&mut self, child: Child) {
        self.children.push(child);
    }

    /// Remove the first item node carrying `tag`.
    ///
    /// Returns the node's position among the item nodes, which matches the
    /// position of its item in the collection the container was rendered from.
    pub fn remove_tagged(&mut self, tag: &str) -> Option<usize> {
        let position = self.items().position(|node| node.tag == tag)?;
        let mut seen = 0;
        self.children.retain(|child| match child {
            Child::Item(_) => {
                let keep = seen != position;
                seen += 1;
                keep
            }
            Child::Placeholder(_) => true,
        });
        Some(position)
    }

    /// Markup of the container's children.
    pub fn to_html(&self) -> String {
        self.children.iter().map(Child::to_html).collect::<Vec<_>>().join("\n")
    }

    /// Text content of the container, one line per child.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .map(|child| {
                let html = child.to_html();
                // Separate block elements so adjacent text does not run together
                let spaced = html.replace("</h4>", "</h4>\n").replace("</p>", "</p>\n");
                strip_html(&spaced)
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
