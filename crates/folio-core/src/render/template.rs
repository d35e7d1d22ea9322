use crate::models::ContentItem;
use crate::utils::escape_html;

use super::ItemNode;

/// Maps one item to the node rendered for it.
pub trait ItemTemplate: Send + Sync {
    fn build(&self, item: &ContentItem, tag: String) -> ItemNode;
}

/// The image card used by every feed on the site.
#[derive(Debug, Clone)]
pub struct SeriesCard {
    pub tag_attribute: &'static str,
    /// Page the image and title navigate to when clicked.
    pub link: Option<&'static str>,
}

impl SeriesCard {
    pub fn new(tag_attribute: &'static str) -> Self {
        Self {
            tag_attribute,
            link: None,
        }
    }

    pub fn linking_to(mut self, page: &'static str) -> Self {
        self.link = Some(page);
        self
    }
}

impl ItemTemplate for SeriesCard {
    fn build(&self, item: &ContentItem, tag: String) -> ItemNode {
        let title = escape_html(&item.title);
        let image = escape_html(&item.image);
        let description = escape_html(&item.description);

        let (image_html, title_html) = match self.link {
            Some(link) => {
                let link = escape_html(link);
                (
                    format!(
                        r#"<a href="{link}"><img src="{image}" alt="{title}" class="gallery-image" loading="lazy"></a>"#
                    ),
                    format!(r#"<h4><a href="{link}">{title}</a></h4>"#),
                )
            }
            None => (
                format!(r#"<img src="{image}" alt="{title}" class="gallery-image" loading="lazy">"#),
                format!("<h4>{title}</h4>"),
            ),
        };

        let meta_html = item
            .meta_line()
            .map(|meta| format!(r#"<div class="series-meta">{}</div>"#, escape_html(meta)))
            .unwrap_or_default();

        ItemNode {
            tag_attribute: self.tag_attribute,
            tag,
            html: format!(
                r#"<div class="series-image">{image_html}</div><div class="series-text">{title_html}<p>{description}</p>{meta_html}</div>"#
            ),
        }
    }
}
