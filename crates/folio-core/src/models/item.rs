use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Identifier of a content item. Producers emit both numbers and strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{}", n),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ItemId {
    fn from(n: i64) -> Self {
        ItemId::Number(n)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::Text(s.to_string())
    }
}

/// One card of a feed.
///
/// Fetched JSON is not validated: a missing or oddly typed field becomes an
/// empty string so the item still renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_id")]
    pub id: Option<ItemId>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub image: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_string")]
    pub meta: Option<String>,
}

impl ContentItem {
    pub fn new(
        id: impl Into<ItemId>,
        image: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            image: image.into(),
            title: title.into(),
            description: description.into(),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    /// The value a rendered node is tagged with: the id, or the position
    /// when the item has no usable id.
    pub fn tag(&self, index: usize) -> String {
        self.id_tag().unwrap_or_else(|| index.to_string())
    }

    /// The id as a tag, when the item has a non-empty one.
    pub fn id_tag(&self) -> Option<String> {
        match &self.id {
            Some(ItemId::Text(s)) if s.is_empty() => None,
            Some(id) => Some(id.to_string()),
            None => None,
        }
    }

    /// Meta line to display, if any. An empty string counts as absent.
    pub fn meta_line(&self) -> Option<&str> {
        self.meta.as_deref().filter(|m| !m.is_empty())
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub(super) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(value).unwrap_or_default())
}

pub(super) fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(value))
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<ItemId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(ItemId::Number(i)),
            None => Some(ItemId::Text(n.to_string())),
        },
        Value::String(s) => Some(ItemId::Text(s)),
        Value::Bool(b) => Some(ItemId::Text(b.to_string())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_item() {
        let json = r#"{"id":"s1_p1","title":"Tide","description":"Low water","image":"assets/s1_p1.jpg","meta":"Series 1 • 2025"}"#;
        let item: ContentItem = serde_json::from_str(json).expect("valid item");
        assert_eq!(item.id, Some(ItemId::Text("s1_p1".to_string())));
        assert_eq!(item.title, "Tide");
        assert_eq!(item.meta_line(), Some("Series 1 • 2025"));
    }

    #[test]
    fn test_parse_malformed_fields_as_empty() {
        let json = r#"{"id":7,"title":null,"description":42,"image":["x"]}"#;
        let item: ContentItem = serde_json::from_str(json).expect("lenient item");
        assert_eq!(item.id, Some(ItemId::Number(7)));
        assert_eq!(item.title, "");
        assert_eq!(item.description, "42");
        assert_eq!(item.image, "");
        assert_eq!(item.meta_line(), None);
    }

    #[test]
    fn test_tag_falls_back_to_index() {
        let mut item = ContentItem::new(1, "a.jpg", "Sea", "Ocean study");
        assert_eq!(item.tag(4), "1");

        item.id = None;
        assert_eq!(item.tag(4), "4");

        item.id = Some(ItemId::Text(String::new()));
        assert_eq!(item.tag(2), "2");
    }

    #[test]
    fn test_empty_meta_is_absent() {
        let item = ContentItem::new(1, "a.jpg", "Sea", "Ocean study").with_meta("");
        assert_eq!(item.meta_line(), None);
    }

    #[test]
    fn test_serialize_omits_absent_optionals() {
        let mut item = ContentItem::new(1, "a.jpg", "Sea", "Ocean study");
        item.id = None;
        let json = serde_json::to_string(&item).expect("serialize");
        assert!(!json.contains("\"id\""));
        assert!(!json.contains("\"meta\""));
    }
}
