use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::item::{lenient_opt_string, lenient_string};
use super::ContentItem;

/// Version string written into generated envelopes.
const ENVELOPE_VERSION: &str = "1.0";

/// A feed document as fetched or cached.
///
/// Producers emit either a bare JSON array or an object with an `items`
/// array. Both shapes are accepted and preserved as-is on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentCollection {
    List(Vec<ContentItem>),
    Envelope(CollectionEnvelope),
}

/// Envelope metadata is informational only; off-type values are coerced or
/// dropped rather than rejecting the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionEnvelope {
    #[serde(default)]
    pub items: Vec<ContentItem>,
    #[serde(
        rename = "lastUpdated",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_string"
    )]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_string")]
    pub version: Option<String>,
    #[serde(
        rename = "seriesInfo",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_series_info"
    )]
    pub series_info: Option<SeriesInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(rename = "totalPieces", default, deserialize_with = "lenient_count")]
    pub total_pieces: u32,
}

fn lenient_series_info<'de, D>(deserializer: D) -> Result<Option<SeriesInfo>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => Ok(serde_json::from_value(value).ok()),
        _ => Ok(None),
    }
}

/// Non-negative count from a number or a numeric string; anything else is 0.
fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let count = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(count.unwrap_or_default())
}

impl Default for ContentCollection {
    fn default() -> Self {
        ContentCollection::Envelope(CollectionEnvelope::default())
    }
}

impl From<Vec<ContentItem>> for ContentCollection {
    fn from(items: Vec<ContentItem>) -> Self {
        ContentCollection::List(items)
    }
}

impl ContentCollection {
    /// Envelope returned by the serving layer when the feed file is unreadable.
    pub fn empty_state() -> Self {
        ContentCollection::Envelope(CollectionEnvelope {
            items: Vec::new(),
            last_updated: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            version: Some(ENVELOPE_VERSION.to_string()),
            series_info: Some(SeriesInfo {
                name: "No Series Available".to_string(),
                description: "No featured series available at the moment.".to_string(),
                total_pieces: 0,
            }),
        })
    }

    pub fn items(&self) -> &[ContentItem] {
        match self {
            ContentCollection::List(items) => items,
            ContentCollection::Envelope(envelope) => &envelope.items,
        }
    }

    fn items_mut(&mut self) -> &mut Vec<ContentItem> {
        match self {
            ContentCollection::List(items) => items,
            ContentCollection::Envelope(envelope) => &mut envelope.items,
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn push(&mut self, item: ContentItem) {
        self.items_mut().push(item);
    }

    /// Remove the item behind a node that was rendered at `position` with
    /// `tag`. Returns whether an item was removed.
    ///
    /// An item carrying an id must match the tag; an id-less item is taken by
    /// position. When the collection no longer lines up with what was
    /// rendered, the first item with that id is removed instead.
    pub fn remove_rendered(&mut self, tag: &str, position: usize) -> bool {
        let items = self.items_mut();
        let lines_up = items.get(position).is_some_and(|item| match item.id_tag() {
            Some(id) => id == tag,
            None => true,
        });
        let target = if lines_up {
            Some(position)
        } else {
            items.iter().position(|item| item.id_tag().as_deref() == Some(tag))
        };
        match target {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    }
}
