use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the in-page event channel.
const PAGE_EVENT_CAPACITY: usize = 64;

/// A named in-page event, e.g. `featuredSeriesUpdate`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEvent {
    pub name: String,
    pub detail: Option<Value>,
}

/// In-page event bus any code holding a clone can dispatch on.
#[derive(Debug, Clone)]
pub struct PageEvents {
    tx: broadcast::Sender<PageEvent>,
}

impl Default for PageEvents {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(PAGE_EVENT_CAPACITY);
        Self { tx }
    }
}

impl PageEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch an event. Returns how many listeners saw it.
    pub fn dispatch(&self, name: &str, detail: Option<Value>) -> usize {
        debug!(event = name, "Dispatching page event");
        self.tx
            .send(PageEvent {
                name: name.to_string(),
                detail,
            })
            .unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.tx.subscribe()
    }
}
