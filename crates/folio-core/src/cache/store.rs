use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the storage change channel shared by all tabs.
const STORAGE_EVENT_CAPACITY: usize = 64;

static NEXT_TAB_ID: AtomicU64 = AtomicU64::new(1);

/// String key/value persistence, the equivalent of a browser's local storage.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// One file per key inside a cache directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn item_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            bail!("Invalid storage key: {:?}", key);
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.item_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read storage item: {}", key))?;
        Ok(Some(contents))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let path = self.item_path(key)?;
        std::fs::write(&path, value)
            .with_context(|| format!("Failed to write storage item: {}", key))?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let path = self.item_path(key)?;
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove storage item: {}", key))?;
        }
        Ok(())
    }
}

/// Identifies one storage handle, i.e. one open page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(u64);

impl TabId {
    fn next() -> Self {
        TabId(NEXT_TAB_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A key changed through some tab's handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub tab: TabId,
}

/// Shared handle to a storage backend.
///
/// Clones belong to the same tab. [`LocalStorage::open_tab`] creates a
/// sibling over the same backend whose writes are reported to every other
/// tab's [`StorageEvents`]. A write that leaves the value unchanged is not
/// reported.
#[derive(Clone)]
pub struct LocalStorage {
    backend: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<StorageEvent>,
    tab: TabId,
}

impl LocalStorage {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        let (events, _) = broadcast::channel(STORAGE_EVENT_CAPACITY);
        Self {
            backend: Arc::new(backend),
            events,
            tab: TabId::next(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// File-backed storage rooted at `dir`.
    pub fn open(dir: PathBuf) -> Result<Self> {
        Ok(Self::new(FileStore::new(dir)?))
    }

    pub fn open_tab(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            events: self.events.clone(),
            tab: TabId::next(),
        }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.backend.get_item(key)
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let unchanged = matches!(self.backend.get_item(key), Ok(Some(ref old)) if old == value);
        self.backend.set_item(key, value)?;
        if !unchanged {
            self.notify(key);
        }
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        let existed = matches!(self.backend.get_item(key), Ok(Some(_)));
        self.backend.remove_item(key)?;
        if existed {
            self.notify(key);
        }
        Ok(())
    }

    pub fn subscribe(&self) -> StorageEvents {
        StorageEvents {
            rx: self.events.subscribe(),
            tab: self.tab,
        }
    }

    fn notify(&self, key: &str) {
        // No subscribers is not an error
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            tab: self.tab,
        });
    }
}

/// Storage changes made by other tabs.
pub struct StorageEvents {
    rx: broadcast::Receiver<StorageEvent>,
    tab: TabId,
}

impl StorageEvents {
    /// Next change from another tab, or `None` once every handle is gone.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.tab == self.tab => continue,
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Storage event receiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
