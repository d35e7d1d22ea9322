use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::sync::watch;

use super::Container;

/// Shared handle to one container.
///
/// Every mutation through [`ContainerHandle::update`] bumps a render
/// generation that observers can wait on.
#[derive(Clone)]
pub struct ContainerHandle {
    inner: Arc<Mutex<Container>>,
    generation: Arc<watch::Sender<u64>>,
}

impl ContainerHandle {
    fn new(id: &str) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Container::new(id))),
            generation: Arc::new(generation),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Container> {
        // A panic mid-render leaves a container that is still safe to replace
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mutate the container and notify observers.
    pub fn update<R>(&self, f: impl FnOnce(&mut Container) -> R) -> R {
        let result = {
            let mut container = self.lock();
            f(&mut container)
        };
        self.generation.send_modify(|g| *g += 1);
        result
    }

    /// Read the container without notifying anyone.
    pub fn read<R>(&self, f: impl FnOnce(&Container) -> R) -> R {
        let container = self.lock();
        f(&container)
    }

    pub fn snapshot(&self) -> Container {
        self.read(Container::clone)
    }

    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Receiver that changes on every update.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

/// The containers present on a page, by element id.
#[derive(Clone, Default)]
pub struct Page {
    containers: Arc<RwLock<HashMap<String, ContainerHandle>>>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a container, or return the existing one with that id.
    pub fn insert_container(&self, id: &str) -> ContainerHandle {
        let mut containers = self
            .containers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        containers
            .entry(id.to_string())
            .or_insert_with(|| ContainerHandle::new(id))
            .clone()
    }

    pub fn container(&self, id: &str) -> Option<ContainerHandle> {
        let containers = self
            .containers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        containers.get(id).cloned()
    }
}
