//! Feed lifecycle and refresh triggers.
//!
//! A started manager has rendered once and keeps a trigger task alive that
//! re-runs the loader on a timer, on the feed's page event, and when another
//! tab rewrites the feed's cached payload. Each trigger starts its own load;
//! concurrent loads are not de-duplicated and the last render wins.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::ContentSource;
use crate::cache::{ContentCache, LocalStorage, StorageEvents};
use crate::models::ContentItem;
use crate::render::{ContainerHandle, Page};

use super::{ContentLoader, FeedError, FeedProfile, LoadOutcome, PageEvent, PageEvents};

/// How long to wait for a missing container before giving up.
const CONTAINER_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A running feed: its loader plus the task listening for refresh triggers.
pub struct FeedManager {
    loader: ContentLoader,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl FeedManager {
    /// Attach a feed to its container, load it once and arm its triggers.
    ///
    /// Fails with [`FeedError::ContainerNotFound`] when the container is
    /// still missing after one retry.
    pub async fn start(
        profile: FeedProfile,
        page: &Page,
        source: Arc<dyn ContentSource>,
        storage: LocalStorage,
        events: &PageEvents,
    ) -> Result<Self, FeedError> {
        let container = resolve_container(page, &profile.container_id).await?;
        info!(feed = profile.name, container = %profile.container_id, "Starting feed");

        // Subscribe before the first load so nothing dispatched during it is lost
        let page_rx = profile.update_event.as_ref().map(|_| events.subscribe());
        let storage_rx = profile.sync_tabs.then(|| storage.subscribe());
        let has_triggers = profile.has_triggers();

        let loader = ContentLoader::new(profile, source, ContentCache::new(storage), container);
        let outcome = loader.load().await;
        debug!(feed = loader.profile().name, ?outcome, "Initial load complete");

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = has_triggers.then(|| {
            tokio::spawn(run_triggers(loader.clone(), page_rx, storage_rx, shutdown_rx))
        });

        Ok(Self {
            loader,
            shutdown,
            task,
        })
    }

    pub fn profile(&self) -> &FeedProfile {
        self.loader.profile()
    }

    pub fn loader(&self) -> &ContentLoader {
        &self.loader
    }

    pub fn container(&self) -> &ContainerHandle {
        self.loader.container()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn refresh(&self) -> LoadOutcome {
        self.loader.refresh().await
    }

    pub fn add_item(&self, item: ContentItem) {
        self.loader.add_item(item)
    }

    pub fn remove_item(&self, tag: &str) -> bool {
        self.loader.remove_item(tag)
    }

    /// Disarm every trigger and wait for the trigger task to exit.
    /// Loads already in flight run to completion.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(feed = self.profile().name, error = %e, "Trigger task ended abnormally");
            }
        }
        info!(feed = self.profile().name, "Feed stopped");
    }
}

impl Drop for FeedManager {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn resolve_container(page: &Page, id: &str) -> Result<ContainerHandle, FeedError> {
    if let Some(container) = page.container(id) {
        return Ok(container);
    }

    warn!(container = id, retry_ms = CONTAINER_RETRY_DELAY.as_millis() as u64, "Container not found, retrying");
    tokio::time::sleep(CONTAINER_RETRY_DELAY).await;

    match page.container(id) {
        Some(container) => {
            info!(container = id, "Container found on retry");
            Ok(container)
        }
        None => {
            error!(container = id, "Container still not found after retry");
            Err(FeedError::ContainerNotFound(id.to_string()))
        }
    }
}

async fn run_triggers(
    loader: ContentLoader,
    mut page_rx: Option<broadcast::Receiver<PageEvent>>,
    mut storage_rx: Option<StorageEvents>,
    mut shutdown: watch::Receiver<bool>,
) {
    let profile = loader.profile().clone();
    let mut ticker = profile.auto_refresh.then(|| {
        let mut ticker = interval_at(Instant::now() + profile.interval, profile.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = next_tick(&mut ticker) => spawn_load(&loader, "timer"),
            event = next_page_event(&mut page_rx) => match event {
                Ok(event) if profile.update_event.as_deref() == Some(event.name.as_str()) => {
                    debug!(feed = profile.name, detail = ?event.detail, "Update event received");
                    spawn_load(&loader, "page-event");
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(feed = profile.name, skipped, "Page event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => page_rx = None,
            },
            event = next_storage_event(&mut storage_rx) => match event {
                Some(event) if event.key == profile.cache_keys.payload => {
                    info!(feed = profile.name, "Cached payload updated from another tab");
                    spawn_load(&loader, "storage");
                }
                Some(_) => {}
                None => storage_rx = None,
            },
        }
    }
    debug!(feed = profile.name, "Trigger task exiting");
}

fn spawn_load(loader: &ContentLoader, trigger: &'static str) {
    debug!(feed = loader.profile().name, trigger, "Refresh triggered");
    let loader = loader.clone();
    tokio::spawn(async move {
        loader.load().await;
    });
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

async fn next_page_event(
    rx: &mut Option<broadcast::Receiver<PageEvent>>,
) -> Result<PageEvent, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn next_storage_event(rx: &mut Option<StorageEvents>) -> Option<crate::cache::StorageEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::loader::tests::{sea, MockSource};
    use crate::models::ContentCollection;

    async fn wait_for_render(rx: &mut watch::Receiver<u64>) {
        rx.changed().await.expect("container handle dropped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_container_gives_up_after_retry() {
        let page = Page::new();
        let result = FeedManager::start(
            FeedProfile::featured_series(),
            &page,
            MockSource::ok(sea()),
            LocalStorage::in_memory(),
            &PageEvents::new(),
        )
        .await;
        assert!(matches!(result, Err(FeedError::ContainerNotFound(id)) if id == "featuredSeriesContainer"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_container_appearing_within_retry_window() {
        let page = Page::new();
        let late_page = page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            late_page.insert_container("featuredSeriesContainer");
        });

        let source = MockSource::ok(sea());
        let manager = FeedManager::start(
            FeedProfile::featured_series(),
            &page,
            source.clone(),
            LocalStorage::in_memory(),
            &PageEvents::new(),
        )
        .await
        .expect("container appears during retry");

        assert_eq!(source.calls(), 1);
        assert_eq!(manager.container().snapshot().item_count(), 1);
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_reloads_at_interval() {
        let page = Page::new();
        page.insert_container("projectGalleryContainer");
        let source = MockSource::ok(sea());
        let manager = FeedManager::start(
            FeedProfile::project_gallery(),
            &page,
            source.clone(),
            LocalStorage::in_memory(),
            &PageEvents::new(),
        )
        .await
        .unwrap();
        assert_eq!(source.calls(), 1);
        assert!(manager.is_running());

        let start = Instant::now();
        let mut rx = manager.container().subscribe();
        wait_for_render(&mut rx).await;
        assert_eq!(source.calls(), 2);
        assert!(start.elapsed() >= Duration::from_secs(5));

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_event_reloads_and_honors_freshness() {
        let page = Page::new();
        page.insert_container("featuredSeriesContainer");
        let events = PageEvents::new();
        let source = MockSource::ok(sea());
        let manager = FeedManager::start(
            FeedProfile::featured_series(),
            &page,
            source.clone(),
            LocalStorage::in_memory(),
            &events,
        )
        .await
        .unwrap();

        let generation = manager.container().generation();
        let mut rx = manager.container().subscribe();
        events.dispatch("projectGalleryUpdate", None);
        events.dispatch("featuredSeriesUpdate", None);
        wait_for_render(&mut rx).await;

        // re-rendered from the fresh cache without fetching again
        assert_eq!(manager.container().generation(), generation + 1);
        assert_eq!(source.calls(), 1);

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_tab_write_triggers_reload() {
        let page = Page::new();
        page.insert_container("projectGalleryContainer");
        let storage = LocalStorage::in_memory();
        let other_tab = storage.open_tab();
        let source = MockSource::ok(sea());
        let manager = FeedManager::start(
            FeedProfile::project_gallery(),
            &page,
            source.clone(),
            storage,
            &PageEvents::new(),
        )
        .await
        .unwrap();

        let start = Instant::now();
        let mut rx = manager.container().subscribe();
        let other = ContentCache::new(other_tab);
        let updated = ContentCollection::List(vec![
            ContentItem::new(5, "e.jpg", "Fern", "Leaf"),
            ContentItem::new(6, "f.jpg", "Moss", "Stone"),
        ]);
        other.set(&manager.profile().cache_keys, &updated).unwrap();

        wait_for_render(&mut rx).await;
        assert_eq!(source.calls(), 2);
        // well before the first timer tick
        assert!(start.elapsed() < Duration::from_secs(5));

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer() {
        let page = Page::new();
        page.insert_container("projectGalleryContainer");
        let source = MockSource::ok(sea());
        let manager = FeedManager::start(
            FeedProfile::project_gallery(),
            &page,
            source.clone(),
            LocalStorage::in_memory(),
            &PageEvents::new(),
        )
        .await
        .unwrap();

        manager.stop().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_without_triggers_loads_once() {
        let page = Page::new();
        page.insert_container("portfolioSeriesContainer");
        let source = MockSource::ok(sea());
        let manager = FeedManager::start(
            FeedProfile::portfolio_series(),
            &page,
            source.clone(),
            LocalStorage::in_memory(),
            &PageEvents::new(),
        )
        .await
        .unwrap();

        assert!(!manager.is_running());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(manager.container().snapshot().item_count(), 1);
    }
}
