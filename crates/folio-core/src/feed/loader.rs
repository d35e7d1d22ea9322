//! One load cycle of a feed.
//!
//! Read the cache, render it when fresh enough, otherwise fetch, write the
//! result through to the cache and render it. Every failure degrades to the
//! cached entry (however old) or to the empty placeholder; nothing is
//! returned to the caller as an error.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::api::ContentSource;
use crate::cache::{CacheEntry, ContentCache};
use crate::models::{ContentCollection, ContentItem, ItemId};
use crate::render::{render, Child, ContainerHandle};

use super::{FeedProfile, FreshnessPolicy};

/// How a load cycle ended up rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A fresh cache entry was rendered without a fetch.
    FromCache,
    /// The fetch succeeded and was cached and rendered.
    Fetched,
    /// The fetch failed and an older cache entry was rendered.
    StaleFallback,
    /// The fetch failed with nothing cached; the placeholder was rendered.
    Empty,
}

/// Runs the cache-then-fetch-then-render cycle for one feed.
/// Clone is cheap; clones share the profile, source, cache and container.
#[derive(Clone)]
pub struct ContentLoader {
    profile: Arc<FeedProfile>,
    source: Arc<dyn ContentSource>,
    cache: ContentCache,
    container: ContainerHandle,
}

impl ContentLoader {
    pub fn new(
        profile: FeedProfile,
        source: Arc<dyn ContentSource>,
        cache: ContentCache,
        container: ContainerHandle,
    ) -> Self {
        Self {
            profile: Arc::new(profile),
            source,
            cache,
            container,
        }
    }

    pub fn profile(&self) -> &FeedProfile {
        &self.profile
    }

    pub fn container(&self) -> &ContainerHandle {
        &self.container
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Run one load cycle and render its result.
    pub async fn load(&self) -> LoadOutcome {
        match AssertUnwindSafe(self.try_load()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(feed = self.profile.name, "Load cycle panicked, falling back to cache");
                let cached = self.cache.get(&self.profile.cache_keys);
                self.render_fallback(cached)
            }
        }
    }

    async fn try_load(&self) -> LoadOutcome {
        let keys = &self.profile.cache_keys;
        let cached = self.cache.get(keys);

        if self.profile.policy == FreshnessPolicy::HonorFreshness {
            if let Some(entry) = cached.as_ref() {
                if entry.is_fresh(self.profile.interval, Utc::now()) {
                    debug!(feed = self.profile.name, "Rendering from fresh cache");
                    self.render(&entry.payload);
                    return LoadOutcome::FromCache;
                }
            }
        }

        match self.source.fetch(&self.profile.endpoint).await {
            Ok(collection) => {
                if let Err(e) = self.cache.set(keys, &collection) {
                    warn!(feed = self.profile.name, error = %e, "Failed to cache fetched data");
                }
                debug!(feed = self.profile.name, items = collection.len(), "Fetched content");
                self.render(&collection);
                LoadOutcome::Fetched
            }
            Err(e) => {
                warn!(feed = self.profile.name, endpoint = %self.profile.endpoint, error = %e, "Fetch failed");
                self.render_fallback(cached)
            }
        }
    }

    fn render_fallback(&self, cached: Option<CacheEntry>) -> LoadOutcome {
        match cached {
            Some(entry) => {
                info!(feed = self.profile.name, age = %entry.age_display(), "Using cached data");
                self.render(&entry.payload);
                LoadOutcome::StaleFallback
            }
            None => {
                self.render(&ContentCollection::default());
                LoadOutcome::Empty
            }
        }
    }

    fn render(&self, collection: &ContentCollection) {
        let profile = &self.profile;
        self.container.update(|container| {
            render(container, collection, profile.template.as_ref(), &profile.empty_state)
        });
    }

    /// Drop the cached entry and load again from the source.
    pub async fn refresh(&self) -> LoadOutcome {
        info!(feed = self.profile.name, "Manually refreshing");
        if let Err(e) = self.cache.clear(&self.profile.cache_keys) {
            warn!(feed = self.profile.name, error = %e, "Failed to clear cache");
        }
        self.load().await
    }

    /// Append an item to the container and to the cached collection.
    /// An item without an id is given the current epoch milliseconds, so the
    /// rendered tag and the cached item agree.
    pub fn add_item(&self, mut item: ContentItem) {
        let tag = match item.id_tag() {
            Some(tag) => tag,
            None => {
                let id = Utc::now().timestamp_millis();
                item.id = Some(ItemId::Number(id));
                id.to_string()
            }
        };
        let node = self.profile.template.build(&item, tag);
        self.container.update(|container| container.append(Child::Item(node)));

        let keys = &self.profile.cache_keys;
        let mut current = self
            .cache
            .get(keys)
            .map(|entry| entry.payload)
            .unwrap_or_default();
        current.push(item);
        if let Err(e) = self.cache.set(keys, &current) {
            warn!(feed = self.profile.name, error = %e, "Failed to cache added item");
        }
    }

    /// Remove the node tagged `tag` and drop the matching cached item.
    /// Returns whether a node was removed.
    pub fn remove_item(&self, tag: &str) -> bool {
        let Some(position) = self.container.update(|container| container.remove_tagged(tag)) else {
            debug!(feed = self.profile.name, tag, "No rendered item with that tag");
            return false;
        };

        let keys = &self.profile.cache_keys;
        if let Some(mut entry) = self.cache.get(keys) {
            if entry.payload.remove_rendered(tag, position) {
                if let Err(e) = self.cache.set(keys, &entry.payload) {
                    warn!(feed = self.profile.name, error = %e, "Failed to cache removal");
                }
            } else {
                debug!(feed = self.profile.name, tag, "Removed item was not cached");
            }
        }
        true
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration;

    use super::*;
    use crate::api::FetchError;
    use crate::cache::LocalStorage;
    use crate::render::{Container, Page};

    /// Source returning a scripted response and counting calls.
    pub(crate) struct MockSource {
        response: Mutex<Option<ContentCollection>>,
        calls: AtomicUsize,
    }

    impl MockSource {
        pub(crate) fn ok(collection: ContentCollection) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(collection)),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn failing() -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(None),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentSource for MockSource {
        async fn fetch(&self, endpoint: &str) -> Result<ContentCollection, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| FetchError::NotFound(endpoint.to_string()))
        }
    }

    struct PanickingSource;

    #[async_trait]
    impl ContentSource for PanickingSource {
        async fn fetch(&self, _endpoint: &str) -> Result<ContentCollection, FetchError> {
            panic!("source exploded");
        }
    }

    pub(crate) fn sea() -> ContentCollection {
        ContentCollection::List(vec![ContentItem::new(1, "a.jpg", "Sea", "Ocean study")])
    }

    fn hills() -> ContentCollection {
        ContentCollection::List(vec![
            ContentItem::new(2, "b.jpg", "Hill", "Green slope"),
            ContentItem::new(3, "c.jpg", "Ridge", "Stone"),
        ])
    }

    fn loader(profile: FeedProfile, source: Arc<dyn ContentSource>, cache: &ContentCache) -> ContentLoader {
        let page = Page::new();
        let container = page.insert_container(&profile.container_id);
        ContentLoader::new(profile, source, cache.clone(), container)
    }

    fn rendered(profile: &FeedProfile, collection: &ContentCollection) -> Container {
        let mut container = Container::new(profile.container_id.clone());
        render(&mut container, collection, profile.template.as_ref(), &profile.empty_state);
        container
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_fetch() {
        let cache = ContentCache::new(LocalStorage::in_memory());
        let profile = FeedProfile::featured_series();
        cache.set(&profile.cache_keys, &hills()).unwrap();

        let source = MockSource::ok(sea());
        let loader = loader(profile.clone(), source.clone(), &cache);

        assert_eq!(loader.load().await, LoadOutcome::FromCache);
        assert_eq!(source.calls(), 0);
        assert_eq!(loader.container().snapshot(), rendered(&profile, &hills()));
    }

    #[tokio::test]
    async fn test_stale_cache_fetches_once_and_writes_through() {
        let cache = ContentCache::new(LocalStorage::in_memory());
        let profile = FeedProfile::featured_series();
        cache
            .set_at(&profile.cache_keys, &hills(), Utc::now() - Duration::seconds(30))
            .unwrap();

        let source = MockSource::ok(sea());
        let loader = loader(profile.clone(), source.clone(), &cache);

        assert_eq!(loader.load().await, LoadOutcome::Fetched);
        assert_eq!(source.calls(), 1);
        let entry = cache.get(&profile.cache_keys).unwrap();
        assert_eq!(entry.payload, sea());
        assert!(entry.is_fresh(profile.interval, Utc::now()));
        assert_eq!(loader.container().snapshot(), rendered(&profile, &sea()));
    }

    #[tokio::test]
    async fn test_always_fetch_ignores_fresh_cache() {
        let cache = ContentCache::new(LocalStorage::in_memory());
        let profile = FeedProfile::project_gallery();
        cache.set(&profile.cache_keys, &hills()).unwrap();

        let source = MockSource::ok(sea());
        let loader = loader(profile, source.clone(), &cache);

        assert_eq!(loader.load().await, LoadOutcome::Fetched);
        assert_eq!(loader.load().await, LoadOutcome::Fetched);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_stale_cache() {
        let cache = ContentCache::new(LocalStorage::in_memory());
        let profile = FeedProfile::featured_series();
        cache
            .set_at(&profile.cache_keys, &hills(), Utc::now() - Duration::hours(3))
            .unwrap();

        let source = MockSource::failing();
        let loader = loader(profile.clone(), source.clone(), &cache);

        assert_eq!(loader.load().await, LoadOutcome::StaleFallback);
        assert_eq!(source.calls(), 1);
        assert_eq!(loader.container().snapshot(), rendered(&profile, &hills()));
    }

    #[tokio::test]
    async fn test_failure_without_cache_renders_placeholder() {
        let cache = ContentCache::new(LocalStorage::in_memory());
        let profile = FeedProfile::project_gallery();
        let loader = loader(profile, MockSource::failing(), &cache);

        assert_eq!(loader.load().await, LoadOutcome::Empty);
        let container = loader.container().snapshot();
        assert_eq!(container.item_count(), 0);
        assert_eq!(container.text(), "No project gallery items available at the moment.");
    }

    #[tokio::test]
    async fn test_empty_envelope_renders_placeholder() {
        let cache = ContentCache::new(LocalStorage::in_memory());
        let empty: ContentCollection = serde_json::from_str(r#"{"items":[]}"#).unwrap();
        let loader = loader(FeedProfile::featured_series(), MockSource::ok(empty), &cache);

        assert_eq!(loader.load().await, LoadOutcome::Fetched);
        assert_eq!(
            loader.container().snapshot().text(),
            "No featured series available at the moment."
        );
    }

    #[tokio::test]
    async fn test_panic_degrades_to_cache() {
        let cache = ContentCache::new(LocalStorage::in_memory());
        let profile = FeedProfile::project_gallery();
        cache.set(&profile.cache_keys, &hills()).unwrap();
        let loader = loader(profile.clone(), Arc::new(PanickingSource), &cache);

        assert_eq!(loader.load().await, LoadOutcome::StaleFallback);
        assert_eq!(loader.container().snapshot(), rendered(&profile, &hills()));
    }

    #[tokio::test]
    async fn test_refresh_clears_fresh_cache_and_fetches() {
        let cache = ContentCache::new(LocalStorage::in_memory());
        let profile = FeedProfile::featured_series();
        cache.set(&profile.cache_keys, &hills()).unwrap();

        let source = MockSource::ok(sea());
        let loader = loader(profile.clone(), source.clone(), &cache);

        assert_eq!(loader.refresh().await, LoadOutcome::Fetched);
        assert_eq!(source.calls(), 1);
        assert_eq!(cache.get(&profile.cache_keys).unwrap().payload, sea());
    }

    #[tokio::test]
    async fn test_remove_item_updates_view_and_cache() {
        let cache = ContentCache::new(LocalStorage::in_memory());
        let profile = FeedProfile::featured_series();
        let loader = loader(profile.clone(), MockSource::ok(hills()), &cache);
        loader.load().await;

        assert!(loader.remove_item("2"));
        let container = loader.container().snapshot();
        assert_eq!(container.item_count(), 1);
        assert_eq!(container.items().next().unwrap().tag, "3");

        let cached = cache.get(&profile.cache_keys).unwrap().payload;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached.items()[0].title, "Ridge");

        assert!(!loader.remove_item("2"));
    }

    #[tokio::test]
    async fn test_remove_id_less_items_keeps_view_and_cache_in_step() {
        let cache = ContentCache::new(LocalStorage::in_memory());
        let profile = FeedProfile::featured_series();
        let item = |title: &str| ContentItem {
            id: None,
            ..ContentItem::new(0, "x.jpg", title, "")
        };
        let collection = ContentCollection::List(vec![item("A"), item("B"), item("C")]);
        let loader = loader(profile.clone(), MockSource::ok(collection), &cache);
        loader.load().await;

        assert!(loader.remove_item("0"));
        assert!(loader.remove_item("1"));

        let container = loader.container().snapshot();
        assert_eq!(container.item_count(), 1);
        assert_eq!(container.items().next().unwrap().tag, "2");

        let cached = cache.get(&profile.cache_keys).unwrap().payload;
        let titles: Vec<&str> = cached.items().iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["C"]);
    }

    #[tokio::test]
    async fn test_added_item_without_id_can_be_removed_from_cache() {
        let cache = ContentCache::new(LocalStorage::in_memory());
        let profile = FeedProfile::featured_series();
        let loader = loader(profile.clone(), MockSource::failing(), &cache);

        loader.add_item(ContentItem {
            id: None,
            ..ContentItem::new(0, "d.jpg", "Dawn", "First light")
        });
        let tag = loader.container().snapshot().items().next().unwrap().tag.clone();
        let cached = cache.get(&profile.cache_keys).unwrap().payload;
        assert_eq!(cached.items()[0].id_tag(), Some(tag.clone()));

        assert!(loader.remove_item(&tag));
        assert_eq!(loader.container().snapshot().item_count(), 0);
        assert!(cache.get(&profile.cache_keys).unwrap().payload.is_empty());
    }

    #[tokio::test]
    async fn test_add_item_appends_and_caches() {
        let cache = ContentCache::new(LocalStorage::in_memory());
        let profile = FeedProfile::featured_series();
        let source = MockSource::failing();
        let loader = loader(profile.clone(), source.clone(), &cache);

        loader.add_item(ContentItem::new("new", "n.jpg", "Dawn", "First light"));

        let container = loader.container().snapshot();
        assert_eq!(container.items().next().unwrap().tag, "new");
        let cached = cache.get(&profile.cache_keys).unwrap().payload;
        assert!(matches!(cached, ContentCollection::Envelope(_)));
        assert_eq!(cached.items()[0].title, "Dawn");

        // the freshly written cache satisfies the next load
        assert_eq!(loader.load().await, LoadOutcome::FromCache);
        assert_eq!(source.calls(), 0);
        assert_eq!(loader.container().snapshot().item_count(), 1);
    }
}
