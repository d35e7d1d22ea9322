use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheKeys;
use crate::render::{EmptyState, ItemTemplate, SeriesCard};

// ============================================================================
// Constants
// ============================================================================

/// Series content changes rarely; reuse the cache for 30 seconds.
const SERIES_INTERVAL: Duration = Duration::from_secs(30);

/// The project gallery refreshes near real-time.
const GALLERY_INTERVAL: Duration = Duration::from_secs(5);

const FEATURED_SERIES_ENDPOINT: &str = "data/featured-series.json";
const PROJECT_GALLERY_ENDPOINT: &str = "data/project-gallery.json";

const SERIES_EMPTY: EmptyState = EmptyState {
    class: "no-series",
    message: "No featured series available at the moment.",
};

const PROJECTS_EMPTY: EmptyState = EmptyState {
    class: "no-projects",
    message: "No project gallery items available at the moment.",
};

/// Whether a fresh cache entry short-circuits the fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessPolicy {
    /// Render a fresh cache entry without touching the network.
    HonorFreshness,
    /// Always fetch; the cache only backs fetch failures.
    AlwaysFetch,
}

/// Everything that distinguishes one feed from another.
#[derive(Clone)]
pub struct FeedProfile {
    pub name: &'static str,
    pub endpoint: String,
    pub cache_keys: CacheKeys,
    /// Freshness window, also the auto-refresh period.
    pub interval: Duration,
    pub policy: FreshnessPolicy,
    pub container_id: String,
    /// Page event that forces an immediate reload.
    pub update_event: Option<String>,
    pub auto_refresh: bool,
    /// Reload when another tab rewrites the payload key.
    pub sync_tabs: bool,
    pub empty_state: EmptyState,
    pub template: Arc<dyn ItemTemplate>,
}

impl fmt::Debug for FeedProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedProfile")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("cache_keys", &self.cache_keys)
            .field("interval", &self.interval)
            .field("policy", &self.policy)
            .field("container_id", &self.container_id)
            .finish_non_exhaustive()
    }
}

impl FeedProfile {
    /// Whether any trigger re-runs the loader after the first load.
    pub fn has_triggers(&self) -> bool {
        self.auto_refresh || self.update_event.is_some() || self.sync_tabs
    }

    pub fn featured_series() -> Self {
        Self {
            name: "featured-series",
            endpoint: FEATURED_SERIES_ENDPOINT.to_string(),
            cache_keys: series_keys(),
            interval: SERIES_INTERVAL,
            policy: FreshnessPolicy::HonorFreshness,
            container_id: "featuredSeriesContainer".to_string(),
            update_event: Some("featuredSeriesUpdate".to_string()),
            auto_refresh: true,
            sync_tabs: true,
            empty_state: SERIES_EMPTY,
            template: Arc::new(SeriesCard::new("data-series-id")),
        }
    }

    pub fn project_gallery() -> Self {
        Self {
            name: "project-gallery",
            endpoint: PROJECT_GALLERY_ENDPOINT.to_string(),
            cache_keys: gallery_keys(),
            interval: GALLERY_INTERVAL,
            policy: FreshnessPolicy::AlwaysFetch,
            container_id: "projectGalleryContainer".to_string(),
            update_event: Some("projectGalleryUpdate".to_string()),
            auto_refresh: true,
            sync_tabs: true,
            empty_state: PROJECTS_EMPTY,
            template: Arc::new(SeriesCard::new("data-project-id").linking_to("portfolio.html")),
        }
    }

    /// Featured series as shown on the portfolio page: loaded once.
    pub fn portfolio_series() -> Self {
        Self {
            name: "portfolio-series",
            container_id: "portfolioSeriesContainer".to_string(),
            update_event: None,
            auto_refresh: false,
            sync_tabs: false,
            ..Self::featured_series()
        }
    }

    /// Project gallery as shown on the portfolio page: loaded once and
    /// allowed to reuse a cache entry younger than the series window.
    pub fn portfolio_projects() -> Self {
        Self {
            name: "portfolio-projects",
            interval: SERIES_INTERVAL,
            policy: FreshnessPolicy::HonorFreshness,
            container_id: "portfolioProjectContainer".to_string(),
            update_event: None,
            auto_refresh: false,
            sync_tabs: false,
            template: Arc::new(SeriesCard::new("data-project-id")),
            ..Self::project_gallery()
        }
    }
}

fn series_keys() -> CacheKeys {
    CacheKeys::new("featuredSeriesData", "featuredSeriesLastUpdate")
}

fn gallery_keys() -> CacheKeys {
    CacheKeys::new("projectGalleryData", "projectGalleryLastUpdate")
}

/// The feeds the site knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    FeaturedSeries,
    ProjectGallery,
    PortfolioSeries,
    PortfolioProjects,
}

impl FeedKind {
    pub const ALL: [FeedKind; 4] = [
        FeedKind::FeaturedSeries,
        FeedKind::ProjectGallery,
        FeedKind::PortfolioSeries,
        FeedKind::PortfolioProjects,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::FeaturedSeries => "featured-series",
            FeedKind::ProjectGallery => "project-gallery",
            FeedKind::PortfolioSeries => "portfolio-series",
            FeedKind::PortfolioProjects => "portfolio-projects",
        }
    }

    pub fn profile(&self) -> FeedProfile {
        match self {
            FeedKind::FeaturedSeries => FeedProfile::featured_series(),
            FeedKind::ProjectGallery => FeedProfile::project_gallery(),
            FeedKind::PortfolioSeries => FeedProfile::portfolio_series(),
            FeedKind::PortfolioProjects => FeedProfile::portfolio_projects(),
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
