use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::event::{CreateKind, RemoveKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::scanner::CatalogScanner;

/// Minimum gap between two rescans.
pub const UPDATE_DELAY: Duration = Duration::from_secs(2);

/// Lets an update through at most once per `delay`. Changes arriving inside
/// the window are dropped.
#[derive(Debug, Clone)]
pub struct UpdateThrottle {
    delay: Duration,
    last: Option<Instant>,
}

impl UpdateThrottle {
    pub fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }

    pub fn should_run(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.delay => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for UpdateThrottle {
    fn default() -> Self {
        Self::new(UPDATE_DELAY)
    }
}

/// Re-runs a [`CatalogScanner`] whenever a file under its source folder changes.
pub struct CatalogWatcher {
    scanner: Arc<CatalogScanner>,
    throttle: UpdateThrottle,
}

impl CatalogWatcher {
    pub fn new(scanner: CatalogScanner) -> Self {
        Self {
            scanner: Arc::new(scanner),
            throttle: UpdateThrottle::default(),
        }
    }

    pub fn with_throttle(mut self, throttle: UpdateThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Watch until `shutdown` resolves.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if is_file_change(&event) {
                        debug!(paths = ?event.paths, "Catalog change");
                        if tx.send(()).is_err() {
                            debug!("Catalog watcher stopped, dropping change");
                        }
                    }
                }
                Err(e) => error!("Watch error: {:?}", e),
            },
            Config::default(),
        )
        .context("Failed to create catalog watcher")?;

        let source = self.scanner.source_dir().to_path_buf();
        watcher
            .watch(&source, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch path: {}", source.display()))?;
        info!(path = %source.display(), layout = %self.scanner.layout(), "Watching catalog");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                change = rx.recv() => {
                    if change.is_none() {
                        break;
                    }
                    if self.throttle.should_run(Instant::now()) {
                        self.rescan().await;
                    }
                }
            }
        }

        info!("Catalog watcher stopped");
        Ok(())
    }

    async fn rescan(&self) {
        let scanner = Arc::clone(&self.scanner);
        match tokio::task::spawn_blocking(move || scanner.run()).await {
            Ok(Ok(report)) => info!(items = report.items, "Catalog rescanned"),
            Ok(Err(e)) => error!("Catalog rescan failed: {:#}", e),
            Err(e) => error!("Catalog rescan task failed: {}", e),
        }
    }
}

/// Create, modify and remove events that touch files rather than folders.
fn is_file_change(event: &Event) -> bool {
    match event.kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => false,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
            event.paths.iter().any(|path| !path.is_dir())
        }
        EventKind::Any | EventKind::Access(_) | EventKind::Other => false,
    }
}
