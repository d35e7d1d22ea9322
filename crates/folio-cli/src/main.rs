//! folio: headless driver, content tooling and static server for the
//! portfolio site.

mod server;

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use folio_core::{
    CatalogLayout, CatalogScanner, CatalogWatcher, Config, ContentCache, ContentLoader, ContentSource,
    FeedKind, FeedManager, FileSource, HttpSource, LoadOutcome, LocalStorage, Page, PageEvents,
};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "folio", version, about = "Portfolio content feeds: load, cache, render and publish")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the site directory and the featured-series API
    Serve {
        #[arg(long)]
        site_dir: Option<PathBuf>,
        /// Address to bind, e.g. 127.0.0.1:8080
        #[arg(long)]
        bind: Option<String>,
    },
    /// Load a feed into a headless page and print its container
    Show {
        #[arg(value_enum)]
        feed: FeedArg,
        #[command(flatten)]
        origin: OriginArgs,
        /// Keep running and print after every re-render
        #[arg(long)]
        follow: bool,
        /// Print text instead of markup
        #[arg(long)]
        text: bool,
    },
    /// Clear the cache of one or more feeds and load them again
    Refresh {
        #[arg(value_enum, required_unless_present = "all", conflicts_with = "all")]
        feeds: Vec<FeedArg>,
        #[arg(long)]
        all: bool,
        #[command(flatten)]
        origin: OriginArgs,
    },
    /// Remove one item from a feed's view and cache
    Remove {
        #[arg(value_enum)]
        feed: FeedArg,
        /// Item id (or position for items without one)
        id: String,
        #[command(flatten)]
        origin: OriginArgs,
    },
    /// Inspect or clear cached feed payloads
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
    /// Rebuild a feed file from a photo folder
    Scan {
        #[arg(value_enum)]
        layout: LayoutArg,
        #[command(flatten)]
        catalog: CatalogArgs,
    },
    /// Rebuild a feed file whenever its photo folder changes
    Watch {
        #[arg(value_enum)]
        layout: LayoutArg,
        #[command(flatten)]
        catalog: CatalogArgs,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Show the age of each cached payload
    Status,
    /// Clear one feed's cache, or every feed's
    Clear {
        #[arg(value_enum)]
        feed: Option<FeedArg>,
    },
}

/// Where feed documents are fetched from.
#[derive(Args)]
struct OriginArgs {
    /// Fetch over HTTP from this origin
    #[arg(long, conflicts_with = "site_dir")]
    site_url: Option<String>,
    /// Read feed files from this site directory
    #[arg(long)]
    site_dir: Option<PathBuf>,
}

#[derive(Args)]
struct CatalogArgs {
    /// Photo folder to scan
    #[arg(long)]
    source: Option<PathBuf>,
    /// Site directory receiving assets/ and data/
    #[arg(long)]
    site_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FeedArg {
    FeaturedSeries,
    ProjectGallery,
    PortfolioSeries,
    PortfolioProjects,
}

impl From<FeedArg> for FeedKind {
    fn from(arg: FeedArg) -> Self {
        match arg {
            FeedArg::FeaturedSeries => FeedKind::FeaturedSeries,
            FeedArg::ProjectGallery => FeedKind::ProjectGallery,
            FeedArg::PortfolioSeries => FeedKind::PortfolioSeries,
            FeedArg::PortfolioProjects => FeedKind::PortfolioProjects,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Series,
    Projects,
}

impl From<LayoutArg> for CatalogLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Series => CatalogLayout::Series,
            LayoutArg::Projects => CatalogLayout::Projects,
        }
    }
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` wins over `-v`. The returned guard flushes the log file on drop.
fn init_tracing(verbose: u8, log_file: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(std::path::Path::new("."));
            let file_name = path.file_name().context("Log file path has no file name")?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.verbose, cli.log_file.as_ref())?;
    info!("folio starting");

    let config = Config::load()?;

    match cli.command {
        Command::Serve { site_dir, bind } => serve(&config, site_dir, bind).await,
        Command::Show {
            feed,
            origin,
            follow,
            text,
        } => show(&config, feed.into(), &origin, follow, text).await,
        Command::Refresh { feeds, all, origin } => {
            let kinds: Vec<FeedKind> = if all {
                FeedKind::ALL.to_vec()
            } else {
                feeds.into_iter().map(FeedKind::from).collect()
            };
            refresh(&config, &kinds, &origin).await
        }
        Command::Remove { feed, id, origin } => remove(&config, feed.into(), &id, &origin).await,
        Command::Cache { action } => match action {
            CacheCommand::Status => cache_status(&config),
            CacheCommand::Clear { feed } => cache_clear(&config, feed.map(FeedKind::from)),
        },
        Command::Scan { layout, catalog } => {
            let scanner = catalog_scanner(&config, layout.into(), catalog)?;
            let report = tokio::task::spawn_blocking(move || scanner.run()).await??;
            match report.written {
                Some(path) => println!("{} items written to {}", report.items, path.display()),
                None => println!("No items found, feed file left untouched"),
            }
            Ok(())
        }
        Command::Watch { layout, catalog } => {
            let scanner = catalog_scanner(&config, layout.into(), catalog)?;
            let initial = scanner.clone();
            let report = tokio::task::spawn_blocking(move || initial.run()).await??;
            println!("{} items found, watching {} (Ctrl+C to stop)", report.items, scanner.source_dir().display());
            CatalogWatcher::new(scanner)
                .run(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await
        }
    }
}

async fn serve(config: &Config, site_dir: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let site_dir = site_dir.unwrap_or_else(|| config.site_dir());
    let bind = bind.unwrap_or_else(|| config.bind_addr().to_string());

    let app = server::create_app(site_dir.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(addr = %bind, site_dir = %site_dir.display(), "Serving site");
    println!("Serving {} at http://{}/", site_dir.display(), bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

/// Flags first, then the configured origin, then the default site URL.
fn content_source(config: &Config, origin: &OriginArgs) -> Result<Arc<dyn ContentSource>> {
    if let Some(dir) = &origin.site_dir {
        return Ok(Arc::new(FileSource::new(dir.clone())));
    }
    if origin.site_url.is_none() && config.site_url.is_none() {
        if let Some(dir) = &config.site_dir {
            return Ok(Arc::new(FileSource::new(dir.clone())));
        }
    }

    let url = origin.site_url.as_deref().unwrap_or_else(|| config.site_url());
    let source = match config.request_timeout_secs {
        Some(secs) => HttpSource::with_timeout(url, Duration::from_secs(secs))?,
        None => HttpSource::new(url)?,
    };
    Ok(Arc::new(source))
}

fn open_storage(config: &Config) -> Result<LocalStorage> {
    let dir = config.cache_dir()?;
    LocalStorage::open(dir.clone()).with_context(|| format!("Failed to open cache: {}", dir.display()))
}

/// A loader rendering into a detached container.
fn detached_loader(kind: FeedKind, source: Arc<dyn ContentSource>, storage: LocalStorage) -> ContentLoader {
    let profile = kind.profile();
    let page = Page::new();
    let container = page.insert_container(&profile.container_id);
    ContentLoader::new(profile, source, ContentCache::new(storage), container)
}

fn describe(outcome: LoadOutcome) -> &'static str {
    match outcome {
        LoadOutcome::FromCache => "rendered from cache",
        LoadOutcome::Fetched => "fetched",
        LoadOutcome::StaleFallback => "fetch failed, rendered stale cache",
        LoadOutcome::Empty => "fetch failed, nothing cached",
    }
}

async fn show(config: &Config, kind: FeedKind, origin: &OriginArgs, follow: bool, text: bool) -> Result<()> {
    let source = content_source(config, origin)?;
    let storage = open_storage(config)?;
    let profile = kind.profile();

    let page = Page::new();
    page.insert_container(&profile.container_id);
    let events = PageEvents::new();
    let manager = FeedManager::start(profile, &page, source, storage, &events).await?;

    let print = |manager: &FeedManager| {
        let rendered = manager.container().read(|c| if text { c.text() } else { c.to_html() });
        println!("{}", rendered);
    };
    print(&manager);

    if follow {
        let mut renders = manager.container().subscribe();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = renders.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    print(&manager);
                }
            }
        }
    }

    manager.stop().await;
    Ok(())
}

async fn refresh(config: &Config, kinds: &[FeedKind], origin: &OriginArgs) -> Result<()> {
    let source = content_source(config, origin)?;
    let storage = open_storage(config)?;

    let loaders: Vec<(FeedKind, ContentLoader)> = kinds
        .iter()
        .map(|&kind| (kind, detached_loader(kind, Arc::clone(&source), storage.clone())))
        .collect();

    let results = futures::future::join_all(loaders.iter().map(|(kind, loader)| async move {
        let outcome = loader.refresh().await;
        let items = loader.container().read(|c| c.item_count());
        (*kind, outcome, items)
    }))
    .await;

    for (kind, outcome, items) in results {
        println!("{}: {} ({} items)", kind, describe(outcome), items);
    }
    Ok(())
}

async fn remove(config: &Config, kind: FeedKind, id: &str, origin: &OriginArgs) -> Result<()> {
    let source = content_source(config, origin)?;
    let loader = detached_loader(kind, source, open_storage(config)?);

    let outcome = loader.load().await;
    info!(feed = %kind, ?outcome, "Loaded before removal");

    if !loader.remove_item(id) {
        bail!("No item {} in {}", id, kind);
    }
    println!("Removed {} from {}", id, kind);
    Ok(())
}

fn cache_status(config: &Config) -> Result<()> {
    let cache = ContentCache::new(open_storage(config)?);
    let mut seen = HashSet::new();

    for kind in FeedKind::ALL {
        let keys = kind.profile().cache_keys;
        if !seen.insert(keys.payload.clone()) {
            continue;
        }
        match cache.get(&keys) {
            Some(entry) => println!(
                "{:<14} {} items, updated {}",
                keys.payload,
                entry.payload.len(),
                entry.age_display()
            ),
            None => println!("{:<14} not cached", keys.payload),
        }
    }
    Ok(())
}

fn cache_clear(config: &Config, kind: Option<FeedKind>) -> Result<()> {
    let cache = ContentCache::new(open_storage(config)?);
    let kinds = match kind {
        Some(kind) => vec![kind],
        None => FeedKind::ALL.to_vec(),
    };
    for kind in kinds {
        cache.clear(&kind.profile().cache_keys)?;
        println!("Cleared {}", kind);
    }
    Ok(())
}

fn catalog_scanner(config: &Config, layout: CatalogLayout, args: CatalogArgs) -> Result<CatalogScanner> {
    let configured = match layout {
        CatalogLayout::Series => config.series_source.clone(),
        CatalogLayout::Projects => config.projects_source.clone(),
    };
    let Some(source) = args.source.or(configured) else {
        bail!("No photo folder for {}: pass --source or set it in the config", layout);
    };
    let site_dir = args.site_dir.unwrap_or_else(|| config.site_dir());
    Ok(CatalogScanner::new(layout, source, site_dir))
}
