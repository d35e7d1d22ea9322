use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Utc};
use tracing::{debug, info, warn};

use crate::models::{ContentItem, ItemId};

/// File extensions accepted as the folder's image, lowercase.
const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "heic"];

const STORY_EXTENSION: &str = "txt";

const NO_DESCRIPTION: &str = "No description available";

/// How the source folder is organised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogLayout {
    /// `<source>/<sN>/<pM>/` photo folders grouped by series.
    Series,
    /// `<source>/<photoK>/` photo folders.
    Projects,
}

impl CatalogLayout {
    pub fn output_file(&self) -> &'static str {
        match self {
            CatalogLayout::Series => "featured-series.json",
            CatalogLayout::Projects => "project-gallery.json",
        }
    }

    /// Series keep their previous file when a scan comes back empty.
    fn writes_empty(&self) -> bool {
        matches!(self, CatalogLayout::Projects)
    }
}

impl fmt::Display for CatalogLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogLayout::Series => f.write_str("series"),
            CatalogLayout::Projects => f.write_str("projects"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub items: usize,
    /// Output file, when it was (re)written.
    pub written: Option<PathBuf>,
}

/// One photo folder to turn into an item.
struct PhotoFolder {
    path: PathBuf,
    id: String,
    default_title: String,
    meta: String,
}

#[derive(Debug, Clone)]
pub struct CatalogScanner {
    layout: CatalogLayout,
    source_dir: PathBuf,
    site_dir: PathBuf,
    year: i32,
}

impl CatalogScanner {
    pub fn new(layout: CatalogLayout, source_dir: PathBuf, site_dir: PathBuf) -> Self {
        Self {
            layout,
            source_dir,
            site_dir,
            year: Utc::now().year(),
        }
    }

    /// Year written into item meta lines.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    pub fn layout(&self) -> CatalogLayout {
        self.layout
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.site_dir.join("assets")
    }

    pub fn output_path(&self) -> PathBuf {
        self.site_dir.join("data").join(self.layout.output_file())
    }

    /// Scan the source tree and write the feed file.
    pub fn run(&self) -> Result<ScanReport> {
        let items = self.scan()?;
        let written = self.write_collection(&items)?;
        Ok(ScanReport {
            items: items.len(),
            written,
        })
    }

    /// Build items from the source tree, copying images into the assets folder.
    pub fn scan(&self) -> Result<Vec<ContentItem>> {
        if !self.source_dir.is_dir() {
            bail!("Catalog source folder not found: {}", self.source_dir.display());
        }
        std::fs::create_dir_all(self.assets_dir())
            .with_context(|| format!("Failed to create assets folder: {}", self.assets_dir().display()))?;

        let folders = match self.layout {
            CatalogLayout::Series => self.series_folders()?,
            CatalogLayout::Projects => self.project_folders()?,
        };

        let mut items = Vec::new();
        for folder in folders {
            debug!(folder = %folder.path.display(), "Processing photo folder");
            if let Some(item) = self.process_folder(&folder)? {
                items.push(item);
            }
        }
        info!(layout = %self.layout, items = items.len(), "Catalog scan complete");
        Ok(items)
    }

    fn series_folders(&self) -> Result<Vec<PhotoFolder>> {
        let mut folders = Vec::new();
        for (series, series_path) in sorted_subdirs(&self.source_dir)? {
            let series_no = folder_number(&series, "s");
            for (photo, photo_path) in sorted_subdirs(&series_path)? {
                let photo_no = folder_number(&photo, "p");
                folders.push(PhotoFolder {
                    path: photo_path,
                    id: format!("{}_{}", series, photo),
                    default_title: format!("Series {} - Photo {}", series_no, photo_no),
                    meta: format!("Series {} • {}", series_no, self.year),
                });
            }
        }
        Ok(folders)
    }

    fn project_folders(&self) -> Result<Vec<PhotoFolder>> {
        Ok(sorted_subdirs(&self.source_dir)?
            .into_iter()
            .map(|(photo, path)| PhotoFolder {
                path,
                id: format!("project_{}", photo),
                default_title: format!("Project {}", folder_number(&photo, "photo")),
                meta: format!("Project • {}", self.year),
            })
            .collect())
    }

    fn process_folder(&self, folder: &PhotoFolder) -> Result<Option<ContentItem>> {
        let files = sorted_files(&folder.path)?;
        let image = files.iter().find(|path| has_extension(path, &IMAGE_EXTENSIONS));
        let story = files.iter().find(|path| has_extension(path, &[STORY_EXTENSION]));

        let Some(image) = image else {
            warn!(folder = %folder.path.display(), "No image in photo folder, skipping");
            return Ok(None);
        };

        let (title, description) = match story {
            Some(story) => match std::fs::read_to_string(story) {
                Ok(contents) => parse_story(&contents, &folder.default_title),
                Err(e) => {
                    warn!(story = %story.display(), error = %e, "Failed to read story");
                    (folder.default_title.clone(), NO_DESCRIPTION.to_string())
                }
            },
            None => (
                folder.default_title.clone(),
                format!("{} - Add your story in a .txt file", folder.default_title),
            ),
        };

        let extension = image
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        if extension.eq_ignore_ascii_case("heic") {
            warn!(image = %image.display(), "HEIC image copied without conversion");
        }
        let asset_name = format!("{}.{}", folder.id, extension);
        let destination = self.assets_dir().join(&asset_name);
        if let Err(e) = std::fs::copy(image, &destination) {
            warn!(image = %image.display(), error = %e, "Failed to copy image, skipping");
            return Ok(None);
        }

        Ok(Some(ContentItem {
            id: Some(ItemId::Text(folder.id.clone())),
            image: format!("assets/{}", asset_name),
            title,
            description,
            meta: Some(folder.meta.clone()),
        }))
    }

    /// Write items as a pretty-printed bare list. Returns the path when written.
    pub fn write_collection(&self, items: &[ContentItem]) -> Result<Option<PathBuf>> {
        if items.is_empty() && !self.layout.writes_empty() {
            warn!(layout = %self.layout, "No items found, leaving feed file untouched");
            return Ok(None);
        }

        let path = self.output_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(items)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write feed file: {}", path.display()))?;
        info!(path = %path.display(), items = items.len(), "Feed file updated");
        Ok(Some(path))
    }
}

/// First line is the title, the rest the description.
fn parse_story(contents: &str, default_title: &str) -> (String, String) {
    let trimmed = contents.trim();
    let mut lines = trimmed.split('\n');
    let title = lines.next().map(str::trim).unwrap_or_default();
    let rest = lines.collect::<Vec<_>>().join("\n");
    let rest = rest.trim();

    let title = if title.is_empty() { default_title } else { title };
    let description = if rest.is_empty() { NO_DESCRIPTION } else { rest };
    (title.to_string(), description.to_string())
}

/// `s12` with prefix `s` → `12`.
fn folder_number<'a>(name: &'a str, prefix: &str) -> &'a str {
    name.strip_prefix(prefix).unwrap_or(name)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// Visible subdirectories of `dir` as (name, path), sorted by name.
fn sorted_subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read folder: {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.file_type()?.is_dir() {
            continue;
        }
        dirs.push((name, entry.path()));
    }
    dirs.sort();
    Ok(dirs)
}

fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read folder: {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentCollection;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_parse_story() {
        assert_eq!(
            parse_story("  Tide Pools\nSmall worlds\nleft by the sea\n", "Series 1 - Photo 1"),
            ("Tide Pools".to_string(), "Small worlds\nleft by the sea".to_string())
        );
        assert_eq!(
            parse_story("Only a title", "d"),
            ("Only a title".to_string(), NO_DESCRIPTION.to_string())
        );
        assert_eq!(parse_story("   ", "Project 3"), ("Project 3".to_string(), NO_DESCRIPTION.to_string()));
    }

    #[test]
    fn test_scan_series_layout() {
        let source = tempfile::tempdir().unwrap();
        let site = tempfile::tempdir().unwrap();
        write(&source.path().join("s1/p1/photo.jpg"), "img");
        write(&source.path().join("s1/p1/story.txt"), "Tide\nLow water");
        write(&source.path().join("s1/p2/IMG.PNG"), "img");
        write(&source.path().join("s2/p1/notes.txt"), "no image here");

        let scanner = CatalogScanner::new(CatalogLayout::Series, source.path().to_path_buf(), site.path().to_path_buf())
            .with_year(2025);
        let report = scanner.run().unwrap();
        assert_eq!(report.items, 2);
        assert_eq!(report.written, Some(site.path().join("data/featured-series.json")));

        let contents = std::fs::read_to_string(site.path().join("data/featured-series.json")).unwrap();
        let collection: ContentCollection = serde_json::from_str(&contents).unwrap();
        assert!(matches!(collection, ContentCollection::List(_)));

        let first = &collection.items()[0];
        assert_eq!(first.id, Some(ItemId::Text("s1_p1".to_string())));
        assert_eq!(first.title, "Tide");
        assert_eq!(first.description, "Low water");
        assert_eq!(first.image, "assets/s1_p1.jpg");
        assert_eq!(first.meta.as_deref(), Some("Series 1 • 2025"));

        let second = &collection.items()[1];
        assert_eq!(second.title, "Series 1 - Photo 2");
        assert_eq!(second.description, "Series 1 - Photo 2 - Add your story in a .txt file");
        assert_eq!(second.image, "assets/s1_p2.PNG");

        assert!(site.path().join("assets/s1_p1.jpg").exists());
        assert!(site.path().join("assets/s1_p2.PNG").exists());
    }

    #[test]
    fn test_scan_projects_layout_skips_hidden() {
        let source = tempfile::tempdir().unwrap();
        let site = tempfile::tempdir().unwrap();
        write(&source.path().join("photo1/a.webp"), "img");
        write(&source.path().join(".trash/b.jpg"), "img");

        let scanner = CatalogScanner::new(CatalogLayout::Projects, source.path().to_path_buf(), site.path().to_path_buf())
            .with_year(2024);
        let items = scanner.scan().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, Some(ItemId::Text("project_photo1".to_string())));
        assert_eq!(items[0].title, "Project 1");
        assert_eq!(items[0].meta.as_deref(), Some("Project • 2024"));
    }

    #[test]
    fn test_empty_scan_write_policy() {
        let source = tempfile::tempdir().unwrap();
        let site = tempfile::tempdir().unwrap();

        let series = CatalogScanner::new(CatalogLayout::Series, source.path().to_path_buf(), site.path().to_path_buf());
        assert_eq!(series.run().unwrap().written, None);
        assert!(!series.output_path().exists());

        let projects = CatalogScanner::new(CatalogLayout::Projects, source.path().to_path_buf(), site.path().to_path_buf());
        let report = projects.run().unwrap();
        assert_eq!(report.items, 0);
        assert_eq!(std::fs::read_to_string(projects.output_path()).unwrap(), "[]");
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let site = tempfile::tempdir().unwrap();
        let scanner = CatalogScanner::new(
            CatalogLayout::Projects,
            site.path().join("does-not-exist"),
            site.path().to_path_buf(),
        );
        assert!(scanner.scan().is_err());
    }

    #[test]
    fn test_layout_output_files() {
        assert_eq!(CatalogLayout::Series.output_file(), "featured-series.json");
        assert_eq!(CatalogLayout::Projects.output_file(), "project-gallery.json");
        assert_eq!(CatalogLayout::Projects.to_string(), "projects");
    }
}
