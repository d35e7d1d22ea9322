//! Fetching feed documents.
//!
//! `HttpSource` requests a relative endpoint from the site origin the way
//! the page itself would; `FileSource` reads the same relative path out of
//! a site directory on disk.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Url};
use tracing::debug;

use crate::models::ContentCollection;

use super::FetchError;

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Where a loader gets its collection from.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch and decode the document at `endpoint`, a path relative to the site root.
    async fn fetch(&self, endpoint: &str) -> Result<ContentCollection, FetchError>;
}

/// Source backed by an HTTP origin.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: Url,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Self::parse_base(base_url)?,
        })
    }

    /// Parse the site origin, making sure relative joins land under it.
    fn parse_base(base_url: &str) -> Result<Url, FetchError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        Url::parse(&normalized).map_err(|e| FetchError::InvalidEndpoint {
            endpoint: base_url.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(endpoint)
            .map_err(|e| FetchError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl ContentSource for HttpSource {
    async fn fetch(&self, endpoint: &str) -> Result<ContentCollection, FetchError> {
        let url = self.endpoint_url(endpoint)?;
        debug!(url = %url, "Fetching content");

        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| FetchError::InvalidResponse(format!("{} from {}", e, url)))
    }
}

/// Source reading documents straight out of a site directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    site_dir: PathBuf,
}

impl FileSource {
    pub fn new(site_dir: PathBuf) -> Self {
        Self { site_dir }
    }

    fn resolve(&self, endpoint: &str) -> Result<PathBuf, FetchError> {
        let relative = endpoint.trim_start_matches('/');
        if relative.split('/').any(|part| part == "..") {
            return Err(FetchError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: "path escapes the site directory".to_string(),
            });
        }
        Ok(self.site_dir.join(relative))
    }
}

#[async_trait]
impl ContentSource for FileSource {
    async fn fetch(&self, endpoint: &str) -> Result<ContentCollection, FetchError> {
        let path = self.resolve(endpoint)?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text)
            .map_err(|e| FetchError::InvalidResponse(format!("{} in {}", e, path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_joins_under_base() {
        let source = HttpSource::new("http://localhost:8080/site").unwrap();
        assert_eq!(
            source.endpoint_url("data/featured-series.json").unwrap().as_str(),
            "http://localhost:8080/site/data/featured-series.json"
        );

        let source = HttpSource::new("https://example.com/").unwrap();
        assert_eq!(
            source.endpoint_url("data/project-gallery.json").unwrap().as_str(),
            "https://example.com/data/project-gallery.json"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpSource::new("not a url"),
            Err(FetchError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_source_reads_both_shapes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        std::fs::write(
            dir.path().join("data/featured-series.json"),
            r#"[{"id":1,"image":"a.jpg","title":"Sea","description":"Ocean study"}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("data/project-gallery.json"), r#"{"items":[]}"#).unwrap();

        let source = FileSource::new(dir.path().to_path_buf());
        let series = source.fetch("data/featured-series.json").await.unwrap();
        assert_eq!(series.len(), 1);
        let projects = source.fetch("data/project-gallery.json").await.unwrap();
        assert!(projects.is_empty());
    }

    #[tokio::test]
    async fn test_file_source_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{oops").unwrap();
        let source = FileSource::new(dir.path().to_path_buf());

        assert!(matches!(source.fetch("missing.json").await, Err(FetchError::NotFound(_))));
        assert!(matches!(source.fetch("broken.json").await, Err(FetchError::InvalidResponse(_))));
        assert!(matches!(
            source.fetch("../outside.json").await,
            Err(FetchError::InvalidEndpoint { .. })
        ));
    }
}
