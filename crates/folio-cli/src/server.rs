//! Static serving of the site directory plus the featured-series API.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use folio_core::ContentCollection;
use serde_json::Value;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, warn};

const FEATURED_SERIES_FILE: &str = "data/featured-series.json";

#[derive(Debug, Clone)]
pub struct AppState {
    pub site_dir: PathBuf,
}

pub fn create_app(site_dir: PathBuf) -> Router {
    let state = Arc::new(AppState {
        site_dir: site_dir.clone(),
    });

    Router::new()
        .route("/api/featured-series", get(featured_series_handler))
        .fallback_service(ServeDir::new(site_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The feed file as stored, or the empty-state envelope when it is missing
/// or unreadable.
async fn featured_series_handler(State(state): State<Arc<AppState>>) -> Response {
    let path = state.site_dir.join(FEATURED_SERIES_FILE);
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Featured series file unavailable");
            return Json(ContentCollection::empty_state()).into_response();
        }
    };

    // Checked for validity only; the stored bytes go out unchanged
    match serde_json::from_str::<Value>(&contents) {
        Ok(_) => {
            debug!(path = %path.display(), "Serving featured series");
            ([(header::CONTENT_TYPE, "application/json")], contents).into_response()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Featured series file is not valid JSON");
            Json(ContentCollection::empty_state()).into_response()
        }
    }
}
