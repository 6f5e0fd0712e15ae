use std::path::Path;

use axum::Router;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use noticeboard_api::AppState;

/// JSON API plus the browser front end: `/` is the index page, `/static/*`
/// the asset directory. Anything else falls through to 404.
pub fn build(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .merge(noticeboard_api::router(state))
        .layer(TraceLayer::new_for_http())
}
