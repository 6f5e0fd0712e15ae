use std::sync::Arc;

use noticeboard_db::Database;

use crate::error::ApiResult;
use crate::session::SessionConfig;

pub type AppState = Arc<AppStateInner>;

/// Collaborators created once at startup and shared by every request.
pub struct AppStateInner {
    pub db: Database,
    pub sessions: SessionConfig,
}

impl AppStateInner {
    pub fn new(db: Database, sessions: SessionConfig) -> AppState {
        Arc::new(Self { db, sessions })
    }
}

/// Runs blocking work (SQLite, password hashing) off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&AppStateInner) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(state.as_ref())).await?
}
