use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::middleware::require_session;
use crate::state::AppState;
use crate::{auth, messages};

/// The JSON API. Static assets are mounted by the server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout).get(auth::logout));

    let protected_routes = Router::new()
        .route("/messages", get(messages::get_messages))
        .route("/messages/save", post(messages::save_message))
        .route("/messages/delete", delete(messages::delete_message))
        .route("/messages/update", put(messages::update_message))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
