// crates/todo-tracks-server/src/web/mod.rs
// JSON serving layer over the repository facade

pub mod api;
pub mod state;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::web::state::AppState;

/// Create the web server router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/_ah/health", get(api::health))
        .route("/repos", get(api::list_repos))
        .route("/aliases", get(api::list_aliases))
        .route("/revision", get(api::revision_markers))
        .route("/file", get(api::file_markers))
        .route("/todo", get(api::marker_details))
        .route("/todoStatus", get(api::marker_status))
        .route("/browse", get(api::browse))
        .route("/raw", get(api::raw_file))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
