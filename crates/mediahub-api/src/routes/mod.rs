//! HTTP route handlers.

pub mod cec;
pub mod launch;
pub mod reachability;
pub mod settings;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// Menu-facing control routes (`/api` and `/launch`).
pub fn control_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(settings::routes())
        .merge(launch::routes())
        .merge(reachability::routes())
        .merge(cec::routes())
}
