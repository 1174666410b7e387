//! Connectivity state route.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use mediahub_core::reachability::Reachability;

use crate::server::AppState;

/// Creates reachability routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/reachability", get(get_reachability))
}

/// Returns the debounced connectivity state.
///
/// Reads the published value; never probes.
#[utoipa::path(
    get,
    path = "/api/reachability",
    tag = "reachability",
    responses(
        (status = 200, description = "Connectivity state", body = Reachability),
    )
)]
pub(crate) async fn get_reachability(State(state): State<Arc<AppState>>) -> Json<Reachability> {
    Json(state.reachability.current())
}
