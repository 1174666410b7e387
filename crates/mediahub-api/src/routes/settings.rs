//! Settings document routes.
//!
//! ## Routes
//!
//! - `GET  /api/config` - Current settings document
//! - `POST /api/config` - Validate, persist and swap in a new document
//! - `PUT  /api/config` - Same as `POST`

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use mediahub_core::settings::Settings;

use crate::error::{ApiError, ApiErrorBody, ApiResult};
use crate::server::AppState;

/// Creates settings routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/config",
        get(get_settings).post(replace_settings).put(replace_settings),
    )
}

/// Returns the current settings document.
#[utoipa::path(
    get,
    path = "/api/config",
    tag = "settings",
    responses(
        (status = 200, description = "Current settings", body = Settings),
    )
)]
pub(crate) async fn get_settings(State(state): State<Arc<AppState>>) -> Json<Settings> {
    Json(state.settings.current().as_ref().clone())
}

/// Replaces the settings document.
///
/// The body is decoded here rather than through the `Json` extractor so that
/// malformed documents surface as validation failures with a stable code.
#[utoipa::path(
    post,
    path = "/api/config",
    tag = "settings",
    request_body = Settings,
    responses(
        (status = 200, description = "Settings persisted", body = Settings),
        (status = 400, description = "Validation failed", body = ApiErrorBody),
        (status = 500, description = "Persist failed", body = ApiErrorBody),
    )
)]
pub(crate) async fn replace_settings(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<Settings>> {
    let candidate: Settings = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation("document", format!("malformed settings: {e}")))?;

    let app_count = candidate.apps.len();
    let stored = state.settings.replace(candidate).await?;
    tracing::info!(apps = app_count, "Settings replaced");
    Ok(Json(stored.as_ref().clone()))
}
