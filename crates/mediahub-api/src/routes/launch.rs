//! Launch and exit routes.
//!
//! These are plain `GET`s so the menu can trigger them from links.
//!
//! ## Routes
//!
//! - `GET /launch/app/{key}` - Present an app, then redirect back to the menu
//! - `GET /launch/exit` - Run the configured exit action
//! - `GET /api/presented` - Describe the presented process

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use mediahub_core::exit::ExitOutcome;
use mediahub_core::supervisor::PresentedInfo;

use crate::error::{ApiError, ApiErrorBody, ApiResult};
use crate::server::AppState;

/// Creates launch routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/launch/app/:key", get(launch_app))
        .route("/launch/exit", get(exit))
        .route("/api/presented", get(get_presented))
}

/// Body of a successful launch redirect.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LaunchResponse {
    /// Requested app key.
    pub app: String,
    /// The newly presented process.
    pub presented: PresentedInfo,
}

/// Exit query parameters.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExitQuery {
    /// The user confirmed the exit in the menu.
    pub confirmed: Option<bool>,
}

/// Presented process description.
#[derive(Debug, Serialize, ToSchema)]
pub struct PresentedResponse {
    /// `null` when nothing is presented.
    pub presented: Option<PresentedInfo>,
}

/// Presents an app, replacing whatever is shown.
#[utoipa::path(
    get,
    path = "/launch/app/{key}",
    tag = "launch",
    params(
        ("key" = String, Path, description = "App key")
    ),
    responses(
        (status = 303, description = "Launched; redirects to the menu", body = LaunchResponse),
        (status = 404, description = "Unknown app", body = ApiErrorBody),
        (status = 409, description = "App disabled", body = ApiErrorBody),
        (status = 502, description = "Launch failed", body = ApiErrorBody),
    )
)]
pub(crate) async fn launch_app(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let presented = state.supervisor.launch(&key).await?;
    Ok((
        StatusCode::SEE_OTHER,
        [(header::LOCATION, "/")],
        Json(LaunchResponse {
            app: key,
            presented,
        }),
    ))
}

/// Runs the configured exit action.
///
/// An adapter failure during `cec_standby` is reported as 502 after the
/// fallback has been carried out.
#[utoipa::path(
    get,
    path = "/launch/exit",
    tag = "launch",
    params(ExitQuery),
    responses(
        (status = 200, description = "Exit action performed", body = ExitOutcome),
        (status = 502, description = "CEC adapter or power command failed", body = ApiErrorBody),
    )
)]
pub(crate) async fn exit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExitQuery>,
) -> ApiResult<Json<ExitOutcome>> {
    let outcome = state.exit.exit(query.confirmed.unwrap_or(false)).await?;

    if let Some(error) = &outcome.cec_error {
        tracing::warn!(
            error = %error,
            performed = ?outcome.performed,
            "Standby failed; fallback carried out"
        );
        return Err(ApiError::adapter(error));
    }
    Ok(Json(outcome))
}

/// Describes the presented process.
#[utoipa::path(
    get,
    path = "/api/presented",
    tag = "launch",
    responses(
        (status = 200, description = "Presented process", body = PresentedResponse),
    )
)]
pub(crate) async fn get_presented(State(state): State<Arc<AppState>>) -> Json<PresentedResponse> {
    Json(PresentedResponse {
        presented: state.supervisor.status().await,
    })
}
