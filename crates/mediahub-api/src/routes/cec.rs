//! Direct TV power routes.
//!
//! ## Routes
//!
//! - `GET  /api/cec/status` - Query the TV power state
//! - `GET  /api/cec/devices` - Scan the CEC bus
//! - `POST /api/cec/on` - Wake the TV
//! - `POST /api/cec/standby` - Put the TV in standby

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use mediahub_core::cec::{DeviceDescriptor, PowerStatus};

use crate::error::{ApiErrorBody, ApiResult};
use crate::server::AppState;

/// Creates CEC routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/cec/status", get(get_status))
        .route("/api/cec/devices", get(list_devices))
        .route("/api/cec/on", post(power_on))
        .route("/api/cec/standby", post(standby))
}

/// TV power state.
#[derive(Debug, Serialize, ToSchema)]
pub struct PowerStatusResponse {
    /// Reported power state.
    pub status: PowerStatus,
}

/// Devices on the CEC bus.
#[derive(Debug, Serialize, ToSchema)]
pub struct DevicesResponse {
    /// Discovered devices.
    pub devices: Vec<DeviceDescriptor>,
}

#[utoipa::path(
    get,
    path = "/api/cec/status",
    tag = "cec",
    responses(
        (status = 200, description = "Power state", body = PowerStatusResponse),
        (status = 409, description = "CEC disabled", body = ApiErrorBody),
        (status = 502, description = "Adapter error", body = ApiErrorBody),
    )
)]
pub(crate) async fn get_status(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<PowerStatusResponse>> {
    let status = state.cec.query_status().await?;
    Ok(Json(PowerStatusResponse { status }))
}

#[utoipa::path(
    get,
    path = "/api/cec/devices",
    tag = "cec",
    responses(
        (status = 200, description = "Devices found", body = DevicesResponse),
        (status = 409, description = "CEC disabled", body = ApiErrorBody),
        (status = 502, description = "Adapter error", body = ApiErrorBody),
    )
)]
pub(crate) async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<DevicesResponse>> {
    let devices = state.cec.scan_devices().await?;
    Ok(Json(DevicesResponse { devices }))
}

#[utoipa::path(
    post,
    path = "/api/cec/on",
    tag = "cec",
    responses(
        (status = 204, description = "Power-on sent"),
        (status = 409, description = "CEC disabled", body = ApiErrorBody),
        (status = 502, description = "Adapter error", body = ApiErrorBody),
    )
)]
pub(crate) async fn power_on(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    state.cec.power_on().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/cec/standby",
    tag = "cec",
    responses(
        (status = 204, description = "Standby sent"),
        (status = 409, description = "CEC disabled", body = ApiErrorBody),
        (status = 502, description = "Adapter error", body = ApiErrorBody),
    )
)]
pub(crate) async fn standby(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    state.cec.standby().await?;
    Ok(StatusCode::NO_CONTENT)
}
