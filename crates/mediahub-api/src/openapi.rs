//! `OpenAPI` (3.1) specification for the control server.
//!
//! Covers the menu-facing `/api` and `/launch` routes. Served at
//! `/openapi.json` and printed by the `gen_openapi` binary.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use utoipa::OpenApi;

/// `OpenAPI` documentation for the mediahub control API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "mediahub control API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Settings, launch, exit and TV power control for the mediahub kiosk"
    ),
    paths(
        crate::routes::settings::get_settings,
        crate::routes::settings::replace_settings,
        crate::routes::launch::launch_app,
        crate::routes::launch::exit,
        crate::routes::launch::get_presented,
        crate::routes::reachability::get_reachability,
        crate::routes::cec::get_status,
        crate::routes::cec::list_devices,
        crate::routes::cec::power_on,
        crate::routes::cec::standby,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::routes::launch::LaunchResponse,
            crate::routes::launch::PresentedResponse,
            crate::routes::cec::PowerStatusResponse,
            crate::routes::cec::DevicesResponse,
            mediahub_core::settings::Settings,
            mediahub_core::settings::AppDescriptor,
            mediahub_core::settings::LaunchMethod,
            mediahub_core::settings::ExitAction,
            mediahub_core::settings::ExitFallback,
            mediahub_core::exit::ExitOutcome,
            mediahub_core::supervisor::PresentedInfo,
            mediahub_core::supervisor::PresentedTarget,
            mediahub_core::supervisor::ResolvedMethod,
            mediahub_core::reachability::Reachability,
            mediahub_core::cec::PowerStatus,
            mediahub_core::cec::DeviceDescriptor,
        )
    ),
    tags(
        (name = "settings", description = "Persisted settings document"),
        (name = "launch", description = "Presented app and exit actions"),
        (name = "reachability", description = "Network connectivity"),
        (name = "cec", description = "TV power over HDMI-CEC"),
    )
)]
pub struct ApiDoc;

/// Returns the generated `OpenAPI` spec.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Returns the generated `OpenAPI` spec serialized as pretty JSON.
///
/// # Errors
///
/// Returns an error if JSON serialization fails (should not happen).
pub fn openapi_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&openapi())
}

/// Handler for the `/openapi.json` endpoint.
pub async fn serve_openapi() -> impl IntoResponse {
    match openapi_json() {
        Ok(json) => (
            StatusCode::OK,
            [("content-type", "application/json")],
            json,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize OpenAPI document");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                "OpenAPI document unavailable".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_control_routes() {
        let spec = openapi();
        for path in [
            "/api/config",
            "/launch/app/{key}",
            "/launch/exit",
            "/api/presented",
            "/api/reachability",
            "/api/cec/status",
            "/api/cec/standby",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn spec_serializes() {
        let json = openapi_json().unwrap();
        assert!(json.contains("\"ExitOutcome\""));
        assert!(!json.contains("cecError"));
    }
}
