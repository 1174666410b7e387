//! Metrics middleware and the Prometheus endpoint.
//!
//! Request metrics are labeled by matched route, never by raw path, so app
//! keys in `/launch/app/:key` do not explode label cardinality.

use std::sync::OnceLock;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use mediahub_core::metrics::{
    CEC_COMMAND_TOTAL, FORCED_KILL_TOTAL, LAUNCH_TOTAL, REACHABILITY_ONLINE,
};

/// Control request duration histogram.
pub const API_REQUEST_DURATION: &str = "mediahub_api_request_duration_seconds";

/// Control request counter.
pub const API_REQUEST_TOTAL: &str = "mediahub_api_request_total";

const UNMATCHED_ENDPOINT: &str = "unmatched";

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initializes the global metrics recorder with Prometheus exporter.
///
/// Safe to call multiple times; subsequent calls are no-ops. Returns `None`
/// if another recorder was installed first.
pub fn init_metrics() -> Option<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Some(handle.clone());
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    if let Err(e) = metrics::set_global_recorder(recorder) {
        tracing::warn!(error = %e, "Metrics recorder already installed");
        return PROMETHEUS_HANDLE.get().cloned();
    }

    describe_histogram!(API_REQUEST_DURATION, "Duration of control requests in seconds");
    describe_counter!(API_REQUEST_TOTAL, "Total number of control requests");
    describe_counter!(LAUNCH_TOTAL, "Launch attempts by method and outcome");
    describe_counter!(CEC_COMMAND_TOTAL, "CEC adapter commands by command and outcome");
    describe_gauge!(REACHABILITY_ONLINE, "Debounced network reachability (1 = online)");
    describe_counter!(
        FORCED_KILL_TOTAL,
        "Presented processes killed after ignoring SIGINT"
    );

    tracing::info!("Prometheus metrics recorder initialized");
    Some(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Returns the global Prometheus handle, if initialized.
#[must_use]
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

pub(crate) fn endpoint_label<B>(request: &Request<B>) -> String {
    request.extensions().get::<MatchedPath>().map_or_else(
        || UNMATCHED_ENDPOINT.to_string(),
        |path| path.as_str().to_string(),
    )
}

/// Middleware that records request metrics.
///
/// Captures:
/// - `mediahub_api_request_duration_seconds{endpoint, method, status_class}`
/// - `mediahub_api_request_total{endpoint, method, status_class}`
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let path = endpoint_label(&request);
    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let labels = [
        ("endpoint", path.clone()),
        ("method", method.clone()),
        ("status_class", status_class(response.status()).to_string()),
    ];

    histogram!(API_REQUEST_DURATION, &labels).record(duration);
    counter!(API_REQUEST_TOTAL, &labels).increment(1);

    // Launches legitimately take up to the grace period; flag anything beyond.
    if duration > 5.0 {
        tracing::warn!(
            endpoint = %path,
            method = %method,
            status = response.status().as_u16(),
            duration_secs = duration,
            "Slow request detected"
        );
    }

    response
}

/// Returns the status class (2xx, 3xx, 4xx, 5xx) for a status code.
fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "unknown",
    }
}

/// Handler for the `/metrics` endpoint.
pub async fn serve_metrics() -> impl IntoResponse {
    prometheus_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain; charset=utf-8")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::Service;

    #[test]
    fn test_status_class() {
        assert_eq!(status_class(StatusCode::OK), "2xx");
        assert_eq!(status_class(StatusCode::SEE_OTHER), "3xx");
        assert_eq!(status_class(StatusCode::NOT_FOUND), "4xx");
        assert_eq!(status_class(StatusCode::BAD_GATEWAY), "5xx");
    }

    #[test]
    fn test_endpoint_label_unmatched() {
        let request = Request::builder()
            .uri("/missing")
            .body(Body::empty())
            .unwrap();
        assert_eq!(endpoint_label(&request), UNMATCHED_ENDPOINT);
    }

    #[tokio::test]
    async fn test_request_metrics_use_route_template() {
        let handle = init_metrics().unwrap();
        let app = Router::new()
            .route("/launch/app/:key", get(|| async { StatusCode::SEE_OTHER }))
            .route_layer(axum::middleware::from_fn(metrics_middleware));
        let request = Request::builder()
            .uri("/launch/app/youtube")
            .body(Body::empty())
            .unwrap();
        let mut service = app.into_service::<Body>();
        let _response = service.call(request).await.unwrap();

        let metrics = handle.render();
        assert!(metrics
            .lines()
            .any(|line| line.starts_with(API_REQUEST_TOTAL)
                && line.contains("endpoint=\"/launch/app/:key\"")));
        assert!(!metrics.contains("endpoint=\"/launch/app/youtube\""));
    }
}
