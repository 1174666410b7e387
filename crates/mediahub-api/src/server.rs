//! Control server implementation.
//!
//! Wires the core components together, serves the control routes, and owns
//! the background tasks (reachability monitor, presented-process watcher,
//! startup hub presentation).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use mediahub_core::cec::{CecAdapter, CecClientAdapter, RemotePowerController};
use mediahub_core::exit::{ExitCoordinator, PowerCommander, ShutdownSignal, SystemPowerCommander};
use mediahub_core::process::{ProcessHost, TokioProcessHost};
use mediahub_core::reachability::{Prober, ReachabilityHandle, ReachabilityMonitor, TcpProber};
use mediahub_core::store::SettingsStore;
use mediahub_core::supervisor::ProcessSupervisor;
use mediahub_core::{Error, Result};

use crate::config::{Config, CorsConfig};

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Settings store.
    pub settings: Arc<SettingsStore>,
    /// Presented-process supervisor.
    pub supervisor: ProcessSupervisor,
    /// TV power control.
    pub cec: RemotePowerController,
    /// Exit-action coordinator.
    pub exit: ExitCoordinator,
    /// Published connectivity state.
    pub reachability: ReachabilityHandle,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("settings", &self.settings.path())
            .field("supervisor", &self.supervisor)
            .field("cec", &self.cec)
            .field("reachability", &self.reachability.current())
            .finish_non_exhaustive()
    }
}

/// Health check endpoint handler.
///
/// Returns 200 OK while the process is alive.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check endpoint handler.
///
/// Not ready once the orchestrator has started closing.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.supervisor.is_closed() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some("orchestrator is shutting down".to_string()),
            }),
        );
    }
    (
        StatusCode::OK,
        Json(ReadyResponse {
            ready: true,
            message: None,
        }),
    )
}

/// The mediahub control server.
pub struct Server {
    config: Config,
    settings: Arc<SettingsStore>,
    supervisor: ProcessSupervisor,
    cec: RemotePowerController,
    exit: ExitCoordinator,
    prober: Arc<dyn Prober>,
    reachability: Option<ReachabilityHandle>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("settings", &self.settings.path())
            .field("prober", &"<Prober>")
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Creates a server with the production host integrations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigCorrupt`] if the settings document is unreadable.
    pub fn from_config(config: Config) -> Result<Self> {
        ServerBuilder::new().config(config).build()
    }

    /// Creates a new `ServerBuilder`.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the presented-process supervisor.
    #[must_use]
    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    /// Returns the exit coordinator.
    #[must_use]
    pub fn exit(&self) -> &ExitCoordinator {
        &self.exit
    }

    fn app_state(&self, reachability: ReachabilityHandle) -> Arc<AppState> {
        Arc::new(AppState {
            config: self.config.clone(),
            settings: Arc::clone(&self.settings),
            supervisor: self.supervisor.clone(),
            cec: self.cec.clone(),
            exit: self.exit.clone(),
            reachability,
        })
    }

    /// Creates the router with all routes and middleware.
    fn create_router(&self, state: Arc<AppState>) -> Router {
        let cors = self.build_cors_layer();
        let metrics_layer = middleware::from_fn(crate::metrics::metrics_middleware);

        let mut router = Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/metrics", get(crate::metrics::serve_metrics))
            .route("/openapi.json", get(crate::openapi::serve_openapi))
            .merge(crate::routes::control_routes());

        if let Some(dir) = &self.config.static_dir {
            tracing::info!(dir = %dir.display(), "Serving static UI");
            router = router.fallback_service(ServeDir::new(dir));
        }

        router
            // Metrics outermost for timing, then trace, then CORS.
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(metrics_layer)
            .with_state(state)
    }

    /// Builds the CORS layer from configuration.
    fn build_cors_layer(&self) -> CorsLayer {
        let cors_config = &self.config.cors;
        let cors = Self::build_cors_base(cors_config);
        Self::apply_cors_allowed_origins(cors, cors_config)
    }

    fn build_cors_base(cors_config: &CorsConfig) -> CorsLayer {
        CorsLayer::new()
            .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .expose_headers([header::CONTENT_TYPE, header::CONTENT_LENGTH, header::LOCATION])
            .max_age(Duration::from_secs(cors_config.max_age_seconds))
    }

    fn cors_allows_any_origin(cors_config: &CorsConfig) -> bool {
        cors_config.allowed_origins.len() == 1
            && cors_config
                .allowed_origins
                .first()
                .is_some_and(|origin| origin == "*")
    }

    fn apply_cors_allowed_origins(cors: CorsLayer, cors_config: &CorsConfig) -> CorsLayer {
        if cors_config.allowed_origins.is_empty() {
            return cors;
        }

        if Self::cors_allows_any_origin(cors_config) {
            return cors.allow_origin(Any);
        }

        let allowed: Vec<HeaderValue> = cors_config
            .allowed_origins
            .iter()
            .filter_map(|origin| {
                HeaderValue::from_str(origin)
                    .inspect_err(|_| {
                        tracing::error!(origin = %origin, "Invalid CORS origin; ignoring");
                    })
                    .ok()
            })
            .collect();

        if allowed.is_empty() {
            tracing::warn!("All configured CORS origins were invalid; disabling CORS");
            cors
        } else {
            tracing::info!(origins = ?cors_config.allowed_origins, "CORS configured");
            cors.allow_origin(AllowOrigin::list(allowed))
        }
    }

    /// Starts the server and blocks until shutdown.
    ///
    /// Shutdown is triggered by an exit action that closes the orchestrator,
    /// Ctrl-C, or SIGTERM. The presented process is terminated on the way out.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is rejected or the port cannot be bound.
    pub async fn serve(self) -> Result<()> {
        self.validate_config()?;
        crate::metrics::init_metrics();

        let (reachability, monitor) = match self.reachability.clone() {
            Some(handle) => (handle, None),
            None => ReachabilityMonitor::start(
                &self.settings.current(),
                self.config.probe_config(),
                Arc::clone(&self.prober),
            ),
        };
        let state = self.app_state(reachability);
        let router = self.create_router(state);

        let addr = self.config.socket_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::internal(format!("failed to bind to {addr}: {e}")))?;

        tracing::info!(
            %addr,
            settings = %self.settings.path().display(),
            present_hub = self.config.present_hub,
            "Starting mediahub control server"
        );

        let watcher = self.supervisor.spawn_watcher();
        let hub = self.config.present_hub.then(|| self.spawn_startup_hub());

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal(self.exit.shutdown_signal()))
            .await
            .map_err(|e| Error::internal(format!("server error: {e}")));

        for task in [Some(watcher), monitor, hub].into_iter().flatten() {
            task.abort();
        }
        if let Err(e) = self.supervisor.close().await {
            tracing::error!(error = %e, "Failed to close presented process");
        }
        tracing::info!("mediahub stopped");
        served
    }

    /// Presents the hub once the configured boot delay has elapsed.
    fn spawn_startup_hub(&self) -> JoinHandle<()> {
        let supervisor = self.supervisor.clone();
        let delay = Duration::from_secs(self.settings.current().startup.boot_delay_s);
        tokio::spawn(async move {
            tracing::info!(delay_secs = delay.as_secs(), "Presenting hub after boot delay");
            tokio::time::sleep(delay).await;
            if supervisor.is_closed() {
                return;
            }
            if let Err(e) = supervisor.present_hub().await {
                tracing::error!(error = %e, "Failed to present hub");
            }
        })
    }

    /// Creates a test router for the server.
    ///
    /// Uses the injected reachability handle, or an always-online one; no
    /// background tasks are started.
    #[doc(hidden)]
    pub fn test_router(&self) -> Router {
        let reachability = self
            .reachability
            .clone()
            .unwrap_or_else(ReachabilityHandle::always_online);
        self.create_router(self.app_state(reachability))
    }

    fn validate_config(&self) -> Result<()> {
        if !self.config.debug
            && self
                .config
                .cors
                .allowed_origins
                .iter()
                .any(|origin| origin == "*")
        {
            return Err(Error::InvalidInput(
                "cors.allowed_origins cannot include '*' when debug=false".to_string(),
            ));
        }

        if let Some(dir) = &self.config.static_dir {
            if !dir.is_dir() {
                return Err(Error::InvalidInput(format!(
                    "static directory {} does not exist",
                    dir.display()
                )));
            }
        }

        Ok(())
    }
}

async fn shutdown_signal(exit: ShutdownSignal) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = exit.wait() => tracing::info!("Exit action closed the orchestrator"),
        () = ctrl_c => tracing::info!("Received Ctrl-C"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Builder for constructing a server.
///
/// Every host integration can be replaced, which is how tests run the full
/// router without spawning browsers or touching the CEC bus.
pub struct ServerBuilder {
    config: Config,
    settings: Option<Arc<SettingsStore>>,
    host: Arc<dyn ProcessHost>,
    adapter: Option<Arc<dyn CecAdapter>>,
    power: Option<Arc<dyn PowerCommander>>,
    prober: Arc<dyn Prober>,
    reachability: Option<ReachabilityHandle>,
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("settings", &self.settings.as_ref().map(|s| s.path().to_path_buf()))
            .finish_non_exhaustive()
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            settings: None,
            host: Arc::new(TokioProcessHost),
            adapter: None,
            power: None,
            prober: Arc::new(TcpProber),
            reachability: None,
        }
    }
}

impl ServerBuilder {
    /// Creates a new server builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the whole configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the HTTP port.
    #[must_use]
    pub fn http_port(mut self, port: u16) -> Self {
        self.config.http_port = port;
        self
    }

    /// Enables debug mode.
    #[must_use]
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Uses an existing settings store instead of loading from disk.
    #[must_use]
    pub fn settings_store(mut self, store: Arc<SettingsStore>) -> Self {
        self.settings = Some(store);
        self
    }

    /// Sets the process host.
    #[must_use]
    pub fn process_host(mut self, host: Arc<dyn ProcessHost>) -> Self {
        self.host = host;
        self
    }

    /// Sets the CEC adapter.
    #[must_use]
    pub fn cec_adapter(mut self, adapter: Arc<dyn CecAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Sets the power commander.
    #[must_use]
    pub fn power_commander(mut self, power: Arc<dyn PowerCommander>) -> Self {
        self.power = Some(power);
        self
    }

    /// Sets the reachability prober.
    #[must_use]
    pub fn prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    /// Uses a fixed reachability handle; the monitor is not started.
    #[must_use]
    pub fn reachability(mut self, handle: ReachabilityHandle) -> Self {
        self.reachability = Some(handle);
        self
    }

    /// Builds the server, loading settings if no store was supplied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigCorrupt`] if the settings document is unreadable.
    pub fn build(self) -> Result<Server> {
        let config = self.config;
        let settings = match self.settings {
            Some(store) => store,
            None => Arc::new(SettingsStore::load_with_defaults(
                config.settings_path.clone(),
                config.default_settings_path.as_deref(),
            )?),
        };

        let adapter = self.adapter.unwrap_or_else(|| {
            Arc::new(CecClientAdapter::new(
                config.cec_binary.clone(),
                config.cec_timeout(),
            ))
        });
        let power = self
            .power
            .unwrap_or_else(|| Arc::new(SystemPowerCommander::new(config.power_timeout())));

        let supervisor =
            ProcessSupervisor::new(Arc::clone(&settings), self.host, config.supervisor_config());
        let cec = RemotePowerController::new(Arc::clone(&settings), adapter);
        let exit = ExitCoordinator::new(
            Arc::clone(&settings),
            cec.clone(),
            supervisor.clone(),
            power,
        );

        Ok(Server {
            config,
            settings,
            supervisor,
            cec,
            exit,
            prober: self.prober,
            reachability: self.reachability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use axum::body::Body;
    use axum::http::Request;
    use mediahub_core::settings::Settings;
    use tower::ServiceExt;

    fn test_server() -> Result<Server> {
        let store = Arc::new(SettingsStore::with_settings(
            "/nonexistent/config.json",
            Settings::default(),
        ));
        Ok(ServerBuilder::new().settings_store(store).build()?)
    }

    #[tokio::test]
    async fn test_health_endpoint() -> Result<()> {
        let router = test_server()?.test_router();

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .context("build request")?;
        let response = router.oneshot(request).await.map_err(|err| -> anyhow::Error { match err {} })?;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .context("read response body")?;
        let health: HealthResponse = serde_json::from_slice(&body).context("parse JSON body")?;
        assert_eq!(health.status, "ok");
        Ok(())
    }

    #[tokio::test]
    async fn test_ready_until_closed() -> Result<()> {
        let server = test_server()?;
        let router = server.test_router();

        let request = Request::builder().uri("/ready").body(Body::empty())?;
        let response = router.clone().oneshot(request).await.map_err(|err| -> anyhow::Error { match err {} })?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await?;
        let ready: ReadyResponse = serde_json::from_slice(&body)?;
        assert!(ready.ready);

        server.supervisor().close().await?;

        let request = Request::builder().uri("/ready").body(Body::empty())?;
        let response = router.oneshot(request).await.map_err(|err| -> anyhow::Error { match err {} })?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }

    #[test]
    fn wildcard_cors_requires_debug() -> Result<()> {
        let store = Arc::new(SettingsStore::with_settings("/nonexistent/config.json", Settings::default()));
        let mut config = Config::default();
        config.cors.allowed_origins = vec!["*".to_string()];

        let server = ServerBuilder::new()
            .config(config.clone())
            .settings_store(Arc::clone(&store))
            .build()?;
        assert!(server.validate_config().is_err());

        config.debug = true;
        let server = ServerBuilder::new().config(config).settings_store(store).build()?;
        assert!(server.validate_config().is_ok());
        Ok(())
    }

    #[test]
    fn missing_static_dir_is_rejected() -> Result<()> {
        let store = Arc::new(SettingsStore::with_settings("/nonexistent/config.json", Settings::default()));
        let config = Config {
            static_dir: Some("/nonexistent/static".into()),
            ..Config::default()
        };
        let server = ServerBuilder::new().config(config).settings_store(store).build()?;
        assert!(server.validate_config().is_err());
        Ok(())
    }
}
