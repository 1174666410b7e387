//! Presented process supervision.
//!
//! The supervisor owns a single slot holding the process currently shown on
//! screen. Every transition (launch, hub presentation, close, reaping) runs
//! under the slot mutex, so:
//!
//! - at most one presented process is alive at any instant;
//! - a new process is spawned only after the previous one is confirmed gone
//!   (SIGINT, bounded grace period, then SIGKILL);
//! - a failed spawn leaves the slot empty, never half-terminated.
//!
//! Transitions run in their own task, so a caller that goes away (e.g. an
//! HTTP client disconnecting) cannot abandon a termination halfway.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::Instrument;
use utoipa::ToSchema;

use crate::error::{Error, Result};
use crate::observability::launch_span;
use crate::process::{terminate, LaunchCommand, ProcessHost, RunningProcess, Termination};
use crate::settings::{AppDescriptor, LaunchMethod, Settings};
use crate::store::SettingsStore;

/// Browser binaries tried in order.
pub const DEFAULT_BROWSER_CANDIDATES: [&str; 2] = ["chromium-browser", "chromium"];

/// Launch failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LaunchErrorKind {
    /// No browser or native binary could be found.
    BinaryMissing,
    /// The target URL is empty or not http(s).
    BadTarget,
    /// The OS refused to start the process.
    SpawnFailed,
    /// The previous process could not be killed; nothing was spawned.
    TerminateFailed,
}

impl fmt::Display for LaunchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BinaryMissing => "binary_missing",
            Self::BadTarget => "bad_target",
            Self::SpawnFailed => "spawn_failed",
            Self::TerminateFailed => "terminate_failed",
        })
    }
}

/// A failed launch. The presented slot is empty afterwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("launch failed ({kind}): {detail}")]
pub struct LaunchError {
    /// Failure kind.
    pub kind: LaunchErrorKind,
    /// Human-readable detail.
    pub detail: String,
}

impl LaunchError {
    /// Creates a launch error.
    #[must_use]
    pub fn new(kind: LaunchErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// What the presented process shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PresentedTarget {
    /// The menu itself.
    Hub,
    /// An app, by key.
    App(String),
}

impl fmt::Display for PresentedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hub => f.write_str("hub"),
            Self::App(key) => f.write_str(key),
        }
    }
}

/// How a launch was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedMethod {
    /// Kiosk browser.
    Browser,
    /// Native viewer.
    Native,
}

impl ResolvedMethod {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Native => "native",
        }
    }
}

/// Description of the presented process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresentedInfo {
    /// What is shown.
    pub target: PresentedTarget,
    /// How it was launched.
    pub method: ResolvedMethod,
    /// OS process id.
    pub pid: Option<u32>,
    /// Spawn time.
    pub started_at: DateTime<Utc>,
    /// Command line (for diagnostics).
    pub command: String,
}

/// A native viewer known to handle an app key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeHandler {
    /// App key this handler serves.
    pub app_key: &'static str,
    /// Candidate binaries, tried in order.
    pub binaries: &'static [&'static str],
    /// Fixed arguments.
    pub args: &'static [&'static str],
}

/// Compiled-in native handler registry.
pub const NATIVE_HANDLERS: &[NativeHandler] = &[
    NativeHandler {
        app_key: "jellyfin",
        binaries: &["jellyfinmediaplayer", "jellyfin-media-player"],
        args: &["--fullscreen", "--platform", "eglfs"],
    },
    NativeHandler {
        app_key: "spotify",
        binaries: &["spotify"],
        args: &[],
    },
];

/// Returns the native handler registered for `app_key`.
#[must_use]
pub fn native_handler(app_key: &str) -> Option<&'static NativeHandler> {
    NATIVE_HANDLERS.iter().find(|h| h.app_key == app_key)
}

impl NativeHandler {
    /// Resolves the first installed binary into a command.
    #[must_use]
    pub fn command(&self, host: &dyn ProcessHost) -> Option<LaunchCommand> {
        self.binaries
            .iter()
            .find_map(|binary| host.locate(binary))
            .map(|program| LaunchCommand::new(program).args(self.args.iter().copied()))
    }
}

/// Supervisor tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Browser binaries tried in order.
    pub browser_candidates: Vec<String>,
    /// `DISPLAY` value used when the orchestrator has none.
    pub display: Option<String>,
    /// Time between SIGINT and SIGKILL.
    pub grace_period: Duration,
    /// How often the watcher checks for self-exited processes.
    pub watch_interval: Duration,
    /// Menu URL; enables hub presentation and return-to-hub.
    pub hub_url: Option<String>,
    /// Pause before re-presenting the hub after an app exits.
    pub hub_return_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            browser_candidates: DEFAULT_BROWSER_CANDIDATES
                .iter()
                .map(ToString::to_string)
                .collect(),
            display: Some(":0".to_string()),
            grace_period: Duration::from_secs(3),
            watch_interval: Duration::from_secs(1),
            hub_url: None,
            hub_return_delay: Duration::from_secs(1),
        }
    }
}

/// What to spawn, before binaries and URLs are checked.
#[derive(Debug, Clone)]
enum LaunchPlan {
    Browser {
        url: String,
        user_agent: Option<String>,
        flags: Vec<String>,
    },
    Native(LaunchCommand),
}

impl LaunchPlan {
    const fn method(&self) -> ResolvedMethod {
        match self {
            Self::Browser { .. } => ResolvedMethod::Browser,
            Self::Native(_) => ResolvedMethod::Native,
        }
    }

    fn browser(app: &AppDescriptor, settings: &Settings) -> Self {
        Self::Browser {
            url: app.url.clone(),
            user_agent: app.user_agent.clone(),
            flags: settings.advanced.browser_flags.clone(),
        }
    }
}

struct Presented {
    info: PresentedInfo,
    process: Box<dyn RunningProcess>,
}

/// Owner of the presented process slot. Cheap to clone.
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    settings: Arc<SettingsStore>,
    host: Arc<dyn ProcessHost>,
    config: SupervisorConfig,
    slot: Mutex<Option<Presented>>,
    closed: AtomicBool,
}

impl fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("config", &self.inner.config)
            .field("host", &"<ProcessHost>")
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    /// Creates a supervisor with an empty slot.
    #[must_use]
    pub fn new(
        settings: Arc<SettingsStore>,
        host: Arc<dyn ProcessHost>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                settings,
                host,
                config,
                slot: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Supervisor configuration.
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// Launches `app_key`, supplanting whatever is presented.
    ///
    /// Does not return until the previous process is gone and the new one
    /// has been spawned (or has failed to spawn).
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownApp`] / [`Error::AppDisabled`]: nothing changes.
    /// - [`Error::Launch`]: the previous process was terminated and the slot
    ///   is empty, except for [`LaunchErrorKind::TerminateFailed`], where the
    ///   previous process could not be killed, stays presented, and nothing
    ///   new is spawned.
    pub async fn launch(&self, app_key: &str) -> Result<PresentedInfo> {
        let settings = self.inner.settings.current();
        let app = settings
            .app(app_key)
            .ok_or_else(|| Error::UnknownApp(app_key.to_string()))?;
        if !app.enabled {
            return Err(Error::AppDisabled(app_key.to_string()));
        }

        let plan = self.resolve_plan(app_key, app, &settings);
        tracing::info!(
            app = %app_key,
            requested = ?app.launch_method,
            resolved = plan.method().as_str(),
            "Launching app"
        );

        let target = PresentedTarget::App(app_key.to_string());
        self.transition(target, plan).await
    }

    /// Presents the menu itself (browser at the hub URL).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`] if no hub URL is configured or the browser
    /// cannot be started.
    pub async fn present_hub(&self) -> Result<PresentedInfo> {
        let plan = self.hub_plan()?;
        tracing::info!("Presenting hub");
        self.transition(PresentedTarget::Hub, plan).await
    }

    /// Terminates the presented process and stops return-to-hub.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`] if the presented process could not be killed;
    /// it stays in the slot.
    pub async fn close(&self) -> Result<Option<PresentedInfo>> {
        self.inner.closed.store(true, Ordering::Release);
        let this = self.clone();
        tokio::spawn(
            async move {
                let mut slot = this.inner.slot.lock().await;
                let closed = this.take_and_terminate(&mut slot).await?;
                tracing::info!(closed = ?closed.as_ref().map(|i| i.target.to_string()), "Supervisor closed");
                Ok(closed)
            }
            .instrument(launch_span("close", "none")),
        )
        .await
        .map_err(|e| Error::internal(format!("close task failed: {e}")))?
    }

    /// Returns true once [`ProcessSupervisor::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Describes the presented process, if any.
    pub async fn status(&self) -> Option<PresentedInfo> {
        self.inner
            .slot
            .lock()
            .await
            .as_ref()
            .map(|presented| presented.info.clone())
    }

    /// Clears the slot if the presented process exited on its own.
    ///
    /// When an app exited and a hub URL is configured, the hub is presented
    /// again after `hub_return_delay` (unless something else was launched in
    /// the meantime). A hub that exits is not respawned. Returns the exited
    /// target.
    pub async fn reap_exited(&self) -> Option<PresentedTarget> {
        let exited = {
            let mut slot = self.inner.slot.lock().await;
            let has_exited = match slot.as_mut() {
                Some(presented) => presented.process.try_exited().unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Failed to query presented process");
                    false
                }),
                None => false,
            };
            if !has_exited {
                return None;
            }
            let info = slot.take().map(|presented| presented.info)?;
            tracing::info!(presented = %info.target, pid = ?info.pid, "Presented process exited");
            info.target
        };

        if exited == PresentedTarget::Hub {
            // The control API keeps serving; a launch presents something again.
            tracing::warn!("Hub exited; slot left empty");
            return Some(exited);
        }

        if matches!(exited, PresentedTarget::App(_))
            && self.inner.config.hub_url.is_some()
            && !self.is_closed()
        {
            tokio::time::sleep(self.inner.config.hub_return_delay).await;
            if let Err(e) = self.present_hub_if_idle().await {
                tracing::error!(error = %e, "Failed to return to hub");
            }
        }

        Some(exited)
    }

    /// Spawns the watcher that reaps self-exited processes.
    #[must_use]
    pub fn spawn_watcher(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.inner.config.watch_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            while !this.is_closed() {
                ticker.tick().await;
                this.reap_exited().await;
            }
            tracing::debug!("Presented process watcher stopped");
        })
    }

    async fn present_hub_if_idle(&self) -> Result<Option<PresentedInfo>> {
        let plan = self.hub_plan()?;
        let this = self.clone();
        tokio::spawn(
            async move {
                let mut slot = this.inner.slot.lock().await;
                if slot.is_some() || this.is_closed() {
                    return Ok(None);
                }
                this.spawn_into(&mut slot, PresentedTarget::Hub, plan)
                    .map(Some)
            }
            .instrument(launch_span("return_to_hub", "hub")),
        )
        .await
        .map_err(|e| Error::internal(format!("hub task failed: {e}")))?
    }

    fn hub_plan(&self) -> Result<LaunchPlan> {
        let url = self.inner.config.hub_url.clone().ok_or_else(|| {
            LaunchError::new(LaunchErrorKind::BadTarget, "no hub URL is configured")
        })?;
        Ok(LaunchPlan::Browser {
            url,
            user_agent: None,
            flags: self.inner.settings.current().advanced.browser_flags.clone(),
        })
    }

    fn resolve_plan(&self, app_key: &str, app: &AppDescriptor, settings: &Settings) -> LaunchPlan {
        let native = || {
            native_handler(app_key).and_then(|handler| handler.command(self.inner.host.as_ref()))
        };

        match app.launch_method {
            LaunchMethod::Browser => LaunchPlan::browser(app, settings),
            LaunchMethod::Native => native().map_or_else(
                || {
                    tracing::warn!(app = %app_key, "No native viewer found; using browser");
                    LaunchPlan::browser(app, settings)
                },
                LaunchPlan::Native,
            ),
            LaunchMethod::Auto if app.prefer_native => {
                native().map_or_else(|| LaunchPlan::browser(app, settings), LaunchPlan::Native)
            }
            LaunchMethod::Auto => LaunchPlan::browser(app, settings),
        }
    }

    async fn transition(&self, target: PresentedTarget, plan: LaunchPlan) -> Result<PresentedInfo> {
        let this = self.clone();
        let span = launch_span("launch", &target.to_string());
        tokio::spawn(
            async move {
                let mut slot = this.inner.slot.lock().await;
                this.take_and_terminate(&mut slot).await?;
                this.spawn_into(&mut slot, target, plan)
            }
            .instrument(span),
        )
        .await
        .map_err(|e| Error::internal(format!("launch task failed: {e}")))?
    }

    /// Empties the slot once its process is confirmed gone.
    ///
    /// A process that survives the force kill is put back, so the slot never
    /// forgets a live process.
    async fn take_and_terminate(
        &self,
        slot: &mut Option<Presented>,
    ) -> std::result::Result<Option<PresentedInfo>, LaunchError> {
        let Some(mut presented) = slot.take() else {
            return Ok(None);
        };
        let grace = self.inner.config.grace_period;
        match terminate(presented.process.as_mut(), grace).await {
            Ok(Termination::Killed) => {
                crate::metrics::record_forced_kill();
                tracing::warn!(
                    presented = %presented.info.target,
                    pid = ?presented.info.pid,
                    grace_ms = grace.as_millis(),
                    "Presented process ignored interrupt; killed"
                );
            }
            Ok(outcome) => tracing::info!(
                presented = %presented.info.target,
                pid = ?presented.info.pid,
                ?outcome,
                "Presented process terminated"
            ),
            Err(e) => {
                tracing::error!(
                    presented = %presented.info.target,
                    pid = ?presented.info.pid,
                    error = %e,
                    "Failed to kill presented process"
                );
                crate::metrics::record_launch(presented.info.method.as_str(), "terminate_failed");
                let error = LaunchError::new(
                    LaunchErrorKind::TerminateFailed,
                    format!(
                        "could not kill {} (pid {:?}): {e}",
                        presented.info.target, presented.info.pid
                    ),
                );
                *slot = Some(presented);
                return Err(error);
            }
        }
        Ok(Some(presented.info))
    }

    fn spawn_into(
        &self,
        slot: &mut Option<Presented>,
        target: PresentedTarget,
        plan: LaunchPlan,
    ) -> Result<PresentedInfo> {
        let method = plan.method();
        let result = self
            .build_command(plan)
            .and_then(|command| self.spawn_command(&command).map(|p| (command, p)));

        let (command, process) = match result {
            Ok(spawned) => spawned,
            Err(e) => {
                crate::metrics::record_launch(method.as_str(), &e.kind.to_string());
                tracing::error!(presented = %target, error = %e, "Launch failed");
                return Err(e.into());
            }
        };

        let info = PresentedInfo {
            target,
            method,
            pid: process.id(),
            started_at: Utc::now(),
            command: command.display(),
        };
        crate::metrics::record_launch(method.as_str(), "ok");
        tracing::info!(presented = %info.target, pid = ?info.pid, command = %info.command, "Presented process started");

        *slot = Some(Presented {
            info: info.clone(),
            process,
        });
        Ok(info)
    }

    fn build_command(&self, plan: LaunchPlan) -> std::result::Result<LaunchCommand, LaunchError> {
        let command = match plan {
            LaunchPlan::Native(command) => command,
            LaunchPlan::Browser {
                url,
                user_agent,
                flags,
            } => {
                check_target(&url)?;
                let program = self
                    .inner
                    .config
                    .browser_candidates
                    .iter()
                    .find_map(|candidate| self.inner.host.locate(candidate))
                    .ok_or_else(|| {
                        LaunchError::new(
                            LaunchErrorKind::BinaryMissing,
                            format!(
                                "no browser found (tried {})",
                                self.inner.config.browser_candidates.join(", ")
                            ),
                        )
                    })?;
                let mut command = LaunchCommand::new(program).args(flags);
                if let Some(agent) = user_agent {
                    command = command.arg(format!("--user-agent={agent}"));
                }
                command.arg(url)
            }
        };

        Ok(match self.display_override() {
            Some(display) => command.env("DISPLAY", display),
            None => command,
        })
    }

    fn display_override(&self) -> Option<String> {
        if std::env::var_os("DISPLAY").is_some() {
            return None;
        }
        self.inner.config.display.clone()
    }

    fn spawn_command(
        &self,
        command: &LaunchCommand,
    ) -> std::result::Result<Box<dyn RunningProcess>, LaunchError> {
        self.inner.host.spawn(command).map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::NotFound {
                LaunchErrorKind::BinaryMissing
            } else {
                LaunchErrorKind::SpawnFailed
            };
            LaunchError::new(kind, format!("{}: {e}", command.program.display()))
        })
    }
}

fn check_target(url: &str) -> std::result::Result<(), LaunchError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(LaunchError::new(LaunchErrorKind::BadTarget, "target URL is empty"));
    }
    let scheme = url
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase());
    match scheme.as_deref() {
        Some("http" | "https") => Ok(()),
        _ => Err(LaunchError::new(
            LaunchErrorKind::BadTarget,
            format!("unsupported URL scheme in {url}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_must_be_http() {
        assert!(check_target("https://www.youtube.com/tv").is_ok());
        assert!(check_target("HTTP://localhost:8000/index.html").is_ok());

        let err = check_target("").unwrap_err();
        assert_eq!(err.kind, LaunchErrorKind::BadTarget);
        let err = check_target("file:///etc/passwd").unwrap_err();
        assert_eq!(err.kind, LaunchErrorKind::BadTarget);
        let err = check_target("javascript:alert(1)").unwrap_err();
        assert_eq!(err.kind, LaunchErrorKind::BadTarget);
    }

    #[test]
    fn native_registry_covers_known_apps() {
        assert!(native_handler("jellyfin").is_some());
        assert!(native_handler("spotify").is_some());
        assert!(native_handler("youtube").is_none());
    }

    #[test]
    fn presented_target_serializes_externally_tagged() {
        assert_eq!(
            serde_json::to_value(PresentedTarget::Hub).unwrap(),
            serde_json::json!("hub")
        );
        assert_eq!(
            serde_json::to_value(PresentedTarget::App("yt".into())).unwrap(),
            serde_json::json!({"app": "yt"})
        );
    }
}
