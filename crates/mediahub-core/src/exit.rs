//! Exit-action resolution.
//!
//! `exit.action = cec_standby` puts the TV into standby and then closes. If
//! CEC is disabled, or the standby command fails for any reason (adapter
//! missing, timeout, non-zero exit), `exit.cec_fallback` runs instead.
//! Adapter failures are still reported to the caller after the fallback
//! has run.
//!
//! `close` terminates the presented process and fires the orchestrator's
//! shutdown signal. `shutdown` and `reboot` hand off to the OS.

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tokio::sync::{watch, Mutex};
use utoipa::ToSchema;

use crate::cec::{AdapterError, CecError, RemotePowerController};
use crate::error::{Error, Result};
use crate::settings::{ExitAction, ExitFallback};
use crate::store::SettingsStore;
use crate::supervisor::ProcessSupervisor;

/// Default timeout for OS power commands.
pub const DEFAULT_POWER_TIMEOUT: Duration = Duration::from_secs(10);

/// OS-level power transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    /// Power off.
    Shutdown,
    /// Reboot.
    Reboot,
}

impl PowerAction {
    /// Command line for this action.
    #[must_use]
    pub const fn argv(self) -> &'static [&'static str] {
        match self {
            Self::Shutdown => &["sudo", "shutdown", "-h", "now"],
            Self::Reboot => &["sudo", "reboot"],
        }
    }
}

/// Issues OS power commands.
#[async_trait]
pub trait PowerCommander: Send + Sync {
    /// Runs the command for `action`.
    async fn execute(&self, action: PowerAction) -> Result<()>;
}

/// [`PowerCommander`] that shells out through `sudo`.
#[derive(Debug, Clone)]
pub struct SystemPowerCommander {
    timeout: Duration,
}

impl Default for SystemPowerCommander {
    fn default() -> Self {
        Self::new(DEFAULT_POWER_TIMEOUT)
    }
}

impl SystemPowerCommander {
    /// Creates a commander with a hard timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl PowerCommander for SystemPowerCommander {
    async fn execute(&self, action: PowerAction) -> Result<()> {
        let argv = action.argv();
        tracing::warn!(command = %argv.join(" "), "Issuing power command");

        let status = tokio::time::timeout(
            self.timeout,
            Command::new(argv[0])
                .args(&argv[1..])
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .status(),
        )
        .await
        .map_err(|_| Error::PowerCommand {
            message: format!("{} timed out after {:?}", argv.join(" "), self.timeout),
        })?
        .map_err(|e| Error::PowerCommand {
            message: format!("failed to run {}: {e}", argv.join(" ")),
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::PowerCommand {
                message: format!("{} exited with {status}", argv.join(" ")),
            })
        }
    }
}

/// Receiver side of the orchestrator shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    /// Returns true once shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves when shutdown is requested.
    pub async fn wait(mut self) {
        if self.0.wait_for(|triggered| *triggered).await.is_err() {
            // Sender gone without a request: never resolve.
            std::future::pending::<()>().await;
        }
    }
}

/// Result of an exit request.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExitOutcome {
    /// Configured exit action.
    pub requested: ExitAction,
    /// Action actually carried out after CEC resolution.
    pub performed: ExitFallback,
    /// The TV accepted the standby command.
    pub standby_sent: bool,
    /// `exit.cec_fallback` was used.
    pub fallback_used: bool,
    /// The caller reported that the user confirmed.
    pub confirmed: bool,
    /// Adapter failure that triggered the fallback, if any.
    #[serde(skip)]
    pub cec_error: Option<AdapterError>,
}

/// Runs exit requests one at a time. Cheap to clone.
#[derive(Clone)]
pub struct ExitCoordinator {
    inner: Arc<ExitInner>,
}

struct ExitInner {
    settings: Arc<SettingsStore>,
    cec: RemotePowerController,
    supervisor: ProcessSupervisor,
    power: Arc<dyn PowerCommander>,
    lock: Mutex<()>,
    shutdown: watch::Sender<bool>,
}

impl fmt::Debug for ExitCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitCoordinator")
            .field("cec", &self.inner.cec)
            .field("supervisor", &self.inner.supervisor)
            .field("power", &"<PowerCommander>")
            .field("shutdown", &*self.inner.shutdown.borrow())
            .finish_non_exhaustive()
    }
}

impl ExitCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        settings: Arc<SettingsStore>,
        cec: RemotePowerController,
        supervisor: ProcessSupervisor,
        power: Arc<dyn PowerCommander>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(ExitInner {
                settings,
                cec,
                supervisor,
                power,
                lock: Mutex::new(()),
                shutdown,
            }),
        }
    }

    /// Subscribes to the orchestrator shutdown signal.
    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal(self.inner.shutdown.subscribe())
    }

    /// Requests orchestrator shutdown without running an exit action.
    pub fn request_shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    /// Resolves and performs the configured exit action.
    ///
    /// `confirmed` is recorded only; confirmation UI belongs to the menu.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PowerCommand`] if a shutdown/reboot command fails.
    /// Adapter failures are not errors here; they are carried in
    /// [`ExitOutcome::cec_error`] after the fallback has run.
    pub async fn exit(&self, confirmed: bool) -> Result<ExitOutcome> {
        let this = self.clone();
        tokio::spawn(async move { this.exit_serialized(confirmed).await })
            .await
            .map_err(|e| Error::internal(format!("exit task failed: {e}")))?
    }

    async fn exit_serialized(&self, confirmed: bool) -> Result<ExitOutcome> {
        let _guard = self.inner.lock.lock().await;
        let settings = self.inner.settings.current();
        let requested = settings.exit.action;
        let fallback = settings.exit.cec_fallback;

        tracing::info!(?requested, ?fallback, confirmed, "Exit requested");

        let mut outcome = ExitOutcome {
            requested,
            performed: ExitFallback::Close,
            standby_sent: false,
            fallback_used: false,
            confirmed,
            cec_error: None,
        };

        outcome.performed = match requested {
            ExitAction::CecStandby => match self.inner.cec.standby().await {
                Ok(()) => {
                    outcome.standby_sent = true;
                    ExitFallback::Close
                }
                Err(CecError::Disabled) => {
                    tracing::info!(?fallback, "CEC disabled; using exit fallback");
                    outcome.fallback_used = true;
                    fallback
                }
                Err(CecError::Adapter(e)) => {
                    tracing::warn!(error = %e, ?fallback, "CEC standby failed; using exit fallback");
                    outcome.fallback_used = true;
                    outcome.cec_error = Some(e);
                    fallback
                }
            },
            ExitAction::Close => ExitFallback::Close,
            ExitAction::Shutdown => ExitFallback::Shutdown,
            ExitAction::Reboot => ExitFallback::Reboot,
        };

        match outcome.performed {
            ExitFallback::Close => {
                self.inner.supervisor.close().await?;
                tracing::info!("Closing orchestrator");
                self.request_shutdown();
            }
            ExitFallback::Shutdown => self.inner.power.execute(PowerAction::Shutdown).await?,
            ExitFallback::Reboot => self.inner.power.execute(PowerAction::Reboot).await?,
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_actions_use_sudo() {
        assert_eq!(
            PowerAction::Shutdown.argv(),
            &["sudo", "shutdown", "-h", "now"]
        );
        assert_eq!(PowerAction::Reboot.argv(), &["sudo", "reboot"]);
    }

    #[tokio::test]
    async fn shutdown_signal_resolves_after_request() {
        let (tx, rx) = watch::channel(false);
        let signal = ShutdownSignal(rx);
        assert!(!signal.is_triggered());

        tx.send_replace(true);
        assert!(signal.is_triggered());
        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .unwrap();
    }
}
