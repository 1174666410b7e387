//! Debounced network reachability monitor.
//!
//! A background task probes a few well-known endpoints and publishes an
//! online/offline flag through a `watch` channel. A published flip requires
//! `confirmations` consecutive rounds that agree on the new value, so one
//! dropped packet never toggles the menu's offline overlay.
//!
//! When `startup.check_network` is false the monitor never starts and the
//! state is reported as online.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use crate::settings::Settings;

/// Default probe endpoints (public DNS resolvers, TCP/53).
pub const DEFAULT_PROBE_ENDPOINTS: [&str; 2] = ["1.1.1.1:53", "8.8.8.8:53"];

/// Published connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reachability {
    /// Debounced connectivity flag.
    pub online: bool,
    /// Time of the last completed probe round.
    pub last_checked: Option<DateTime<Utc>>,
    /// False when the monitor is not running (reported online unconditionally).
    pub monitored: bool,
}

impl Reachability {
    const fn unmonitored() -> Self {
        Self {
            online: true,
            last_checked: None,
            monitored: false,
        }
    }
}

/// A single connectivity probe.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Returns true if `endpoint` answered within `timeout`.
    async fn probe(&self, endpoint: &str, timeout: Duration) -> bool;
}

/// [`Prober`] that opens a TCP connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, endpoint: &str, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, TcpStream::connect(endpoint)).await,
            Ok(Ok(_))
        )
    }
}

/// Monitor tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// `host:port` endpoints; a round succeeds if any answers.
    pub endpoints: Vec<String>,
    /// Per-probe timeout.
    pub timeout: Duration,
    /// Time between rounds.
    pub interval: Duration,
    /// Extra attempts before a round is declared failed.
    pub retries: u32,
    /// Pause between attempts.
    pub retry_pause: Duration,
    /// Consecutive agreeing rounds required to publish a flip.
    pub confirmations: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_PROBE_ENDPOINTS
                .iter()
                .map(ToString::to_string)
                .collect(),
            timeout: Duration::from_secs(3),
            interval: Duration::from_secs(15),
            retries: 2,
            retry_pause: Duration::from_millis(500),
            confirmations: 2,
        }
    }
}

/// Publishes a value only after repeated confirmation.
#[derive(Debug, Clone)]
pub struct Debouncer {
    published: bool,
    pending: Option<bool>,
    streak: u32,
    confirmations: u32,
}

impl Debouncer {
    /// Creates a debouncer starting at `initial`.
    #[must_use]
    pub fn new(initial: bool, confirmations: u32) -> Self {
        Self {
            published: initial,
            pending: None,
            streak: 0,
            confirmations: confirmations.max(1),
        }
    }

    /// The currently published value.
    #[must_use]
    pub const fn published(&self) -> bool {
        self.published
    }

    /// Feeds one observation; returns the new value when it flips.
    pub fn observe(&mut self, value: bool) -> Option<bool> {
        if value == self.published {
            self.pending = None;
            self.streak = 0;
            return None;
        }

        if self.pending == Some(value) {
            self.streak += 1;
        } else {
            self.pending = Some(value);
            self.streak = 1;
        }

        if self.streak >= self.confirmations {
            self.published = value;
            self.pending = None;
            self.streak = 0;
            Some(value)
        } else {
            None
        }
    }
}

/// Read side of the monitor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReachabilityHandle {
    rx: watch::Receiver<Reachability>,
}

impl ReachabilityHandle {
    /// A handle that always reports online (monitor disabled).
    #[must_use]
    pub fn always_online() -> Self {
        let (_tx, rx) = watch::channel(Reachability::unmonitored());
        Self { rx }
    }

    /// The latest published state.
    #[must_use]
    pub fn current(&self) -> Reachability {
        *self.rx.borrow()
    }

    /// A receiver for change notifications.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Reachability> {
        self.rx.clone()
    }
}

/// Background prober with debounced publication.
pub struct ReachabilityMonitor {
    config: ProbeConfig,
    prober: Arc<dyn Prober>,
    debouncer: Debouncer,
    tx: watch::Sender<Reachability>,
}

impl fmt::Debug for ReachabilityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReachabilityMonitor")
            .field("config", &self.config)
            .field("prober", &"<Prober>")
            .field("debouncer", &self.debouncer)
            .finish_non_exhaustive()
    }
}

impl ReachabilityMonitor {
    /// Creates a monitor (optimistically online) and its read handle.
    #[must_use]
    pub fn new(config: ProbeConfig, prober: Arc<dyn Prober>) -> (Self, ReachabilityHandle) {
        let (tx, rx) = watch::channel(Reachability {
            online: true,
            last_checked: None,
            monitored: true,
        });
        let debouncer = Debouncer::new(true, config.confirmations);
        (
            Self {
                config,
                prober,
                debouncer,
                tx,
            },
            ReachabilityHandle { rx },
        )
    }

    /// Starts the monitor if `startup.check_network` is enabled.
    ///
    /// Returns an always-online handle and no task otherwise.
    #[must_use]
    pub fn start(
        settings: &Settings,
        config: ProbeConfig,
        prober: Arc<dyn Prober>,
    ) -> (ReachabilityHandle, Option<JoinHandle<()>>) {
        if !settings.startup.check_network {
            tracing::info!("Network check disabled; reporting online");
            return (ReachabilityHandle::always_online(), None);
        }
        let (monitor, handle) = Self::new(config, prober);
        (handle, Some(tokio::spawn(monitor.run())))
    }

    /// Runs one probe round and publishes the debounced result.
    pub async fn check_once(&mut self) -> Reachability {
        let observed = self.probe_round().await;
        if let Some(online) = self.debouncer.observe(observed) {
            if online {
                tracing::info!("Network reachable again");
            } else {
                tracing::warn!("Network unreachable");
            }
        } else if observed != self.debouncer.published() {
            tracing::debug!(observed, "Unconfirmed reachability change");
        }

        let state = Reachability {
            online: self.debouncer.published(),
            last_checked: Some(Utc::now()),
            monitored: true,
        };
        crate::metrics::set_reachability(state.online);
        self.tx.send_replace(state);
        state
    }

    /// Probes forever at the configured interval.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            endpoints = ?self.config.endpoints,
            interval_secs = self.config.interval.as_secs(),
            "Reachability monitor started"
        );

        loop {
            ticker.tick().await;
            self.check_once().await;
        }
    }

    async fn probe_round(&self) -> bool {
        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_pause).await;
            }
            for endpoint in &self.config.endpoints {
                if self.prober.probe(endpoint, self.config.timeout).await {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_failure_does_not_flip() {
        let mut debouncer = Debouncer::new(true, 2);
        assert_eq!(debouncer.observe(true), None);
        assert_eq!(debouncer.observe(false), None);
        assert_eq!(debouncer.observe(true), None);
        assert_eq!(debouncer.observe(false), None);
        assert!(debouncer.published());
    }

    #[test]
    fn two_consecutive_failures_flip_offline() {
        let mut debouncer = Debouncer::new(true, 2);
        assert_eq!(debouncer.observe(false), None);
        assert_eq!(debouncer.observe(false), Some(false));
        assert!(!debouncer.published());
    }

    #[test]
    fn recovery_also_needs_confirmation() {
        let mut debouncer = Debouncer::new(false, 2);
        assert_eq!(debouncer.observe(true), None);
        assert_eq!(debouncer.observe(false), None);
        assert_eq!(debouncer.observe(true), None);
        assert_eq!(debouncer.observe(true), Some(true));
    }

    #[test]
    fn zero_confirmations_behaves_like_one() {
        let mut debouncer = Debouncer::new(true, 0);
        assert_eq!(debouncer.observe(false), Some(false));
    }

    #[test]
    fn always_online_handle_is_unmonitored() {
        let state = ReachabilityHandle::always_online().current();
        assert!(state.online);
        assert!(!state.monitored);
        assert!(state.last_checked.is_none());
    }

    #[test]
    fn disabled_check_never_starts_monitor() {
        let mut settings = Settings::empty();
        settings.startup.check_network = false;
        let (handle, task) =
            ReachabilityMonitor::start(&settings, ProbeConfig::default(), Arc::new(TcpProber));
        assert!(task.is_none());
        assert!(handle.current().online);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(Reachability::unmonitored()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"online": true, "lastChecked": null, "monitored": false})
        );
    }
}
