//! Remote power control over HDMI-CEC.
//!
//! The TV is driven through a command-line adapter (`cec-client` by default)
//! that reads one command from stdin and prints a loosely formatted report.
//! [`CecAdapter`] isolates the orchestrator from that tool; the
//! [`RemotePowerController`] layers the policy on top:
//!
//! - every call is gated by `remote.enable_cec` and returns
//!   [`CecError::Disabled`] without touching the adapter when it is off;
//! - adapter presence is probed once and cached, so a missing tool costs one
//!   `PATH` lookup, not a process spawn per request;
//! - every invocation runs under a hard timeout.

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::Instrument;
use utoipa::ToSchema;

use crate::observability::cec_span;
use crate::store::SettingsStore;

/// Default adapter binary.
pub const DEFAULT_CEC_BINARY: &str = "cec-client";

/// Default adapter timeout.
pub const DEFAULT_CEC_TIMEOUT: Duration = Duration::from_secs(5);

/// Output fragments that mean the adapter found no usable CEC device.
const NO_CONNECTION_MARKERS: [&str; 3] = [
    "could not open a connection",
    "unable to open the device",
    "autodetect failed",
];

/// The fixed adapter vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CecCommand {
    /// Power the TV on.
    On,
    /// Put the TV into standby.
    Standby,
    /// Query the TV power status.
    Status,
    /// List devices on the CEC bus.
    Scan,
}

impl CecCommand {
    /// Stable command name used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Standby => "standby",
            Self::Status => "status",
            Self::Scan => "scan",
        }
    }

    /// Line written to the adapter's stdin (logical address 0 is the TV).
    #[must_use]
    pub const fn adapter_input(self) -> &'static str {
        match self {
            Self::On => "on 0",
            Self::Standby => "standby 0",
            Self::Status => "pow 0",
            Self::Scan => "scan",
        }
    }
}

impl fmt::Display for CecCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TV power state as reported by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PowerStatus {
    /// Powered on.
    On,
    /// In standby.
    Standby,
    /// Not reported, or in transition.
    Unknown,
}

/// A device found on the CEC bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// Logical address (0 = TV).
    pub logical_address: u8,
    /// Device type as reported (e.g. `TV`, `Playback 1`).
    pub name: String,
    /// Physical HDMI address (e.g. `1.0.0.0`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_address: Option<String>,
    /// Vendor name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    /// On-screen display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osd_name: Option<String>,
    /// Power status.
    pub power_status: PowerStatus,
}

/// Adapter failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    /// Adapter not installed, or no CEC device reachable.
    NotAvailable,
    /// Adapter did not finish within the timeout.
    Timeout,
    /// Adapter exited unsuccessfully.
    NonZeroExit,
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotAvailable => "not_available",
            Self::Timeout => "timeout",
            Self::NonZeroExit => "non_zero_exit",
        })
    }
}

/// A failed adapter invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("CEC adapter error ({kind}): {detail}")]
pub struct AdapterError {
    /// Failure kind.
    pub kind: AdapterErrorKind,
    /// Human-readable detail.
    pub detail: String,
}

impl AdapterError {
    /// Creates an adapter error.
    #[must_use]
    pub fn new(kind: AdapterErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Remote power controller errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CecError {
    /// `remote.enable_cec` is false; the adapter was not invoked.
    #[error("CEC control is disabled")]
    Disabled,
    /// The adapter failed.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// A command-line bridge to the CEC bus.
#[async_trait]
pub trait CecAdapter: Send + Sync {
    /// Returns true if the adapter is installed on this host.
    fn is_available(&self) -> bool;

    /// Runs one command and returns the adapter's textual output.
    async fn execute(&self, command: CecCommand) -> Result<String, AdapterError>;
}

/// [`CecAdapter`] backed by `cec-client` in single-command mode.
#[derive(Debug, Clone)]
pub struct CecClientAdapter {
    binary: String,
    timeout: Duration,
}

impl Default for CecClientAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_CEC_BINARY, DEFAULT_CEC_TIMEOUT)
    }
}

impl CecClientAdapter {
    /// Creates an adapter for `binary` with a hard per-call timeout.
    #[must_use]
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CecAdapter for CecClientAdapter {
    fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    async fn execute(&self, command: CecCommand) -> Result<String, AdapterError> {
        let mut child = Command::new(&self.binary)
            .args(["-s", "-d", "1"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AdapterError::new(
                    AdapterErrorKind::NotAvailable,
                    format!("failed to start {}: {e}", self.binary),
                )
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = format!("{}\n", command.adapter_input());
            // A closed pipe shows up as a non-zero exit below.
            let _ = stdin.write_all(input.as_bytes()).await;
        }

        // Dropping the child on timeout kills it (kill_on_drop).
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                AdapterError::new(
                    AdapterErrorKind::Timeout,
                    format!("{} did not finish within {:?}", self.binary, self.timeout),
                )
            })?
            .map_err(|e| {
                AdapterError::new(
                    AdapterErrorKind::NonZeroExit,
                    format!("failed to wait for {}: {e}", self.binary),
                )
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if !output.status.success() {
            return Err(AdapterError::new(
                AdapterErrorKind::NonZeroExit,
                format!("{} exited with {}", self.binary, output.status),
            ));
        }

        if reports_no_connection(&stdout) {
            return Err(AdapterError::new(
                AdapterErrorKind::NotAvailable,
                "adapter could not open a CEC connection",
            ));
        }

        Ok(stdout)
    }
}

/// Policy layer over a [`CecAdapter`].
#[derive(Clone)]
pub struct RemotePowerController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    settings: Arc<SettingsStore>,
    adapter: Arc<dyn CecAdapter>,
    available: OnceCell<bool>,
}

impl fmt::Debug for RemotePowerController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemotePowerController")
            .field("adapter", &"<CecAdapter>")
            .field("available", &self.inner.available.get())
            .finish_non_exhaustive()
    }
}

impl RemotePowerController {
    /// Creates a controller gated by the `remote` section of `settings`.
    #[must_use]
    pub fn new(settings: Arc<SettingsStore>, adapter: Arc<dyn CecAdapter>) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                settings,
                adapter,
                available: OnceCell::new(),
            }),
        }
    }

    /// Powers the TV on.
    ///
    /// # Errors
    ///
    /// Returns [`CecError::Disabled`] or the adapter failure.
    pub async fn power_on(&self) -> Result<(), CecError> {
        self.run(CecCommand::On).await.map(|_| ())
    }

    /// Puts the TV into standby.
    ///
    /// # Errors
    ///
    /// Returns [`CecError::Disabled`] or the adapter failure.
    pub async fn standby(&self) -> Result<(), CecError> {
        self.run(CecCommand::Standby).await.map(|_| ())
    }

    /// Queries the TV power status.
    ///
    /// # Errors
    ///
    /// Returns [`CecError::Disabled`] or the adapter failure.
    pub async fn query_status(&self) -> Result<PowerStatus, CecError> {
        let output = self.run(CecCommand::Status).await?;
        Ok(parse_power_status(&output))
    }

    /// Lists devices on the CEC bus.
    ///
    /// # Errors
    ///
    /// Returns [`CecError::Disabled`] or the adapter failure.
    pub async fn scan_devices(&self) -> Result<Vec<DeviceDescriptor>, CecError> {
        let output = self.run(CecCommand::Scan).await?;
        Ok(parse_scan_output(&output))
    }

    async fn run(&self, command: CecCommand) -> Result<String, CecError> {
        if !self.inner.settings.current().remote.enable_cec {
            tracing::debug!(command = %command, "CEC disabled; skipping adapter");
            return Err(CecError::Disabled);
        }

        let adapter = Arc::clone(&self.inner.adapter);
        let available = *self
            .inner
            .available
            .get_or_init(|| async move {
                let available = adapter.is_available();
                if !available {
                    tracing::warn!("CEC adapter not found; CEC control unavailable");
                }
                available
            })
            .await;

        if !available {
            crate::metrics::record_cec_command(command.as_str(), "not_available");
            return Err(AdapterError::new(
                AdapterErrorKind::NotAvailable,
                "CEC adapter is not installed",
            )
            .into());
        }

        let result = self
            .inner
            .adapter
            .execute(command)
            .instrument(cec_span(command.as_str()))
            .await;

        match &result {
            Ok(_) => {
                crate::metrics::record_cec_command(command.as_str(), "ok");
                tracing::info!(command = %command, "CEC command sent");
            }
            Err(e) => {
                crate::metrics::record_cec_command(command.as_str(), &e.kind.to_string());
                tracing::warn!(command = %command, error = %e, "CEC command failed");
            }
        }

        result.map_err(CecError::from)
    }
}

fn reports_no_connection(output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    NO_CONNECTION_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

fn power_status_from(value: &str) -> PowerStatus {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" => PowerStatus::On,
        "standby" => PowerStatus::Standby,
        _ => PowerStatus::Unknown,
    }
}

/// Extracts the first `power status:` line from adapter output.
pub(crate) fn parse_power_status(output: &str) -> PowerStatus {
    output
        .lines()
        .filter_map(|line| line.trim().split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("power status"))
        .map_or(PowerStatus::Unknown, |(_, value)| power_status_from(value))
}

/// Parses `device #N: <name>` blocks from a `scan` report.
pub(crate) fn parse_scan_output(output: &str) -> Vec<DeviceDescriptor> {
    let mut devices = Vec::new();
    let mut current: Option<DeviceDescriptor> = None;

    for line in output.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("device #") {
            if let Some(device) = current.take() {
                devices.push(device);
            }
            let Some((address, name)) = rest.split_once(':') else {
                continue;
            };
            let Ok(logical_address) = address.trim().parse::<u8>() else {
                continue;
            };
            current = Some(DeviceDescriptor {
                logical_address,
                name: name.trim().to_string(),
                physical_address: None,
                vendor: None,
                osd_name: None,
                power_status: PowerStatus::Unknown,
            });
            continue;
        }

        let (Some(device), Some((key, value))) = (current.as_mut(), line.split_once(':')) else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "address" => device.physical_address = Some(value.to_string()),
            "vendor" => device.vendor = Some(value.to_string()),
            "osd string" => device.osd_name = Some(value.to_string()),
            "power status" => device.power_status = power_status_from(value),
            _ => {}
        }
    }

    if let Some(device) = current {
        devices.push(device);
    }
    devices
}
