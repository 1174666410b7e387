//! Command-line interface for the `mediahub` binary.
//!
//! ## Commands
//!
//! - `mediahub serve` - Run the control server (default)
//! - `mediahub check` - Report browser, CEC adapter and native viewer availability
//! - `mediahub cec <on|standby|status|scan>` - Drive the TV directly
//!
//! Flags override the `MEDIAHUB_*` environment variables read by
//! [`Config::from_env`].

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use mediahub_core::cec::{CecClientAdapter, RemotePowerController};
use mediahub_core::process::ProcessHost;
use mediahub_core::store::SettingsStore;
use mediahub_core::supervisor::NATIVE_HANDLERS;

use crate::config::Config;

/// mediahub - kiosk launch orchestrator.
#[derive(Debug, Parser)]
#[command(name = "mediahub")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// HTTP port.
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Bind address.
    #[arg(long, global = true)]
    pub bind: Option<std::net::IpAddr>,

    /// Settings document path.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Directory with the menu's static assets.
    #[arg(long, global = true)]
    pub static_dir: Option<PathBuf>,

    /// Present the menu in the kiosk browser after the boot delay.
    #[arg(long, global = true)]
    pub present_hub: bool,

    /// Debug mode (pretty logs, permissive CORS allowed).
    #[arg(long, global = true)]
    pub debug: bool,

    /// Output format for `check` and `cec`.
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Applies command-line overrides on top of `config`.
    #[must_use]
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(port) = self.port {
            config.http_port = port;
        }
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(settings) = &self.settings {
            config.settings_path.clone_from(settings);
        }
        if let Some(dir) = &self.static_dir {
            config.static_dir = Some(dir.clone());
        }
        config.present_hub |= self.present_hub;
        config.debug |= self.debug;
        config
    }
}

/// CLI subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run the control server.
    Serve,
    /// Report availability of the browser, CEC adapter and native viewers.
    Check,
    /// Send a single CEC command.
    Cec {
        /// Command to send.
        #[arg(value_enum)]
        action: CecAction,
    },
}

/// Direct CEC commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CecAction {
    /// Wake the TV.
    On,
    /// Put the TV in standby.
    Standby,
    /// Query the power state.
    Status,
    /// Scan the bus for devices.
    Scan,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

/// Host dependency report produced by `mediahub check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    /// First installed browser candidate.
    pub browser: Option<PathBuf>,
    /// Resolved CEC adapter binary.
    pub cec_adapter: Option<PathBuf>,
    /// Native viewer per registered app key.
    pub native: Vec<NativeAvailability>,
}

/// Resolution of one native viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeAvailability {
    /// App key the viewer serves.
    pub app: String,
    /// Installed binary, if any.
    pub binary: Option<PathBuf>,
}

impl CheckReport {
    /// Probes `host` for everything the orchestrator may launch.
    #[must_use]
    pub fn collect(host: &dyn ProcessHost, config: &Config) -> Self {
        let browser = config
            .browser_candidates
            .iter()
            .find_map(|candidate| host.locate(candidate));
        let cec_adapter = host.locate(&config.cec_binary);
        let native = NATIVE_HANDLERS
            .iter()
            .map(|handler| NativeAvailability {
                app: handler.app_key.to_string(),
                binary: handler.binaries.iter().find_map(|b| host.locate(b)),
            })
            .collect();
        Self {
            browser,
            cec_adapter,
            native,
        }
    }

    /// True when a browser is installed; everything else is optional.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.browser.is_some()
    }

    /// Renders the report in `format`.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        if format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(self)?);
        }

        let mut lines = vec![
            line("browser", self.browser.as_ref()),
            line("cec adapter", self.cec_adapter.as_ref()),
        ];
        lines.extend(
            self.native
                .iter()
                .map(|n| line(&format!("native {}", n.app), n.binary.as_ref())),
        );
        Ok(lines.join("\n"))
    }
}

fn line(label: &str, path: Option<&PathBuf>) -> String {
    match path {
        Some(path) => format!("{label:<18} ok       {}", path.display()),
        None => format!("{label:<18} missing"),
    }
}

/// Runs one CEC command against the configured adapter and renders the result.
///
/// # Errors
///
/// Returns an error if settings cannot be loaded, CEC is disabled, or the
/// adapter fails.
pub async fn run_cec(action: CecAction, config: &Config, format: OutputFormat) -> anyhow::Result<String> {
    let settings = Arc::new(SettingsStore::load_with_defaults(
        config.settings_path.clone(),
        config.default_settings_path.as_deref(),
    )?);
    let adapter = Arc::new(CecClientAdapter::new(
        config.cec_binary.clone(),
        config.cec_timeout(),
    ));
    let cec = RemotePowerController::new(settings, adapter);

    let value = match action {
        CecAction::On => {
            cec.power_on().await?;
            serde_json::json!({ "sent": "on" })
        }
        CecAction::Standby => {
            cec.standby().await?;
            serde_json::json!({ "sent": "standby" })
        }
        CecAction::Status => serde_json::json!({ "status": cec.query_status().await? }),
        CecAction::Scan => serde_json::json!({ "devices": cec.scan_devices().await? }),
    };

    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&value)?,
        OutputFormat::Text => render_text(&value),
    })
}

fn render_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", render_text(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Array(items) if items.is_empty() => "(none)".to_string(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| format!("\n  {item}"))
            .collect(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediahub_test_utils::FakeProcessHost;

    #[test]
    fn flags_override_environment_config() {
        let cli = Cli::parse_from([
            "mediahub",
            "--port",
            "9100",
            "--settings",
            "/var/lib/mediahub/config.json",
            "--present-hub",
            "check",
        ]);
        let config = cli.apply(Config::default());

        assert_eq!(config.http_port, 9100);
        assert_eq!(config.settings_path, PathBuf::from("/var/lib/mediahub/config.json"));
        assert!(config.present_hub);
        assert!(!config.debug);
        assert!(matches!(cli.command, Some(Commands::Check)));
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::parse_from(["mediahub", "--debug"]);
        assert!(cli.command.is_none());
        assert!(cli.apply(Config::default()).debug);
    }

    #[test]
    fn cec_action_parses() {
        let cli = Cli::parse_from(["mediahub", "cec", "standby", "--format", "json"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Cec {
                action: CecAction::Standby
            })
        ));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn check_report_lists_installed_binaries() {
        let host = FakeProcessHost::with_binaries(["chromium", "spotify"]);
        let report = CheckReport::collect(&host, &Config::default());

        assert_eq!(report.browser, Some(PathBuf::from("/usr/bin/chromium")));
        assert!(report.cec_adapter.is_none());
        assert!(report.is_usable());

        let spotify = report.native.iter().find(|n| n.app == "spotify").unwrap();
        assert_eq!(spotify.binary, Some(PathBuf::from("/usr/bin/spotify")));
        let jellyfin = report.native.iter().find(|n| n.app == "jellyfin").unwrap();
        assert!(jellyfin.binary.is_none());

        let text = report.render(OutputFormat::Text).unwrap();
        assert!(text.contains("cec adapter"));
        assert!(text.contains("missing"));
    }

    #[test]
    fn check_report_without_browser_is_unusable() {
        let report = CheckReport::collect(&FakeProcessHost::new(), &Config::default());
        assert!(!report.is_usable());
        let json = report.render(OutputFormat::Json).unwrap();
        assert!(json.contains("\"cecAdapter\": null"));
    }
}
