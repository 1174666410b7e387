//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mediahub_core::cec::{DEFAULT_CEC_BINARY, DEFAULT_CEC_TIMEOUT};
use mediahub_core::exit::DEFAULT_POWER_TIMEOUT;
use mediahub_core::reachability::{ProbeConfig, DEFAULT_PROBE_ENDPOINTS};
use mediahub_core::supervisor::{SupervisorConfig, DEFAULT_BROWSER_CANDIDATES};
use mediahub_core::{Error, Result};

/// CORS configuration for browser-based access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins. Use `["*"]` to allow all origins (development only).
    /// Empty list disables CORS entirely.
    pub allowed_origins: Vec<String>,

    /// Max age for preflight cache (seconds).
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            // The menu is served same-origin; CORS is off unless asked for.
            allowed_origins: Vec::new(),
            max_age_seconds: 3600,
        }
    }
}

/// Process-level configuration (not the persisted settings document).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP port.
    pub http_port: u16,
    /// Bind address. Loopback by default; the control surface has no auth.
    pub bind_addr: IpAddr,
    /// Debug mode (pretty logs).
    pub debug: bool,
    /// Settings document path.
    pub settings_path: PathBuf,
    /// Shipped defaults document, used when `settings_path` is missing.
    pub default_settings_path: Option<PathBuf>,
    /// Directory with the menu's static assets.
    pub static_dir: Option<PathBuf>,
    /// Present the menu in the kiosk browser after the boot delay.
    pub present_hub: bool,
    /// Path of the menu page on this server.
    pub hub_path: String,
    /// Browser binaries tried in order.
    pub browser_candidates: Vec<String>,
    /// `DISPLAY` used for launched processes when the orchestrator has none.
    pub display: Option<String>,
    /// Time between SIGINT and SIGKILL for the presented process.
    pub terminate_grace_ms: u64,
    /// Presented-process watcher interval.
    pub watch_interval_ms: u64,
    /// CEC adapter binary.
    pub cec_binary: String,
    /// CEC adapter timeout.
    pub cec_timeout_ms: u64,
    /// Reachability probe endpoints (`host:port`).
    pub probe_endpoints: Vec<String>,
    /// Per-probe timeout.
    pub probe_timeout_ms: u64,
    /// Time between probe rounds.
    pub probe_interval_secs: u64,
    /// Extra attempts per probe round.
    pub probe_retries: u32,
    /// Timeout for shutdown/reboot commands.
    pub power_timeout_ms: u64,
    /// CORS configuration.
    pub cors: CorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8000,
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            debug: false,
            settings_path: PathBuf::from("config.json"),
            default_settings_path: None,
            static_dir: None,
            present_hub: false,
            hub_path: "/index.html".to_string(),
            browser_candidates: DEFAULT_BROWSER_CANDIDATES
                .iter()
                .map(ToString::to_string)
                .collect(),
            display: Some(":0".to_string()),
            terminate_grace_ms: 3000,
            watch_interval_ms: 1000,
            cec_binary: DEFAULT_CEC_BINARY.to_string(),
            cec_timeout_ms: duration_ms(DEFAULT_CEC_TIMEOUT),
            probe_endpoints: DEFAULT_PROBE_ENDPOINTS
                .iter()
                .map(ToString::to_string)
                .collect(),
            probe_timeout_ms: 3000,
            probe_interval_secs: 15,
            probe_retries: 2,
            power_timeout_ms: duration_ms(DEFAULT_POWER_TIMEOUT),
            cors: CorsConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `MEDIAHUB_HTTP_PORT`
    /// - `MEDIAHUB_BIND_ADDR`
    /// - `MEDIAHUB_DEBUG`
    /// - `MEDIAHUB_SETTINGS_PATH`
    /// - `MEDIAHUB_DEFAULT_SETTINGS_PATH`
    /// - `MEDIAHUB_STATIC_DIR`
    /// - `MEDIAHUB_PRESENT_HUB`
    /// - `MEDIAHUB_HUB_PATH`
    /// - `MEDIAHUB_BROWSER_CANDIDATES` (comma-separated)
    /// - `MEDIAHUB_DISPLAY` (`none` disables the override)
    /// - `MEDIAHUB_TERMINATE_GRACE_MS`
    /// - `MEDIAHUB_WATCH_INTERVAL_MS`
    /// - `MEDIAHUB_CEC_BINARY`
    /// - `MEDIAHUB_CEC_TIMEOUT_MS`
    /// - `MEDIAHUB_PROBE_ENDPOINTS` (comma-separated `host:port`)
    /// - `MEDIAHUB_PROBE_TIMEOUT_MS`
    /// - `MEDIAHUB_PROBE_INTERVAL_SECS`
    /// - `MEDIAHUB_PROBE_RETRIES`
    /// - `MEDIAHUB_POWER_TIMEOUT_MS`
    /// - `MEDIAHUB_CORS_ALLOWED_ORIGINS` (comma-separated, or `*`)
    /// - `MEDIAHUB_CORS_MAX_AGE_SECONDS`
    ///
    /// # Errors
    ///
    /// Returns an error if any environment variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup` (the environment, or a map in tests).
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let mut config = Self::default();

        if let Some(port) = env.u16("MEDIAHUB_HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(addr) = env.string("MEDIAHUB_BIND_ADDR") {
            config.bind_addr = addr.parse().map_err(|e| {
                Error::InvalidInput(format!("MEDIAHUB_BIND_ADDR must be an IP address: {e}"))
            })?;
        }
        if let Some(debug) = env.bool("MEDIAHUB_DEBUG")? {
            config.debug = debug;
        }

        if let Some(path) = env.string("MEDIAHUB_SETTINGS_PATH") {
            config.settings_path = PathBuf::from(path);
        }
        config.default_settings_path = env.string("MEDIAHUB_DEFAULT_SETTINGS_PATH").map(PathBuf::from);
        config.static_dir = env.string("MEDIAHUB_STATIC_DIR").map(PathBuf::from);
        if let Some(present) = env.bool("MEDIAHUB_PRESENT_HUB")? {
            config.present_hub = present;
        }
        if let Some(path) = env.string("MEDIAHUB_HUB_PATH") {
            if !path.starts_with('/') {
                return Err(Error::InvalidInput(
                    "MEDIAHUB_HUB_PATH must start with '/'".to_string(),
                ));
            }
            config.hub_path = path;
        }

        if let Some(candidates) = env.string("MEDIAHUB_BROWSER_CANDIDATES") {
            let candidates = parse_list(&candidates);
            if candidates.is_empty() {
                return Err(Error::InvalidInput(
                    "MEDIAHUB_BROWSER_CANDIDATES must name at least one binary".to_string(),
                ));
            }
            config.browser_candidates = candidates;
        }
        if let Some(display) = env.string("MEDIAHUB_DISPLAY") {
            config.display = (!display.eq_ignore_ascii_case("none")).then_some(display);
        }
        if let Some(ms) = env.u64("MEDIAHUB_TERMINATE_GRACE_MS")? {
            config.terminate_grace_ms = ms;
        }
        if let Some(ms) = env.u64("MEDIAHUB_WATCH_INTERVAL_MS")? {
            config.watch_interval_ms = ms.max(1);
        }

        if let Some(binary) = env.string("MEDIAHUB_CEC_BINARY") {
            config.cec_binary = binary;
        }
        if let Some(ms) = env.u64("MEDIAHUB_CEC_TIMEOUT_MS")? {
            config.cec_timeout_ms = ms;
        }

        if let Some(endpoints) = env.string("MEDIAHUB_PROBE_ENDPOINTS") {
            config.probe_endpoints = parse_list(&endpoints);
        }
        if let Some(ms) = env.u64("MEDIAHUB_PROBE_TIMEOUT_MS")? {
            config.probe_timeout_ms = ms;
        }
        if let Some(secs) = env.u64("MEDIAHUB_PROBE_INTERVAL_SECS")? {
            config.probe_interval_secs = secs.max(1);
        }
        if let Some(retries) = env.u32("MEDIAHUB_PROBE_RETRIES")? {
            config.probe_retries = retries;
        }
        if let Some(ms) = env.u64("MEDIAHUB_POWER_TIMEOUT_MS")? {
            config.power_timeout_ms = ms;
        }

        if let Some(origins) = env.string("MEDIAHUB_CORS_ALLOWED_ORIGINS") {
            config.cors.allowed_origins = parse_cors_allowed_origins(&origins);
        }
        if let Some(max_age) = env.u64("MEDIAHUB_CORS_MAX_AGE_SECONDS")? {
            config.cors.max_age_seconds = max_age;
        }

        Ok(config)
    }

    /// Socket address the server binds to.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.http_port)
    }

    /// URL of the menu as seen from the kiosk browser.
    #[must_use]
    pub fn hub_url(&self) -> String {
        let host = if self.bind_addr.is_unspecified() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.bind_addr
        };
        format!("http://{}{}", SocketAddr::new(host, self.http_port), self.hub_path)
    }

    /// Supervisor tuning derived from this configuration.
    ///
    /// Return-to-hub is only enabled when the hub is presented.
    #[must_use]
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            browser_candidates: self.browser_candidates.clone(),
            display: self.display.clone(),
            grace_period: Duration::from_millis(self.terminate_grace_ms),
            watch_interval: Duration::from_millis(self.watch_interval_ms),
            hub_url: self.present_hub.then(|| self.hub_url()),
            ..SupervisorConfig::default()
        }
    }

    /// Reachability monitor tuning derived from this configuration.
    #[must_use]
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            endpoints: self.probe_endpoints.clone(),
            timeout: Duration::from_millis(self.probe_timeout_ms),
            interval: Duration::from_secs(self.probe_interval_secs),
            retries: self.probe_retries,
            ..ProbeConfig::default()
        }
    }

    /// CEC adapter timeout.
    #[must_use]
    pub fn cec_timeout(&self) -> Duration {
        Duration::from_millis(self.cec_timeout_ms)
    }

    /// Power command timeout.
    #[must_use]
    pub fn power_timeout(&self) -> Duration {
        Duration::from_millis(self.power_timeout_ms)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn u16(&self, name: &str) -> Result<Option<u16>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u16>()
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{name} must be a u16: {e}")))
    }

    fn u32(&self, name: &str) -> Result<Option<u32>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u32>()
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{name} must be a u32: {e}")))
    }

    fn u64(&self, name: &str) -> Result<Option<u64>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u64>()
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
    }

    fn bool(&self, name: &str) -> Result<Option<bool>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        parse_bool(name, &v).map(Some)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_cors_allowed_origins(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    if trimmed == "*" {
        return vec!["*".to_string()];
    }
    parse_list(trimmed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_bind_loopback_on_8000() -> Result<()> {
        let config = from_pairs(&[])?;
        assert_eq!(config.socket_addr(), "127.0.0.1:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.settings_path, PathBuf::from("config.json"));
        assert!(!config.present_hub);
        assert!(config.cors.allowed_origins.is_empty());
        Ok(())
    }

    #[test]
    fn overrides_are_applied() -> Result<()> {
        let config = from_pairs(&[
            ("MEDIAHUB_HTTP_PORT", "9000"),
            ("MEDIAHUB_BIND_ADDR", "0.0.0.0"),
            ("MEDIAHUB_DEBUG", "yes"),
            ("MEDIAHUB_PRESENT_HUB", "1"),
            ("MEDIAHUB_BROWSER_CANDIDATES", "firefox, chromium"),
            ("MEDIAHUB_DISPLAY", "none"),
            ("MEDIAHUB_PROBE_RETRIES", "5"),
            ("MEDIAHUB_CORS_ALLOWED_ORIGINS", "*"),
        ])?;
        assert_eq!(config.http_port, 9000);
        assert!(config.debug);
        assert_eq!(config.browser_candidates, vec!["firefox", "chromium"]);
        assert!(config.display.is_none());
        assert_eq!(config.probe_config().retries, 5);
        assert_eq!(config.cors.allowed_origins, vec!["*"]);

        // Unspecified bind address still gives the browser a loopback URL.
        assert_eq!(config.hub_url(), "http://127.0.0.1:9000/index.html");
        assert_eq!(
            config.supervisor_config().hub_url.as_deref(),
            Some("http://127.0.0.1:9000/index.html")
        );
        Ok(())
    }

    #[test]
    fn hub_url_is_only_used_when_presenting() -> Result<()> {
        let config = from_pairs(&[])?;
        assert!(config.supervisor_config().hub_url.is_none());
        Ok(())
    }

    #[test]
    fn blank_values_are_ignored() -> Result<()> {
        let config = from_pairs(&[("MEDIAHUB_HTTP_PORT", "  "), ("MEDIAHUB_CEC_BINARY", "")])?;
        assert_eq!(config.http_port, 8000);
        assert_eq!(config.cec_binary, DEFAULT_CEC_BINARY);
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(from_pairs(&[("MEDIAHUB_HTTP_PORT", "99999")]).is_err());
        assert!(from_pairs(&[("MEDIAHUB_BIND_ADDR", "localhost")]).is_err());
        assert!(from_pairs(&[("MEDIAHUB_DEBUG", "maybe")]).is_err());
        assert!(from_pairs(&[("MEDIAHUB_HUB_PATH", "index.html")]).is_err());
        assert!(from_pairs(&[("MEDIAHUB_BROWSER_CANDIDATES", ",")]).is_err());
    }

    #[test]
    fn parse_bool_accepts_true_and_false_values() {
        assert!(parse_bool("TEST", "TRUE").unwrap());
        assert!(parse_bool("TEST", "y").unwrap());
        assert!(!parse_bool("TEST", "0").unwrap());
        assert!(!parse_bool("TEST", "No").unwrap());
        assert!(parse_bool("TEST", "").is_err());
    }
}
