//! The persisted settings document.
//!
//! Settings are deserialized into a typed schema, so enum membership is
//! enforced at decode time. [`Settings::validate`] checks the remaining
//! cross-field rules before a candidate may replace the current snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Maximum accepted boot delay.
pub const MAX_BOOT_DELAY_SECS: u64 = 600;

/// User agent that gets the TV layout from YouTube.
pub const TV_USER_AGENT: &str = "Mozilla/5.0 (SMART-TV; Linux; Tizen 5.0) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/94.0.4606.31 TV Safari/537.36";

/// How an app should be launched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMethod {
    /// Browser in kiosk mode pointed at the app URL.
    #[default]
    Browser,
    /// Registered native viewer; falls back to the browser when absent.
    Native,
    /// Native when preferred and installed, otherwise browser.
    Auto,
}

/// Animation budget hint for the menu collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceMode {
    /// Minimal animations.
    Low,
    /// Moderate animations.
    #[default]
    Balanced,
    /// Full animations.
    High,
}

/// Output resolution hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ResolutionHint {
    /// 1280x720.
    #[serde(rename = "720p")]
    Hd,
    /// 1920x1080.
    #[default]
    #[serde(rename = "1080p")]
    FullHd,
    /// 3840x2160.
    #[serde(rename = "4k")]
    UltraHd,
}

/// What happens when the user exits the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExitAction {
    /// Put the TV into standby over CEC, then close.
    #[default]
    CecStandby,
    /// Close the presented app and stop the orchestrator.
    Close,
    /// Power off the appliance.
    Shutdown,
    /// Reboot the appliance.
    Reboot,
}

/// Action taken when CEC standby is unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExitFallback {
    /// Close the presented app and stop the orchestrator.
    #[default]
    Close,
    /// Power off the appliance.
    Shutdown,
    /// Reboot the appliance.
    Reboot,
}

impl From<ExitFallback> for ExitAction {
    fn from(value: ExitFallback) -> Self {
        match value {
            ExitFallback::Close => Self::Close,
            ExitFallback::Shutdown => Self::Shutdown,
            ExitFallback::Reboot => Self::Reboot,
        }
    }
}

/// One entry of the app menu.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AppDescriptor {
    /// Whether the app is shown and launchable.
    pub enabled: bool,
    /// Display name.
    pub name: String,
    /// Icon URI for the menu.
    pub icon: String,
    /// Launch method.
    pub launch_method: LaunchMethod,
    /// Target URL for browser launches.
    pub url: String,
    /// Prefer a native viewer when `launch_method` is `auto`.
    pub prefer_native: bool,
    /// Optional browser user agent override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl AppDescriptor {
    /// Creates an enabled browser app.
    #[must_use]
    pub fn browser(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            name: name.into(),
            launch_method: LaunchMethod::Browser,
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Display preferences consumed by the menu collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct DisplaySettings {
    /// Animation budget.
    pub performance_mode: PerformanceMode,
    /// Idle time before the cursor is hidden.
    pub hide_cursor_timeout_ms: u64,
    /// Output resolution hint.
    pub resolution_hint: ResolutionHint,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            performance_mode: PerformanceMode::Balanced,
            hide_cursor_timeout_ms: 3000,
            resolution_hint: ResolutionHint::FullHd,
        }
    }
}

/// Startup behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct StartupSettings {
    /// Run the reachability monitor.
    pub check_network: bool,
    /// Start with the appliance.
    pub autostart: bool,
    /// Delay before presenting the hub at startup.
    #[serde(alias = "boot_delay")]
    pub boot_delay_s: u64,
}

impl Default for StartupSettings {
    fn default() -> Self {
        Self {
            check_network: true,
            autostart: false,
            boot_delay_s: 10,
        }
    }
}

/// Exit behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ExitSettings {
    /// Primary exit action.
    pub action: ExitAction,
    /// Action taken when CEC standby fails or CEC is disabled.
    pub cec_fallback: ExitFallback,
    /// Ask the user before exiting (menu collaborator concern).
    pub show_confirmation: bool,
}

impl Default for ExitSettings {
    fn default() -> Self {
        Self {
            action: ExitAction::CecStandby,
            cec_fallback: ExitFallback::Close,
            show_confirmation: true,
        }
    }
}

/// Remote-control settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RemoteSettings {
    /// Allow CEC adapter calls.
    pub enable_cec: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self { enable_cec: true }
    }
}

/// Browser tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AdvancedSettings {
    /// Flags passed to the browser before the target URL.
    #[serde(alias = "chromium_flags")]
    pub browser_flags: Vec<String>,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            browser_flags: [
                "--kiosk",
                "--noerrdialogs",
                "--disable-infobars",
                "--disable-session-crashed-bubble",
                "--check-for-update-interval=31536000",
                "--autoplay-policy=no-user-gesture-required",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

/// The full settings document.
///
/// `Default` is the compiled-in document used when nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Settings {
    /// Apps keyed by stable identifier.
    #[serde(default)]
    pub apps: BTreeMap<String, AppDescriptor>,
    /// Display preferences.
    #[serde(default)]
    pub display: DisplaySettings,
    /// Startup behavior.
    #[serde(default)]
    pub startup: StartupSettings,
    /// Exit behavior.
    #[serde(default)]
    pub exit: ExitSettings,
    /// Remote-control settings.
    #[serde(default)]
    pub remote: RemoteSettings,
    /// Browser tuning.
    #[serde(default)]
    pub advanced: AdvancedSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let mut apps = BTreeMap::new();
        apps.insert(
            "youtube".to_string(),
            AppDescriptor {
                icon: "icons/youtube.svg".to_string(),
                user_agent: Some(TV_USER_AGENT.to_string()),
                ..AppDescriptor::browser("YouTube", "https://www.youtube.com/tv")
            },
        );
        apps.insert(
            "spotify".to_string(),
            AppDescriptor {
                icon: "icons/spotify.svg".to_string(),
                launch_method: LaunchMethod::Auto,
                ..AppDescriptor::browser("Spotify", "https://open.spotify.com")
            },
        );
        apps.insert(
            "jellyfin".to_string(),
            AppDescriptor {
                enabled: false,
                icon: "icons/jellyfin.svg".to_string(),
                launch_method: LaunchMethod::Auto,
                prefer_native: true,
                ..AppDescriptor::browser("Jellyfin", "http://jellyfin.local:8096")
            },
        );

        Self {
            apps,
            display: DisplaySettings::default(),
            startup: StartupSettings::default(),
            exit: ExitSettings::default(),
            remote: RemoteSettings::default(),
            advanced: AdvancedSettings::default(),
        }
    }
}

impl Settings {
    /// Settings with no apps and default sections.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            apps: BTreeMap::new(),
            ..Self::default()
        }
    }

    /// Adds or replaces an app (builder style).
    #[must_use]
    pub fn with_app(mut self, key: impl Into<String>, app: AppDescriptor) -> Self {
        self.apps.insert(key.into(), app);
        self
    }

    /// Looks up an app by key.
    #[must_use]
    pub fn app(&self, key: &str) -> Option<&AppDescriptor> {
        self.apps.get(key)
    }

    /// Validates the whole document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        for (key, app) in &self.apps {
            validate_app_key(key)?;
            if !app.enabled {
                continue;
            }
            if app.name.trim().is_empty() {
                return Err(Error::validation(
                    format!("apps.{key}.name"),
                    "must not be empty for an enabled app",
                ));
            }
            if app.launch_method != LaunchMethod::Native && app.url.trim().is_empty() {
                return Err(Error::validation(
                    format!("apps.{key}.url"),
                    "must not be empty for an enabled app launched in the browser",
                ));
            }
            if app
                .user_agent
                .as_deref()
                .is_some_and(|agent| agent.trim().is_empty())
            {
                return Err(Error::validation(
                    format!("apps.{key}.user_agent"),
                    "must be omitted or non-empty",
                ));
            }
        }

        // hide_cursor_timeout_ms is unsigned; negative values fail to decode.

        if self.startup.boot_delay_s > MAX_BOOT_DELAY_SECS {
            return Err(Error::validation(
                "startup.boot_delay_s",
                format!("must be at most {MAX_BOOT_DELAY_SECS}"),
            ));
        }

        if let Some(index) = self
            .advanced
            .browser_flags
            .iter()
            .position(|flag| flag.trim().is_empty())
        {
            return Err(Error::validation(
                format!("advanced.browser_flags[{index}]"),
                "must not be empty",
            ));
        }

        Ok(())
    }
}

fn validate_app_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::validation("apps", "app keys must not be empty"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::validation(
            format!("apps.{key}"),
            "app keys may only contain ASCII letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: Error) -> String {
        match err {
            Error::Validation { field, .. } => field,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn default_settings_are_valid() {
        Settings::default().validate().unwrap();
        Settings::empty().validate().unwrap();
    }

    #[test]
    fn enabled_browser_app_requires_url() {
        let settings = Settings::empty().with_app("yt", AppDescriptor::browser("YouTube", ""));
        assert_eq!(field_of(settings.validate().unwrap_err()), "apps.yt.url");
    }

    #[test]
    fn native_app_may_omit_url() {
        let settings = Settings::empty().with_app(
            "jellyfin",
            AppDescriptor {
                launch_method: LaunchMethod::Native,
                ..AppDescriptor::browser("Jellyfin", "")
            },
        );
        settings.validate().unwrap();
    }

    #[test]
    fn disabled_app_is_not_checked() {
        let settings = Settings::empty().with_app(
            "yt",
            AppDescriptor {
                enabled: false,
                ..AppDescriptor::browser("", "")
            },
        );
        settings.validate().unwrap();
    }

    #[test]
    fn app_key_charset_is_enforced() {
        let settings =
            Settings::empty().with_app("you tube", AppDescriptor::browser("YouTube", "https://x"));
        assert_eq!(field_of(settings.validate().unwrap_err()), "apps.you tube");
    }

    #[test]
    fn boot_delay_is_bounded() {
        let mut settings = Settings::empty();
        settings.startup.boot_delay_s = MAX_BOOT_DELAY_SECS + 1;
        assert_eq!(
            field_of(settings.validate().unwrap_err()),
            "startup.boot_delay_s"
        );
    }

    #[test]
    fn decode_fills_missing_sections_and_accepts_aliases() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "apps": {"yt": {"enabled": true, "name": "YT", "url": "https://x"}},
            "startup": {"boot_delay": 5},
            "advanced": {"chromium_flags": ["--kiosk"]}
        }))
        .unwrap();

        assert_eq!(settings.startup.boot_delay_s, 5);
        assert!(settings.startup.check_network);
        assert_eq!(settings.advanced.browser_flags, vec!["--kiosk".to_string()]);
        assert_eq!(settings.exit, ExitSettings::default());
        assert_eq!(settings.apps["yt"].launch_method, LaunchMethod::Browser);
    }

    #[test]
    fn decode_rejects_unknown_enum_values() {
        let result: std::result::Result<Settings, _> = serde_json::from_value(serde_json::json!({
            "display": {"performance_mode": "ultra"}
        }));
        assert!(result.is_err());

        let result: std::result::Result<Settings, _> = serde_json::from_value(serde_json::json!({
            "exit": {"cec_fallback": "cec_standby"}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn decode_rejects_negative_cursor_timeout() {
        let result: std::result::Result<Settings, _> = serde_json::from_value(serde_json::json!({
            "display": {"hide_cursor_timeout_ms": -1}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn resolution_hint_uses_wire_names() {
        let json = serde_json::to_value(ResolutionHint::UltraHd).unwrap();
        assert_eq!(json, serde_json::json!("4k"));
    }
}
