//! Pre-built test fixtures for common test scenarios.
//!
//! [`TestContext`] wires a settings store in a temp directory, a supervisor
//! over [`FakeProcessHost`], a remote power controller over
//! [`FakeCecAdapter`], and an exit coordinator over
//! [`RecordingPowerCommander`].

use std::sync::Arc;
use std::time::Duration;

use mediahub_core::cec::RemotePowerController;
use mediahub_core::exit::ExitCoordinator;
use mediahub_core::settings::{AppDescriptor, LaunchMethod, Settings};
use mediahub_core::store::SettingsStore;
use mediahub_core::supervisor::{ProcessSupervisor, SupervisorConfig};
use tempfile::TempDir;

use crate::cec::FakeCecAdapter;
use crate::power::RecordingPowerCommander;
use crate::process::FakeProcessHost;

/// Browser binary installed on the default fake host.
pub const FAKE_BROWSER: &str = "chromium";

/// Hub URL used by [`supervisor_config`].
pub const FAKE_HUB_URL: &str = "http://127.0.0.1:8000/index.html";

/// Settings with one app per launch path.
///
/// - `yt`: browser app
/// - `jellyfin`: native (registered handler)
/// - `spotify`: auto, prefers native
/// - `web`: auto without native preference
/// - `broken`: browser app with a non-http target
/// - `off`: disabled
pub fn fixture_settings() -> Settings {
    Settings::empty()
        .with_app(
            "yt",
            AppDescriptor::browser("YouTube", "https://www.youtube.com/tv"),
        )
        .with_app(
            "jellyfin",
            AppDescriptor {
                launch_method: LaunchMethod::Native,
                ..AppDescriptor::browser("Jellyfin", "http://jellyfin.local:8096")
            },
        )
        .with_app(
            "spotify",
            AppDescriptor {
                launch_method: LaunchMethod::Auto,
                prefer_native: true,
                ..AppDescriptor::browser("Spotify", "https://open.spotify.com")
            },
        )
        .with_app(
            "web",
            AppDescriptor {
                launch_method: LaunchMethod::Auto,
                ..AppDescriptor::browser("Web", "https://example.org")
            },
        )
        .with_app(
            "broken",
            AppDescriptor::browser("Broken", "file:///etc/passwd"),
        )
        .with_app(
            "off",
            AppDescriptor {
                enabled: false,
                ..AppDescriptor::browser("Off", "https://example.com")
            },
        )
}

/// Supervisor tuning with short timers for tests.
pub fn supervisor_config() -> SupervisorConfig {
    SupervisorConfig {
        browser_candidates: vec!["chromium-browser".to_string(), FAKE_BROWSER.to_string()],
        display: Some(":0".to_string()),
        grace_period: Duration::from_millis(100),
        watch_interval: Duration::from_millis(20),
        hub_url: Some(FAKE_HUB_URL.to_string()),
        hub_return_delay: Duration::from_millis(10),
    }
}

/// Fully wired components over fakes.
pub struct TestContext {
    /// Temp directory holding the settings document.
    pub dir: TempDir,
    /// Settings store.
    pub store: Arc<SettingsStore>,
    /// Fake process host.
    pub host: FakeProcessHost,
    /// Fake CEC adapter.
    pub adapter: FakeCecAdapter,
    /// Recording power commander.
    pub power: RecordingPowerCommander,
    /// Process supervisor.
    pub supervisor: ProcessSupervisor,
    /// Remote power controller.
    pub cec: RemotePowerController,
    /// Exit coordinator.
    pub exit: ExitCoordinator,
}

impl TestContext {
    /// Context over [`fixture_settings`] and a working adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(fixture_settings())
    }

    /// Context over `settings` and a working adapter.
    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        Self::build(settings, FakeCecAdapter::new(), supervisor_config())
    }

    /// Context with a specific adapter.
    #[must_use]
    pub fn with_adapter(settings: Settings, adapter: FakeCecAdapter) -> Self {
        Self::build(settings, adapter, supervisor_config())
    }

    /// Context with everything specified.
    #[must_use]
    pub fn build(settings: Settings, adapter: FakeCecAdapter, config: SupervisorConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(SettingsStore::with_settings(
            dir.path().join("config.json"),
            settings,
        ));
        let host = FakeProcessHost::with_binaries([FAKE_BROWSER]);
        let power = RecordingPowerCommander::new();

        let supervisor =
            ProcessSupervisor::new(Arc::clone(&store), Arc::new(host.clone()), config);
        let cec = RemotePowerController::new(Arc::clone(&store), Arc::new(adapter.clone()));
        let exit = ExitCoordinator::new(
            Arc::clone(&store),
            cec.clone(),
            supervisor.clone(),
            Arc::new(power.clone()),
        );

        Self {
            dir,
            store,
            host,
            adapter,
            power,
            supervisor,
            cec,
            exit,
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
