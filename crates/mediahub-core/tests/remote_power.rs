//! Remote power controller policy tests.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use mediahub_core::cec::{
    AdapterErrorKind, CecCommand, CecError, PowerStatus, RemotePowerController,
};
use mediahub_core::settings::Settings;
use mediahub_core::store::SettingsStore;
use mediahub_test_utils::FakeCecAdapter;

fn controller(enable_cec: bool, adapter: &FakeCecAdapter) -> (Arc<SettingsStore>, RemotePowerController) {
    let mut settings = Settings::default();
    settings.remote.enable_cec = enable_cec;
    let store = Arc::new(SettingsStore::with_settings("/unused/config.json", settings));
    let controller = RemotePowerController::new(Arc::clone(&store), Arc::new(adapter.clone()));
    (store, controller)
}

#[tokio::test]
async fn disabled_never_invokes_adapter() {
    let adapter = FakeCecAdapter::new();
    let (_store, cec) = controller(false, &adapter);

    assert_eq!(cec.power_on().await, Err(CecError::Disabled));
    assert_eq!(cec.standby().await, Err(CecError::Disabled));
    assert_eq!(cec.query_status().await, Err(CecError::Disabled));
    assert_eq!(cec.scan_devices().await, Err(CecError::Disabled));

    assert!(adapter.calls().is_empty());
    assert_eq!(adapter.availability_checks(), 0);
}

#[tokio::test]
async fn absent_adapter_is_probed_once() {
    let adapter = FakeCecAdapter::absent();
    let (_store, cec) = controller(true, &adapter);

    for _ in 0..3 {
        match cec.standby().await {
            Err(CecError::Adapter(e)) => assert_eq!(e.kind, AdapterErrorKind::NotAvailable),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    assert_eq!(adapter.availability_checks(), 1);
    assert!(adapter.calls().is_empty());
}

#[tokio::test]
async fn commands_map_to_adapter_vocabulary() {
    let adapter = FakeCecAdapter::new();
    let (_store, cec) = controller(true, &adapter);

    cec.power_on().await.unwrap();
    cec.standby().await.unwrap();

    assert_eq!(adapter.calls(), vec![CecCommand::On, CecCommand::Standby]);
}

#[tokio::test]
async fn status_is_parsed_from_adapter_output() {
    let adapter = FakeCecAdapter::new();
    adapter.respond_with(Ok("opening a connection to the CEC adapter...\npower status: on\n".into()));
    let (_store, cec) = controller(true, &adapter);

    assert_eq!(cec.query_status().await.unwrap(), PowerStatus::On);

    adapter.respond_with(Ok("garbage".into()));
    assert_eq!(cec.query_status().await.unwrap(), PowerStatus::Unknown);
}

#[tokio::test]
async fn adapter_failures_surface_with_kind() {
    let adapter = FakeCecAdapter::failing(AdapterErrorKind::Timeout);
    let (_store, cec) = controller(true, &adapter);

    match cec.power_on().await {
        Err(CecError::Adapter(e)) => assert_eq!(e.kind, AdapterErrorKind::Timeout),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(adapter.calls(), vec![CecCommand::On]);
}

#[tokio::test]
async fn enable_flag_is_read_per_call() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.remote.enable_cec = false;
    let store = Arc::new(SettingsStore::with_settings(
        dir.path().join("config.json"),
        settings.clone(),
    ));
    let adapter = FakeCecAdapter::new();
    let cec = RemotePowerController::new(Arc::clone(&store), Arc::new(adapter.clone()));
    assert_eq!(cec.power_on().await, Err(CecError::Disabled));

    settings.remote.enable_cec = true;
    store.replace(settings).await.unwrap();
    cec.power_on().await.unwrap();
    assert_eq!(adapter.calls(), vec![CecCommand::On]);
}
