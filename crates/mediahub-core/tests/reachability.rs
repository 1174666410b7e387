//! Reachability monitor tests.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use mediahub_core::reachability::{ProbeConfig, ReachabilityMonitor};
use mediahub_core::settings::Settings;
use mediahub_test_utils::ScriptedProber;

fn config(retries: u32) -> ProbeConfig {
    ProbeConfig {
        endpoints: vec!["192.0.2.1:53".to_string()],
        timeout: Duration::from_millis(10),
        interval: Duration::from_millis(10),
        retries,
        retry_pause: Duration::ZERO,
        confirmations: 2,
    }
}

#[tokio::test]
async fn starts_online_and_flips_after_two_failed_rounds() {
    let prober = ScriptedProber::new([false, false], true);
    let (mut monitor, handle) = ReachabilityMonitor::new(config(0), Arc::new(prober.clone()));

    let initial = handle.current();
    assert!(initial.online);
    assert!(initial.monitored);
    assert!(initial.last_checked.is_none());

    assert!(monitor.check_once().await.online);
    assert!(handle.current().last_checked.is_some());

    assert!(!monitor.check_once().await.online);
    assert!(!handle.current().online);
    assert_eq!(prober.probes(), 2);
}

#[tokio::test]
async fn single_blip_is_suppressed() {
    let prober = ScriptedProber::new([false, true, false, true], true);
    let (mut monitor, handle) = ReachabilityMonitor::new(config(0), Arc::new(prober));

    for _ in 0..4 {
        monitor.check_once().await;
        assert!(handle.current().online);
    }
}

#[tokio::test]
async fn retries_rescue_a_round() {
    // Each round: first attempt fails, the retry succeeds.
    let prober = ScriptedProber::new([false, true, false, true], true);
    let (mut monitor, handle) = ReachabilityMonitor::new(config(1), Arc::new(prober.clone()));

    monitor.check_once().await;
    monitor.check_once().await;
    assert!(handle.current().online);
    assert_eq!(prober.probes(), 4);
}

#[tokio::test]
async fn any_endpoint_answering_is_enough() {
    let prober = ScriptedProber::new([false, true, false, true], false);
    let mut cfg = config(0);
    cfg.endpoints.push("192.0.2.2:53".to_string());
    let (mut monitor, handle) = ReachabilityMonitor::new(cfg, Arc::new(prober));

    monitor.check_once().await;
    monitor.check_once().await;
    assert!(handle.current().online);
}

#[tokio::test]
async fn background_task_publishes_changes() {
    let settings = Settings::default();
    let (handle, task) =
        ReachabilityMonitor::start(&settings, config(0), Arc::new(ScriptedProber::constant(false)));
    let task = task.expect("monitor should start when check_network is on");

    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|state| !state.online))
        .await
        .expect("offline within timeout")
        .unwrap();

    task.abort();
}

#[tokio::test]
async fn disabled_check_reports_online_without_probing() {
    let mut settings = Settings::default();
    settings.startup.check_network = false;
    let prober = ScriptedProber::constant(false);

    let (handle, task) = ReachabilityMonitor::start(&settings, config(0), Arc::new(prober.clone()));
    assert!(task.is_none());

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(handle.current().online);
    assert!(!handle.current().monitored);
    assert_eq!(prober.probes(), 0);
}
