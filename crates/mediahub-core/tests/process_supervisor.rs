//! Process supervisor sequencing tests over the fake host.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io;
use std::time::Duration;

use mediahub_core::error::Error;
use mediahub_core::supervisor::{LaunchErrorKind, PresentedTarget, ResolvedMethod};
use mediahub_test_utils::{fixture_settings, ProcessEvent, TestContext, FAKE_HUB_URL};

fn launch_kind(err: Error) -> LaunchErrorKind {
    match err {
        Error::Launch(e) => e.kind,
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn browser_launch_passes_flags_and_url() {
    let ctx = TestContext::new();
    let info = ctx.supervisor.launch("yt").await.unwrap();

    assert_eq!(info.target, PresentedTarget::App("yt".into()));
    assert_eq!(info.method, ResolvedMethod::Browser);

    let spawned = ctx.host.spawned();
    assert_eq!(spawned.len(), 1);
    assert!(spawned[0].program.ends_with("chromium"));
    assert!(spawned[0].args.contains(&"--kiosk".to_string()));
    assert_eq!(spawned[0].target(), Some("https://www.youtube.com/tv"));
}

#[tokio::test]
async fn previous_process_is_gone_before_next_spawn() {
    let ctx = TestContext::new();
    let first = ctx.supervisor.launch("yt").await.unwrap();
    let second = ctx.supervisor.launch("web").await.unwrap();
    let (first, second) = (first.pid.unwrap(), second.pid.unwrap());

    let events = ctx.host.events();
    let exited_at = events
        .iter()
        .position(|e| matches!(e, ProcessEvent::Exited { pid } if *pid == first))
        .expect("first process exited");
    let spawned_at = events
        .iter()
        .position(|e| matches!(e, ProcessEvent::Spawned { pid, .. } if *pid == second))
        .expect("second process spawned");
    assert!(exited_at < spawned_at, "events: {events:?}");
    assert_eq!(ctx.host.alive(), vec![second]);
}

#[tokio::test]
async fn stubborn_process_is_killed_after_grace() {
    let ctx = TestContext::new();
    ctx.host.ignore_interrupts(true);
    let first = ctx.supervisor.launch("yt").await.unwrap().pid.unwrap();
    ctx.host.ignore_interrupts(false);

    ctx.supervisor.launch("web").await.unwrap();

    let events = ctx.host.events();
    assert!(events.contains(&ProcessEvent::Interrupted { pid: first }));
    assert!(events.contains(&ProcessEvent::Killed { pid: first }));
    assert_eq!(ctx.host.alive().len(), 1);
}

#[tokio::test]
async fn unkillable_process_blocks_next_spawn() {
    let ctx = TestContext::new();
    ctx.host.ignore_interrupts(true);
    let first = ctx.supervisor.launch("yt").await.unwrap().pid.unwrap();
    ctx.host.fail_kills(true);

    let err = ctx.supervisor.launch("web").await.unwrap_err();
    assert_eq!(launch_kind(err), LaunchErrorKind::TerminateFailed);

    assert_eq!(ctx.host.alive(), vec![first]);
    assert_eq!(ctx.host.spawned().len(), 1);
    let status = ctx.supervisor.status().await.unwrap();
    assert_eq!(status.pid, Some(first));
    assert_eq!(status.target, PresentedTarget::App("yt".into()));

    // Once the kill works again the slot is usable.
    ctx.host.fail_kills(false);
    let next = ctx.supervisor.launch("web").await.unwrap().pid.unwrap();
    assert!(ctx.host.events().contains(&ProcessEvent::Killed { pid: first }));
    assert_eq!(ctx.host.alive(), vec![next]);
}

#[tokio::test]
async fn close_reports_unkillable_process() {
    let ctx = TestContext::new();
    ctx.host.ignore_interrupts(true);
    let first = ctx.supervisor.launch("yt").await.unwrap().pid.unwrap();
    ctx.host.fail_kills(true);

    let err = ctx.supervisor.close().await.unwrap_err();
    assert_eq!(launch_kind(err), LaunchErrorKind::TerminateFailed);
    assert_eq!(ctx.supervisor.status().await.unwrap().pid, Some(first));
}

#[tokio::test]
async fn concurrent_launches_leave_one_process() {
    let ctx = TestContext::new();
    let a = ctx.supervisor.clone();
    let b = ctx.supervisor.clone();

    let (ra, rb) = tokio::join!(a.launch("yt"), b.launch("web"));
    ra.unwrap();
    rb.unwrap();

    assert_eq!(ctx.host.alive().len(), 1);
    let status = ctx.supervisor.status().await.unwrap();
    assert_eq!(Some(status.pid.unwrap()), ctx.host.alive().first().copied());
}

#[tokio::test]
async fn unknown_and_disabled_apps_change_nothing() {
    let ctx = TestContext::new();
    ctx.supervisor.launch("yt").await.unwrap();
    let before = ctx.host.events();

    assert!(matches!(
        ctx.supervisor.launch("nope").await.unwrap_err(),
        Error::UnknownApp(key) if key == "nope"
    ));
    assert!(matches!(
        ctx.supervisor.launch("off").await.unwrap_err(),
        Error::AppDisabled(key) if key == "off"
    ));

    assert_eq!(ctx.host.events(), before);
    assert!(ctx.supervisor.status().await.is_some());
}

#[tokio::test]
async fn native_without_viewer_falls_back_to_browser() {
    let ctx = TestContext::new();
    let info = ctx.supervisor.launch("jellyfin").await.unwrap();
    assert_eq!(info.method, ResolvedMethod::Browser);
    assert_eq!(ctx.host.spawned()[0].target(), Some("http://jellyfin.local:8096"));
}

#[tokio::test]
async fn native_viewer_is_used_when_installed() {
    let ctx = TestContext::new();
    ctx.host.install("jellyfin-media-player");

    let info = ctx.supervisor.launch("jellyfin").await.unwrap();
    assert_eq!(info.method, ResolvedMethod::Native);

    let command = &ctx.host.spawned()[0];
    assert!(command.program.ends_with("jellyfin-media-player"));
    assert!(command.args.contains(&"--fullscreen".to_string()));
}

#[tokio::test]
async fn auto_prefers_native_only_when_asked() {
    let ctx = TestContext::new();
    ctx.host.install("spotify");

    assert_eq!(
        ctx.supervisor.launch("spotify").await.unwrap().method,
        ResolvedMethod::Native
    );
    assert_eq!(
        ctx.supervisor.launch("web").await.unwrap().method,
        ResolvedMethod::Browser
    );
}

#[tokio::test]
async fn bad_target_terminates_previous_and_leaves_slot_empty() {
    let ctx = TestContext::new();
    let first = ctx.supervisor.launch("yt").await.unwrap().pid.unwrap();

    let err = ctx.supervisor.launch("broken").await.unwrap_err();
    assert_eq!(launch_kind(err), LaunchErrorKind::BadTarget);

    assert!(ctx.supervisor.status().await.is_none());
    assert!(ctx.host.alive().is_empty());
    assert!(ctx.host.events().contains(&ProcessEvent::Exited { pid: first }));
}

#[tokio::test]
async fn missing_browser_is_reported() {
    let ctx = TestContext::new();
    ctx.host.uninstall("chromium");

    let err = ctx.supervisor.launch("yt").await.unwrap_err();
    assert_eq!(launch_kind(err), LaunchErrorKind::BinaryMissing);
    assert!(ctx.supervisor.status().await.is_none());
}

#[tokio::test]
async fn spawn_failure_leaves_slot_empty() {
    let ctx = TestContext::new();
    ctx.supervisor.launch("yt").await.unwrap();
    ctx.host.fail_spawns(io::ErrorKind::PermissionDenied);

    let err = ctx.supervisor.launch("web").await.unwrap_err();
    assert_eq!(launch_kind(err), LaunchErrorKind::SpawnFailed);
    assert!(ctx.supervisor.status().await.is_none());
    assert!(ctx.host.alive().is_empty());
}

#[tokio::test]
async fn watcher_returns_to_hub_after_app_exits() {
    let ctx = TestContext::new();
    let watcher = ctx.supervisor.spawn_watcher();
    let pid = ctx.supervisor.launch("yt").await.unwrap().pid.unwrap();

    ctx.host.exit_process(pid);

    let hub = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(info) = ctx.supervisor.status().await {
                if info.target == PresentedTarget::Hub {
                    return info;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("hub presented again");

    assert_eq!(ctx.host.spawned().last().unwrap().target(), Some(FAKE_HUB_URL));
    assert_eq!(ctx.host.alive(), vec![hub.pid.unwrap()]);
    watcher.abort();
}

#[tokio::test]
async fn close_terminates_and_stops_return_to_hub() {
    let ctx = TestContext::new();
    let pid = ctx.supervisor.launch("yt").await.unwrap().pid.unwrap();

    let closed = ctx.supervisor.close().await.unwrap().unwrap();
    assert_eq!(closed.pid, Some(pid));
    assert!(ctx.supervisor.is_closed());
    assert!(ctx.host.alive().is_empty());

    assert!(ctx.supervisor.reap_exited().await.is_none());
    assert!(ctx.supervisor.status().await.is_none());
}

#[tokio::test]
async fn self_exit_is_reaped() {
    let mut config = mediahub_test_utils::supervisor_config();
    config.hub_url = None;
    let ctx = TestContext::build(
        fixture_settings(),
        mediahub_test_utils::FakeCecAdapter::new(),
        config,
    );
    let pid = ctx.supervisor.launch("yt").await.unwrap().pid.unwrap();

    ctx.host.exit_process(pid);
    assert_eq!(
        ctx.supervisor.reap_exited().await,
        Some(PresentedTarget::App("yt".into()))
    );
    assert!(ctx.supervisor.status().await.is_none());
    assert_eq!(ctx.host.spawned().len(), 1);
}

#[tokio::test]
async fn hub_exit_empties_slot_without_respawn() {
    let ctx = TestContext::new();
    let pid = ctx.supervisor.present_hub().await.unwrap().pid.unwrap();
    let spawned = ctx.host.spawned().len();

    ctx.host.exit_process(pid);
    assert_eq!(ctx.supervisor.reap_exited().await, Some(PresentedTarget::Hub));

    assert!(ctx.supervisor.status().await.is_none());
    assert!(ctx.host.alive().is_empty());
    assert_eq!(ctx.host.spawned().len(), spawned);
    assert!(!ctx.supervisor.is_closed());

    let next = ctx.supervisor.launch("yt").await.unwrap();
    assert_eq!(next.target, PresentedTarget::App("yt".into()));
}

#[tokio::test]
async fn present_hub_replaces_app() {
    let ctx = TestContext::new();
    ctx.supervisor.launch("yt").await.unwrap();

    let hub = ctx.supervisor.present_hub().await.unwrap();
    assert_eq!(hub.target, PresentedTarget::Hub);
    assert_eq!(ctx.host.alive(), vec![hub.pid.unwrap()]);
}
