mod support;

use std::time::Duration;

use caldir_window_core::{FetchDecision, NetworkState};
use support::{harness, june, range, small_window};

#[tokio::test(start_paused = true)]
async fn navigation_storm_keeps_a_single_writer() {
    let h = harness(small_window());
    h.remote.set_latency(Duration::from_millis(40));

    let days = [1, 2, 3, 14, 15, 28, 3, 29, 30, 12, 13];
    for (i, day) in days.into_iter().enumerate() {
        h.mirror.on_visible_date_changed(june(day), false).await;
        let pause = if i % 3 == 0 { 100 } else { 10 };
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }

    assert_eq!(h.mirror.settled().await, NetworkState::Idle);
    assert_eq!(h.store.max_writers(), 1);

    let stats = h.mirror.stats();
    assert_eq!(stats.started, stats.finished());
    assert!(stats.completed >= 1);
    assert!(h.mirror.current_cached_range().is_some());
}

#[tokio::test]
async fn loading_lasts_exactly_as_long_as_the_active_job() {
    let h = harness(small_window());
    h.remote.hold();

    h.mirror.on_visible_date_changed(june(10), false).await;
    h.remote.wait_for_calls(1).await;
    assert_eq!(h.mirror.current_network_state(), NetworkState::Loading);

    h.remote.release();
    assert_eq!(h.mirror.settled().await, NetworkState::Idle);
}

#[tokio::test]
async fn superseded_job_never_leaves_loading_behind() {
    let h = harness(small_window());
    h.remote.hold();

    h.mirror.on_visible_date_changed(june(10), false).await;
    h.remote.wait_for_calls(1).await;
    let jump = h.mirror.on_visible_date_changed(june(30), false).await;
    assert!(matches!(jump, FetchDecision::Fetch { .. }));
    h.remote.wait_for_calls(2).await;

    h.remote.release();
    assert_eq!(h.mirror.settled().await, NetworkState::Idle);
    assert_eq!(h.mirror.current_cached_range(), Some(range(june(25), june(30) + chrono::Days::new(5))));
    assert_eq!(h.store.writes(), 1);
}

#[tokio::test]
async fn superseded_failure_does_not_overwrite_state() {
    let h = harness(small_window());
    h.remote.hold();
    h.remote.fail_with(Some("connection reset"));

    h.mirror.on_visible_date_changed(june(10), false).await;
    h.remote.wait_for_calls(1).await;
    h.mirror.on_visible_date_changed(june(30), false).await;
    h.remote.wait_for_calls(2).await;

    // The first job is cancelled on supersede; only the active one may report.
    h.remote.release();
    h.mirror.settled().await;
    tokio::task::yield_now().await;

    assert_eq!(
        h.mirror.current_network_state(),
        NetworkState::Error("Transport error: connection reset".into())
    );
    let stats = h.mirror.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.cancelled, 1);
}

#[tokio::test]
async fn store_notifications_follow_commits() {
    let h = harness(small_window());
    let events = h.mirror.subscribe_events();
    let mut cached = h.mirror.subscribe_cached_range();

    h.mirror.on_visible_date_changed(june(10), false).await;
    h.mirror.settled().await;

    assert!(events.has_changed().unwrap());
    assert!(cached.has_changed().unwrap());
    assert_eq!(*cached.borrow_and_update(), Some(range(june(5), june(15))));
}
