//! Async Attach / Detach Tests
//!
//! Exercises the controller task behind `attach()`: whole-object settings
//! updates, telemetry sampling, deferred settings while initialising, and
//! teardown restoring the element and releasing the shared sink.

mod helpers;

use helpers::scenario;
use jcut_common::{Settings, StrategyKind};
use jcut_engine::sim::SimulatedElement;
use jcut_engine::{attach, PlaybackElement};
use std::sync::Arc;
use std::time::Duration;

fn always_sounded(sounded_speed: f64) -> Settings {
    Settings {
        sounded_speed,
        ..scenario::all_time(StrategyKind::AlwaysSounded)
    }
}

fn shared(element: &Arc<SimulatedElement>) -> Arc<dyn PlaybackElement> {
    element.clone()
}

#[tokio::test]
async fn test_update_config_and_telemetry() {
    let element = scenario::element(&[10.0]);
    let ctx = element.context();
    let handle = attach(shared(&element), always_sounded(1.5), ctx.clone()).await;

    let telemetry = handle.telemetry().await.unwrap();
    assert_eq!(telemetry.strategy, StrategyKind::AlwaysSounded);
    assert_eq!(telemetry.element_rate, 1.5);

    handle.update_config(always_sounded(2.0)).await.unwrap();
    assert_eq!(element.rate(), 2.0);

    let invalid = Settings {
        volume_threshold: 2.0,
        ..always_sounded(2.0)
    };
    assert!(handle.update_config(invalid).await.is_err());
    assert_eq!(element.rate(), 2.0);

    handle.detach().await.unwrap();
}

#[tokio::test]
async fn test_detach_restores_rate_and_sink() {
    let element = scenario::element(&[10.0]);
    element.set_rate(1.25).unwrap();
    let ctx = element.context();

    let first = attach(shared(&element), always_sounded(2.0), ctx.clone()).await;
    let other = scenario::element(&[10.0]);
    let second = attach(shared(&other), always_sounded(2.0), ctx.clone()).await;
    assert_eq!(ctx.sink.connection_count(), 2);
    assert_eq!(element.rate(), 2.0);

    first.detach().await.unwrap();
    assert_eq!(element.rate(), 1.25);
    assert_eq!(ctx.sink.connection_count(), 1);

    second.detach().await.unwrap();
    assert_eq!(other.rate(), 1.0);
    assert_eq!(ctx.sink.connection_count(), 0);
}

#[tokio::test]
async fn test_time_saved_reported() {
    let element = scenario::element(&[10.0]);
    let ctx = element.context();
    let handle = attach(shared(&element), always_sounded(2.0), ctx).await;

    // Pipeline time only moves when blocks are rendered
    for _ in 0..100 {
        element.render_block();
    }
    let totals = handle.time_saved().await.unwrap();
    let elapsed = 100.0 * element.block_duration();
    assert!((totals.would_have_lasted_if_intrinsic - 2.0 * elapsed).abs() < 1e-6);
    assert!((totals.saved_vs_intrinsic - elapsed).abs() < 1e-6);

    handle.detach().await.unwrap();
}

#[tokio::test]
async fn test_settings_deferred_until_ready() {
    let element = scenario::element(&[10.0]);
    let ctx = element.context();
    let handle = attach(shared(&element), scenario::cloning(), ctx).await;

    // Shadow has not loaded: the update is parked, not applied
    let settings = Settings {
        sounded_speed: 1.5,
        ..scenario::cloning()
    };
    handle.update_config(settings).await.unwrap();
    assert_eq!(element.rate(), 1.0);

    // Render past the shadow's load delay and let the controller tick
    for _ in 0..10 {
        element.render_block();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(element.rate(), 1.5);

    handle.detach().await.unwrap();
    assert_eq!(element.rate(), 1.0);
    assert_eq!(element.live_shadows(), 0);
}

#[tokio::test]
async fn test_dropped_handle_detaches() {
    let element = scenario::element(&[10.0]);
    element.set_rate(0.75).unwrap();
    let ctx = element.context();
    let handle = attach(shared(&element), always_sounded(2.0), ctx.clone()).await;
    assert!(!handle.id().is_nil());
    assert_eq!(element.rate(), 2.0);

    drop(handle);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(element.rate(), 0.75);
    assert_eq!(ctx.sink.connection_count(), 0);
}
