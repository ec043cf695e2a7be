//! Time-Saved Accounting Tests
//!
//! **Test Coverage:**
//! - All-time totals are additive over snippets
//! - Jumps are credited as intrinsic distance minus seek latency
//! - Exponential averaging forgets old savings
//! - Seek latency estimation feeds the decision

use jcut_common::{AveragingMethod, Settings};
use jcut_engine::seek_estimator::SeekLatencyEstimator;
use jcut_engine::TimeSavedAccumulator;

fn settings(method: AveragingMethod) -> Settings {
    Settings {
        time_saved_averaging: method,
        ..Settings::default()
    }
}

#[test]
fn test_all_time_totals_are_additive() {
    let settings = settings(AveragingMethod::AllTime);

    let mut combined = TimeSavedAccumulator::new(&settings, 2.5, 0.0, false);
    combined.on_rate_change(4.0, 1.0);
    let combined = combined.totals(10.0);

    let mut first = TimeSavedAccumulator::new(&settings, 2.5, 0.0, false);
    first.append_pending_snippet(4.0);
    let first = first.closed_totals();
    let second = TimeSavedAccumulator::new(&settings, 1.0, 4.0, false).totals(10.0);

    assert!((combined.saved_vs_sounded - (first.saved_vs_sounded + second.saved_vs_sounded)).abs() < 1e-9);
    assert!(
        (combined.would_have_lasted_if_intrinsic
            - (first.would_have_lasted_if_intrinsic + second.would_have_lasted_if_intrinsic))
            .abs()
            < 1e-9
    );
    // 4s at 2.5x saves 6s, 6s at 1x saves nothing
    assert!((combined.saved_vs_sounded - 6.0).abs() < 1e-9);
}

#[test]
fn test_jump_credits_distance_minus_latency() {
    let mut acc = TimeSavedAccumulator::new(&settings(AveragingMethod::AllTime), 1.0, 0.0, false);
    acc.append_pending_snippet(0.0);
    let before = acc.closed_totals();

    acc.on_jump(0.0, 5.0, 0.15);
    let after = acc.closed_totals();

    assert!((after.would_have_lasted_if_sounded - before.would_have_lasted_if_sounded - 5.0).abs() < 1e-9);
    assert!((after.saved_vs_sounded - before.saved_vs_sounded - 4.85).abs() < 1e-9);
    assert!((after.saved_vs_intrinsic - before.saved_vs_intrinsic - 4.85).abs() < 1e-9);
}

#[test]
fn test_exponential_average_decays_to_zero() {
    let mut acc = TimeSavedAccumulator::new(&settings(AveragingMethod::Exponential), 2.5, 0.0, false);
    acc.on_rate_change(60.0, 1.0);
    let before = acc.totals(60.0);
    assert!(before.saved_vs_sounded > 0.0);

    let after = acc.totals(5060.0);
    assert!(after.saved_vs_sounded >= 0.0);
    assert!(after.saved_vs_sounded < before.saved_vs_sounded * 1e-6);
    assert!(after.would_have_lasted_if_sounded > after.saved_vs_sounded);
}

#[test]
fn test_sounded_speed_change_splits_snippet() {
    let mut acc = TimeSavedAccumulator::new(&settings(AveragingMethod::AllTime), 2.0, 0.0, false);
    acc.on_sounded_speed_change(10.0, 2.0);
    let totals = acc.totals(10.0);
    // 10s at 2x against a sounded speed of 1x
    assert!((totals.saved_vs_sounded - 10.0).abs() < 1e-9);

    let totals = acc.totals(20.0);
    // next 10s at 2x against a sounded speed of 2x saves nothing more
    assert!((totals.saved_vs_sounded - 10.0).abs() < 1e-9);
}

#[test]
fn test_seek_estimator_averages_recent_seeks() {
    let mut estimator = SeekLatencyEstimator::new(5, 0.15);
    assert!((estimator.next_estimate() - 0.15).abs() < 1e-12);

    estimator.on_seek_started(1.0);
    estimator.on_seek_completed(1.1);
    estimator.on_seek_started(2.0);
    estimator.on_seek_completed(2.3);
    // The default stays in the history until pushed out
    let expected = (0.15 + 0.1 + 0.3) / 3.0;
    assert!((estimator.next_estimate() - expected).abs() < 1e-9);

    // Completion without a start is ignored
    estimator.on_seek_completed(5.0);
    assert!((estimator.next_estimate() - expected).abs() < 1e-9);
}
