//! Cloning Strategy Integration Tests
//!
//! Drives the cloning controller against a simulated element whose shadow
//! plays ahead at up to 8x.
//!
//! **Test Coverage:**
//! - Long silence is jumped over, within the seek tolerance
//! - Short silence is left alone
//! - Medium silence (cheaper to play fast than to seek) is sped through
//! - User seek past a predicted silence cancels the skip
//! - Lookahead query contract
//! - Downgrade to always-sounded when no shadow can be created

mod helpers;

use helpers::scenario;
use jcut_common::events::PlaybackState;
use jcut_common::{StrategyKind, Tuning};
use jcut_engine::controller::ActiveStrategy;
use jcut_engine::lookahead::LookaheadPredictor;
use jcut_engine::sim::{SimOptions, SimulationRun};
use jcut_engine::PlaybackElement;

fn lookahead(run: &SimulationRun) -> &LookaheadPredictor {
    match run.controller().strategy() {
        Some(ActiveStrategy::Cloning(cloning)) => cloning.lookahead().expect("lookahead present"),
        _ => panic!("cloning strategy not active"),
    }
}

#[test]
fn test_long_silence_is_jumped() {
    let element = scenario::element(&[2.0, 5.0, 2.0]);
    let mut run = SimulationRun::attach(element, scenario::cloning());
    assert_eq!(run.controller().active_strategy(), StrategyKind::Cloning);

    assert!(run.run_until_ended(20.0));
    let telemetry = run.controller().telemetry();
    let (from, to) = telemetry
        .last_silence_skipping_jump
        .expect("the 5 s silence should have been jumped");

    // Jump leaves after the margin after and lands before the sound resumes
    assert!(from > 2.0 && from < 2.5, "jumped from {}", from);
    assert!(to > 6.5 && to <= 7.0, "jumped to {}", to);

    // Whole file took roughly the sounded parts plus margins
    assert!(run.now() < 5.0, "playback took {}s", run.now());

    let totals = run.finish();
    assert!(totals.saved_vs_sounded > 4.0, "saved {}", totals.saved_vs_sounded);
}

#[test]
fn test_short_silence_left_alone() {
    let element = scenario::element(&[2.0, 0.15, 2.0]);
    let mut run = SimulationRun::attach(element.clone(), scenario::cloning());

    let mut max_rate: f64 = 0.0;
    while !element.ended() && run.now() < 10.0 {
        run.step();
        max_rate = max_rate.max(element.rate());
    }

    let telemetry = run.controller().telemetry();
    assert!(telemetry.last_silence_skipping_jump.is_none());
    assert_eq!(max_rate, 1.0);
    assert_eq!(run.controller().state(), PlaybackState::Sounded);
}

#[test]
fn test_medium_silence_is_sped_through() {
    let element = scenario::element(&[2.0, 1.0, 2.0]);
    // Seeking is slow on this element, so playing fast wins
    let settings = jcut_common::Settings {
        tuning: Tuning {
            default_seek_latency: 1.0,
            ..Tuning::default()
        },
        ..scenario::cloning()
    };
    let mut run = SimulationRun::attach(element.clone(), settings);

    let mut max_rate: f64 = 0.0;
    while !element.ended() && run.now() < 10.0 {
        run.step();
        max_rate = max_rate.max(element.rate());
    }

    assert_eq!(max_rate, 2.5);
    let telemetry = run.controller().telemetry();
    assert!(telemetry.last_silence_skipping_jump.is_none());
    assert_eq!(element.rate(), 1.0);
    let change = telemetry.last_rate_change.expect("rate changed");
    assert_eq!(change.value, 1.0);
}

#[test]
fn test_user_seek_past_silence_cancels_skip() {
    let element = scenario::element(&[2.0, 5.0, 2.0]);
    let mut run = SimulationRun::attach(element.clone(), scenario::cloning());

    // Let the shadow find the silence and a skip get scheduled
    run.run_for(1.0);
    assert!(run.controller().telemetry().pending_jump.is_some());

    element.set_position(7.5).unwrap();
    assert!(run.run_until_ended(10.0));
    assert!(run.controller().telemetry().last_silence_skipping_jump.is_none());
}

#[test]
fn test_lookahead_query_contract() {
    let element = scenario::element(&[1.0, 1.0, 1.0, 1.0, 1.0]);
    let mut run = SimulationRun::attach(element, scenario::cloning());

    // Not ready before the shadow has loaded
    assert!(lookahead(&run).next_silence_range(0.0).is_none());

    // Shadow runs at 8x: the whole file is analysed well within a second
    run.run_for(0.8);
    let predictor = lookahead(&run);
    assert!(predictor.is_ready());

    let first = predictor.next_silence_range(0.0).expect("first silence");
    assert!(first.start > 1.0 && first.start < 1.4, "first starts at {}", first.start);
    assert!(first.end > 1.7 && first.end <= 2.0, "first ends at {}", first.end);
    assert!(!first.pending);

    // Query inside a range returns that range; past it, the next one
    let inside = predictor.next_silence_range(first.start + 0.1).expect("same silence");
    assert_eq!(inside, first);
    let second = predictor.next_silence_range(first.end).expect("second silence");
    assert!(second.start > 3.0 && second.end <= 4.0);

    // File ends sounded: nothing after the last silence
    assert!(predictor.next_silence_range(second.end + 0.01).is_none());
}

#[test]
fn test_no_shadow_downgrades_to_always_sounded() {
    let options = SimOptions {
        shadow_support: false,
        ..SimOptions::default()
    };
    let element = scenario::with_options(&[2.0, 5.0, 2.0], options);
    let mut run = SimulationRun::attach(element.clone(), scenario::cloning());

    assert_eq!(run.controller().active_strategy(), StrategyKind::AlwaysSounded);
    assert!(run.run_until_ended(20.0));
    assert!(run.now() > 8.9);
    assert_eq!(element.rate(), 1.0);
}
