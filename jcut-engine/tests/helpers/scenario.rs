//! Scenario builders shared by the controller tests

use jcut_common::{AveragingMethod, Settings, StrategyKind};
use jcut_engine::sim::{Segment, SimOptions, SimulatedElement, SimulatedMedia};
use std::sync::Arc;

pub const SAMPLE_RATE: u32 = 8000;

/// Mono element alternating sounded / silent parts, starting sounded
///
/// `parts` lists durations; even indices are sounded, odd indices silent.
pub fn element(parts: &[f64]) -> Arc<SimulatedElement> {
    with_options(parts, SimOptions::default())
}

pub fn with_options(parts: &[f64], options: SimOptions) -> Arc<SimulatedElement> {
    let segments: Vec<Segment> = parts
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { Segment::sounded(*d) } else { Segment::silence(*d) })
        .collect();
    let media = SimulatedMedia::from_segments(SAMPLE_RATE, 1, &segments);
    SimulatedElement::new(media, options)
}

/// Settings with plain additive time-saved totals
pub fn all_time(strategy: StrategyKind) -> Settings {
    Settings {
        strategy,
        time_saved_averaging: AveragingMethod::AllTime,
        ..Settings::default()
    }
}

pub fn cloning() -> Settings {
    all_time(StrategyKind::Cloning)
}

pub fn stretching() -> Settings {
    all_time(StrategyKind::Stretching)
}
