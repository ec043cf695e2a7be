//! Silence prediction ahead of the playhead

pub mod predictor;
pub mod ranges;
pub mod throttle;

pub use predictor::{LookaheadPredictor, LookaheadState, PrimarySnapshot, RateProfile};
pub use ranges::{SilenceRange, SilenceRanges};
pub use throttle::Throttle;
