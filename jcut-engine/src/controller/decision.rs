//! Jump / speed-up / nothing decision for one predicted silence
//!
//! Pure function of the silence length and the current cost estimates, so the
//! comparisons can be tested without a playback element.

use jcut_common::{Settings, TimeDelta};

/// Shortest speed-up worth applying: about one rendered frame
const MIN_SPEEDUP_FRAME: TimeDelta = 1.0 / 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipDecision {
    /// Seek straight to the end of the silence
    Jump { forced_by_desync: bool },
    /// Play the silence at silence speed for `real_duration` seconds
    SpeedUp { real_duration: TimeDelta },
    Nothing,
}

#[derive(Debug, Clone, Copy)]
pub struct DecisionInput {
    /// Intrinsic seconds between the playhead and the end of the silence
    pub seek_amount: TimeDelta,
    pub sounded_speed: f64,
    pub silence_speed: f64,
    pub expected_seek_latency: TimeDelta,
    pub desync_correction: bool,
    /// Speed switches since the last jump
    pub switches_since_jump: u32,
    pub desync_period: u32,
    pub min_speedup_real_duration: TimeDelta,
}

impl DecisionInput {
    pub fn new(settings: &Settings, seek_amount: TimeDelta, expected_seek_latency: TimeDelta, switches_since_jump: u32) -> Self {
        Self {
            seek_amount,
            sounded_speed: settings.sounded_speed,
            silence_speed: settings.silence_speed,
            expected_seek_latency,
            desync_correction: settings.enable_desync_correction,
            switches_since_jump,
            desync_period: settings.tuning.cloning_desync_period,
            min_speedup_real_duration: settings.tuning.min_speedup_real_duration,
        }
    }
}

pub fn decide(input: &DecisionInput) -> SkipDecision {
    if !(input.seek_amount > 0.0) {
        return SkipDecision::Nothing;
    }
    let expected = input.expected_seek_latency.max(f64::EPSILON);
    let real_left_sounded = input.seek_amount / input.sounded_speed;

    if real_left_sounded > expected {
        return SkipDecision::Jump { forced_by_desync: false };
    }

    // A jump also corrects desync, so a short silence may still earn one once
    // enough speed switches have accumulated
    if input.desync_correction {
        let due = f64::from(input.switches_since_jump) / f64::from(input.desync_period.max(1));
        if due >= 1.0 - real_left_sounded / expected {
            return SkipDecision::Jump { forced_by_desync: true };
        }
    }

    let real_duration = input.seek_amount / input.silence_speed;
    if real_duration <= MIN_SPEEDUP_FRAME.max(input.min_speedup_real_duration) {
        return SkipDecision::Nothing;
    }
    if input.desync_correction {
        // Each switch costs a share of a future desync-correcting jump
        let saved = real_left_sounded - real_duration;
        if saved <= expected / f64::from(input.desync_period.max(1)) {
            return SkipDecision::Nothing;
        }
    }
    SkipDecision::SpeedUp { real_duration }
}
