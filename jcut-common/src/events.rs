//! Silence events, rate-change records and telemetry
//!
//! These types cross crate boundaries: classifier events travel from the audio
//! domain to the control domain, and telemetry records leave the engine for
//! whatever the embedding application displays.

use crate::config::StrategyKind;
use crate::time::{MediaTime, RealTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Kind of classifier transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SilenceEventKind {
    SilenceStart,
    SilenceEnd,
}

/// One classifier transition, stamped with pipeline time of the deciding sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceEvent {
    pub kind: SilenceEventKind,
    pub at: RealTime,
}

impl SilenceEvent {
    pub fn start(at: RealTime) -> Self {
        Self { kind: SilenceEventKind::SilenceStart, at }
    }

    pub fn end(at: RealTime) -> Self {
        Self { kind: SilenceEventKind::SilenceEnd, at }
    }
}

/// Controller state: whether the playhead is in sounded or silent content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Sounded,
    Silence,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Sounded => write!(f, "sounded"),
            PlaybackState::Silence => write!(f, "silence"),
        }
    }
}

/// Which configured speed a rate change applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedName {
    Sounded,
    Silence,
}

/// Last rate change applied to the element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateChange {
    pub at: RealTime,
    pub value: f64,
    pub name: SpeedName,
}

/// Running totals of the time-saved accounting
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSavedTotals {
    /// Real time saved compared to playing everything at sounded speed
    pub saved_vs_sounded: TimeDelta,
    /// Real time saved compared to playing everything at intrinsic speed
    pub saved_vs_intrinsic: TimeDelta,
    /// Real time the same content would take at sounded speed
    pub would_have_lasted_if_sounded: TimeDelta,
    /// Real time the same content would take at intrinsic speed
    pub would_have_lasted_if_intrinsic: TimeDelta,
}

/// Ramp of the stretcher delay expressed on the input timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledStretchTelemetry {
    pub start_time: RealTime,
    pub end_time: RealTime,
    pub start_delay: TimeDelta,
    pub end_delay: TimeDelta,
}

/// Snapshot of one attached element, sampled on demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub unix_time: f64,
    pub strategy: StrategyKind,
    pub state: PlaybackState,
    pub intrinsic_time: MediaTime,
    pub element_playback_active: bool,
    pub context_time: RealTime,
    /// Smoothed input volume (RMS, 0..1)
    pub input_volume: f64,
    pub element_rate: f64,
    pub last_rate_change: Option<RateChange>,
    /// `(from, to)` of the last jump over silence
    pub last_silence_skipping_jump: Option<(MediaTime, MediaTime)>,
    /// `(at, to)` of the jump or speed-up currently scheduled
    pub pending_jump: Option<(MediaTime, MediaTime)>,
    pub total_output_delay: TimeDelta,
    pub delay_from_input_to_stretcher_output: TimeDelta,
    pub stretcher_delay: TimeDelta,
    pub last_scheduled_stretch_input_time: Option<ScheduledStretchTelemetry>,
    pub estimated_seek_latency: TimeDelta,
    pub time_saved: TimeSavedTotals,
}
