//! State shared by every strategy of one attachment
//!
//! Owns the element handle, the settings in force, the playback state machine,
//! and the two estimators. Every rate change goes through [`ControlCore::apply_speed`]
//! so the time-saved accounting and the telemetry see it.

use crate::context::EngineContext;
use crate::element::PlaybackElement;
use crate::seek_estimator::SeekLatencyEstimator;
use crate::time_saved::TimeSavedAccumulator;
use jcut_common::events::{PlaybackState, RateChange, SpeedName};
use jcut_common::{RealTime, Settings};
use std::sync::Arc;
use tracing::{trace, warn};

pub struct ControlCore {
    pub element: Arc<dyn PlaybackElement>,
    pub ctx: EngineContext,
    pub settings: Settings,
    pub time_saved: TimeSavedAccumulator,
    pub seek_estimator: SeekLatencyEstimator,
    state: PlaybackState,
    last_transition_at: RealTime,
    last_applied_rate: f64,
    last_rate_change: Option<RateChange>,
}

impl ControlCore {
    pub fn new(element: Arc<dyn PlaybackElement>, settings: Settings, ctx: EngineContext) -> Self {
        let now = ctx.clock.now();
        let rate = element.rate();
        let time_saved = TimeSavedAccumulator::new(&settings, rate, now, element.paused());
        let seek_estimator =
            SeekLatencyEstimator::new(settings.tuning.seek_history_len, settings.tuning.default_seek_latency);
        Self {
            element,
            ctx,
            settings,
            time_saved,
            seek_estimator,
            state: PlaybackState::Sounded,
            last_transition_at: now,
            last_applied_rate: rate,
            last_rate_change: None,
        }
    }

    pub fn now(&self) -> RealTime {
        self.ctx.clock.now()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn last_transition_at(&self) -> RealTime {
        self.last_transition_at
    }

    pub fn last_applied_rate(&self) -> f64 {
        self.last_applied_rate
    }

    pub fn last_rate_change(&self) -> Option<RateChange> {
        self.last_rate_change
    }

    pub fn speed(&self, name: SpeedName) -> f64 {
        match name {
            SpeedName::Sounded => self.settings.sounded_speed,
            SpeedName::Silence => self.settings.silence_speed,
        }
    }

    /// Set the element to the configured speed `name`, returning when the switch was made
    pub fn apply_speed(&mut self, name: SpeedName) -> RealTime {
        let value = self.speed(name);
        let now = self.now();
        if let Err(e) = self.element.set_rate(value) {
            warn!("Element rejected rate {}: {}", value, e);
            return now;
        }
        self.time_saved.on_rate_change(now, value);
        self.last_applied_rate = value;
        self.last_rate_change = Some(RateChange { at: now, value, name });
        trace!("Rate {:?} = {}x", name, value);
        now
    }

    /// Move the state machine; repeated transitions to the same state are ignored
    pub fn transition(&mut self, state: PlaybackState) {
        if state != self.state {
            self.state = state;
            self.last_transition_at = self.now();
        }
    }

    /// Back to sounded speed and state, used after faults and by the fallback strategy
    pub fn reset_to_sounded(&mut self) {
        self.transition(PlaybackState::Sounded);
        self.apply_speed(SpeedName::Sounded);
    }

    /// Replace settings in force, closing the time-saved snippet under the old ones
    ///
    /// Returns the settings that were replaced.
    pub fn replace_settings(&mut self, settings: Settings) -> Settings {
        let now = self.now();
        self.time_saved.update_settings(now, &settings);
        std::mem::replace(&mut self.settings, settings)
    }
}
