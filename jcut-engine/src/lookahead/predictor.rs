//! Lookahead predictor
//!
//! Plays a muted shadow of the primary's source ahead of the playhead, runs it
//! through its own smoother and classifier, and turns the classifier's events
//! (stamped in pipeline time) into silence ranges on the intrinsic timeline.
//!
//! The shadow runs fast while it is close to the primary and slows down as its
//! lead grows, so prediction does not cost a full-speed decode of the whole
//! source. It never stops: restarting from rate zero is expensive.

use crate::audio::analysis::{AnalysisControls, AnalysisProcessor};
use crate::audio::event_channel::{EventChannel, EventConsumer};
use crate::audio::volume::LOOKAHEAD_SMOOTHING_WINDOW;
use crate::element::{PlaybackElement, ShadowPlayback, Subscription};
use crate::error::{Error, Result};
use crate::lookahead::ranges::{SilenceRange, SilenceRanges};
use crate::lookahead::throttle::Throttle;
use jcut_common::events::{SilenceEvent, SilenceEventKind};
use jcut_common::time::realtime_margin;
use jcut_common::{MediaTime, RealTime, Settings, TimeDelta};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Slowest rate the shadow is ever set to
pub const MIN_SHADOW_RATE: f64 = 2.0;

/// How fast the shadow may run and how far ahead it may get
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateProfile {
    /// Lead (intrinsic seconds) at which the target rate would reach zero
    pub horizon: f64,
    pub max_rate: f64,
}

impl RateProfile {
    pub const UNRESTRICTED: RateProfile = RateProfile { horizon: 180.0, max_rate: 8.0 };
    pub const RESTRICTED: RateProfile = RateProfile { horizon: 20.0, max_rate: 4.0 };

    pub fn for_source(restricted: bool) -> Self {
        if restricted {
            Self::RESTRICTED
        } else {
            Self::UNRESTRICTED
        }
    }

    /// Shadow rate for a given lead over the primary
    pub fn target_rate(&self, lead: f64) -> f64 {
        if !lead.is_finite() {
            return self.max_rate;
        }
        (self.max_rate * (1.0 - lead / self.horizon)).clamp(MIN_SHADOW_RATE, self.max_rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookaheadState {
    /// Shadow created, source still loading
    Initializing,
    Ready,
}

/// What the predictor needs to know about the primary on every poll
#[derive(Debug, Clone, Copy)]
pub struct PrimarySnapshot {
    pub position: MediaTime,
    pub paused: bool,
}

/// Intrinsic time the shadow played between pipeline times `at` and `now`
///
/// `rate_changed` is the last rate change and the rate in force before it. Rate
/// changes are seconds apart, so at most one falls inside a drain interval.
fn played_between(at: RealTime, now: RealTime, rate: f64, rate_changed: Option<(RealTime, f64)>) -> TimeDelta {
    match rate_changed {
        Some((changed_at, previous)) if at < changed_at => {
            (now - changed_at).max(0.0) * rate + (changed_at - at) * previous
        }
        _ => (now - at) * rate,
    }
}

fn unavailable(error: Error) -> Error {
    match error {
        Error::ShadowUnavailable(_) => error,
        other => Error::ShadowUnavailable(other.to_string()),
    }
}

pub struct LookaheadPredictor {
    shadow: Box<dyn ShadowPlayback>,
    processor: Subscription,
    events: EventConsumer<SilenceEvent>,
    scratch: Vec<SilenceEvent>,
    controls: Arc<AnalysisControls>,
    smoothing_delay: TimeDelta,
    ranges: SilenceRanges,
    state: LookaheadState,
    silent: bool,
    /// Intrinsic time the current silence started at, if known
    silence_since: Option<MediaTime>,
    ended_recorded: bool,
    margin_before: f64,
    margin_after: f64,
    profile: RateProfile,
    rate_update: Throttle,
    /// Pipeline time of the last shadow rate change, and the rate before it
    rate_changed: Option<(RealTime, f64)>,
    resync: Throttle,
}

impl LookaheadPredictor {
    /// Create the shadow and start it at the primary's position
    ///
    /// Any failure is reported as [`Error::ShadowUnavailable`].
    pub fn new(element: &dyn PlaybackElement, settings: &Settings, now: RealTime) -> Result<Self> {
        let shadow = element.create_shadow().map_err(unavailable)?;
        let profile = RateProfile::for_source(element.source_restricted());

        let controls = AnalysisControls::new(
            settings.volume_threshold,
            settings.silence_duration_threshold(profile.max_rate),
        );
        let (producer, events) = EventChannel::new(None).split();
        let processor = AnalysisProcessor::classifying(
            LOOKAHEAD_SMOOTHING_WINDOW,
            shadow.sample_rate(),
            Arc::clone(&controls),
            producer,
        );
        let smoothing_delay = processor.smoothing_delay();
        let subscription = shadow.connect_processor(Box::new(processor)).map_err(unavailable)?;

        shadow.set_rate(profile.max_rate).map_err(unavailable)?;
        shadow.set_position(element.position()).map_err(unavailable)?;
        if !element.paused() {
            shadow.play().map_err(unavailable)?;
        }

        let mut resync = Throttle::new(settings.tuning.lookahead_throttle);
        resync.mark(now);

        info!(
            "Lookahead shadow created at {:.3}s (max rate {}x, horizon {}s)",
            element.position(),
            profile.max_rate,
            profile.horizon
        );

        Ok(Self {
            shadow,
            processor: subscription,
            events,
            scratch: Vec::with_capacity(16),
            controls,
            smoothing_delay,
            ranges: SilenceRanges::new(settings.tuning.min_silence_range),
            state: LookaheadState::Initializing,
            silent: false,
            silence_since: None,
            ended_recorded: false,
            margin_before: settings.margin_before,
            margin_after: settings.margin_after,
            profile,
            rate_update: Throttle::new(settings.tuning.lookahead_rate_interval),
            rate_changed: None,
            resync,
        })
    }

    pub fn state(&self) -> LookaheadState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LookaheadState::Ready
    }

    pub fn profile(&self) -> RateProfile {
        self.profile
    }

    pub fn shadow_position(&self) -> MediaTime {
        self.shadow.position()
    }

    pub fn shadow_rate(&self) -> f64 {
        self.shadow.rate()
    }

    pub fn known_ranges(&self) -> usize {
        self.ranges.len()
    }

    /// Advance the predictor: readiness, pause following, events, rate, resync
    pub fn poll(&mut self, now: RealTime, primary: PrimarySnapshot) -> Result<()> {
        if self.state == LookaheadState::Initializing {
            if !self.shadow.ready() {
                return Ok(());
            }
            self.state = LookaheadState::Ready;
            debug!("Lookahead shadow ready");
        }

        if primary.paused && !self.shadow.paused() {
            self.shadow.pause();
        } else if !primary.paused && self.shadow.paused() && !self.shadow.ended() {
            self.shadow.play().map_err(unavailable)?;
        }

        self.drain_events(now);
        self.record_end_of_source();
        self.update_rate(now, primary.position)?;
        self.resync_if_needed(now, primary.position)?;
        Ok(())
    }

    fn drain_events(&mut self, now: RealTime) {
        let mut drained = std::mem::take(&mut self.scratch);
        self.events.drain_into(|event| drained.push(event));
        for event in drained.drain(..) {
            self.on_event(event, now);
        }
        self.scratch = drained;
    }

    /// Intrinsic time of the shadow at pipeline time `at`
    fn intrinsic_at(&self, now: RealTime, at: RealTime) -> MediaTime {
        self.shadow.position() - played_between(at, now, self.shadow.rate(), self.rate_changed)
    }

    fn on_event(&mut self, event: SilenceEvent, now: RealTime) {
        match event.kind {
            SilenceEventKind::SilenceStart => {
                debug_assert!(!self.silent, "shadow silence start while already silent");
                let began = event.at - self.controls.duration_threshold() - self.smoothing_delay;
                let since = self.intrinsic_at(now, began);
                trace!("Shadow silence since {:.3}s", since);
                self.silent = true;
                self.silence_since = Some(since);
            }
            SilenceEventKind::SilenceEnd => {
                self.silent = false;
                let Some(since) = self.silence_since.take() else {
                    return;
                };
                let end = self.intrinsic_at(now, event.at - self.smoothing_delay);
                let (start, end) = (since + self.margin_after, end - self.margin_before);
                if self.ranges.push(start, end) {
                    trace!("Silence range {:.3}..{:.3}", start, end);
                }
            }
        }
    }

    fn record_end_of_source(&mut self) {
        if !self.shadow.ended() {
            self.ended_recorded = false;
            return;
        }
        if self.ended_recorded || !self.silent {
            return;
        }
        self.ended_recorded = true;
        if let (Some(since), Some(duration)) = (self.silence_since, self.shadow.duration()) {
            self.ranges.push(since + self.margin_after, duration);
            debug!("Source ends in silence from {:.3}s", since);
        }
    }

    fn update_rate(&mut self, now: RealTime, primary_position: MediaTime) -> Result<()> {
        if !self.rate_update.try_acquire(now) {
            return Ok(());
        }
        let lead = self.shadow.position() - primary_position;
        let rate = self.profile.target_rate(lead);
        if (rate - self.shadow.rate()).abs() < 1e-9 {
            return Ok(());
        }
        let previous = self.shadow.rate();
        self.shadow.set_rate(rate).map_err(unavailable)?;
        self.rate_changed = Some((now, previous));
        self.controls
            .set_duration_threshold(realtime_margin(self.margin_after + self.margin_before, rate));
        debug!("Shadow lead {:.1}s, rate now {:.2}x", lead, rate);
        Ok(())
    }

    fn resync_if_needed(&mut self, now: RealTime, primary_position: MediaTime) -> Result<()> {
        if self.shadow.played_contains(primary_position) || !self.resync.try_acquire(now) {
            return Ok(());
        }
        self.shadow.set_position(primary_position).map_err(unavailable)?;
        self.rate_changed = None;
        self.silence_since = self.silent.then_some(primary_position);
        self.ended_recorded = false;
        debug!("Primary entered unprocessed territory, shadow resynced to {:.3}s", primary_position);
        Ok(())
    }

    /// Range still open while the shadow is inside silence
    fn pending_range(&self) -> Option<SilenceRange> {
        if !self.silent || self.shadow.ended() {
            return None;
        }
        let since = self.silence_since?;
        let known_until = self.shadow.position() - self.smoothing_delay * self.shadow.rate();
        let end = known_until - self.margin_before;
        let start = since + self.margin_after;
        (end > start).then(|| SilenceRange::pending(start, end))
    }

    /// Closest predicted range ending strictly after `time`; none until ready
    pub fn next_silence_range(&self, time: MediaTime) -> Option<SilenceRange> {
        if !self.is_ready() {
            return None;
        }
        self.ranges.next_after(time, self.pending_range())
    }

    /// Stop the shadow and disconnect its pipeline
    pub fn destroy(mut self) {
        self.shadow.pause();
        self.processor.release();
        debug!("Lookahead destroyed ({} ranges known)", self.ranges.len());
    }
}

impl Drop for LookaheadPredictor {
    fn drop(&mut self) {
        self.shadow.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_falls_with_lead() {
        let profile = RateProfile::UNRESTRICTED;
        assert_eq!(profile.target_rate(0.0), 8.0);
        assert!((profile.target_rate(90.0) - 4.0).abs() < 1e-12);
        assert_eq!(profile.target_rate(170.0), MIN_SHADOW_RATE);
        assert_eq!(profile.target_rate(-5.0), 8.0);
        assert_eq!(profile.target_rate(f64::NAN), 8.0);
    }

    #[test]
    fn test_played_between_spans_rate_change() {
        // 8x until 10.0, 4x after
        let changed = Some((10.0, 8.0));
        assert!((played_between(10.5, 11.0, 4.0, changed) - 2.0).abs() < 1e-12);
        assert!((played_between(9.5, 11.0, 4.0, changed) - 8.0).abs() < 1e-12);
        assert!((played_between(9.5, 11.0, 4.0, None) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_restricted_profile_is_shorter() {
        let profile = RateProfile::for_source(true);
        assert_eq!(profile, RateProfile::RESTRICTED);
        assert!((profile.target_rate(10.0) - 2.0).abs() < 1e-12);
    }
}
