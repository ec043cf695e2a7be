//! Cloning strategy
//!
//! A lookahead shadow predicts silence ranges ahead of the playhead. On every
//! position update the next range is looked up and an action is scheduled for
//! the moment the playhead reaches it. When the action fires, [`decide`] picks
//! between jumping over the range, playing it at silence speed, or leaving it.
//!
//! A fired action is dropped if the playhead is no longer where it was expected
//! to be (manual seek) or the element is paused.

use crate::audio::analysis::{AnalysisControls, AnalysisProcessor};
use crate::audio::volume::LOOKAHEAD_SMOOTHING_WINDOW;
use crate::controller::core::ControlCore;
use crate::controller::decision::{decide, DecisionInput, SkipDecision};
use crate::controller::teardown::TeardownList;
use crate::controller::timers::{TimerId, TimerQueue};
use crate::controller::SettingsOutcome;
use crate::element::ElementEvent;
use crate::error::Result;
use crate::lookahead::{LookaheadPredictor, PrimarySnapshot, SilenceRange, Throttle};
use jcut_common::events::{PlaybackState, SpeedName, TelemetryRecord};
use jcut_common::{MediaTime, RealTime, Settings};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy)]
enum CloningAction {
    /// Act on `range`; the playhead should be at `expected_position` by then
    Skip { expected_position: MediaTime, range: SilenceRange },
    /// End of a temporary speed-up
    ResetSpeed,
}

#[derive(Debug, Clone, Copy)]
struct JumpInFlight {
    from: MediaTime,
    to: MediaTime,
    started_at: RealTime,
}

fn lookahead_inputs_changed(previous: &Settings, settings: &Settings) -> bool {
    previous.volume_threshold != settings.volume_threshold
        || previous.margin_before != settings.margin_before
        || previous.margin_after != settings.margin_after
        || previous.tuning != settings.tuning
}

pub struct CloningStrategy {
    lookahead: Option<LookaheadPredictor>,
    recreate: Throttle,
    timers: TimerQueue<CloningAction>,
    scheduled_skip: Option<(TimerId, SilenceRange)>,
    reset_timer: Option<TimerId>,
    jump_in_flight: Option<JumpInFlight>,
    last_jump: Option<(MediaTime, MediaTime)>,
    switches_since_jump: u32,
    meter: Option<Arc<AnalysisControls>>,
    teardown: TeardownList,
}

impl CloningStrategy {
    pub fn new(core: &mut ControlCore) -> Result<Self> {
        let now = core.now();
        let lookahead = LookaheadPredictor::new(core.element.as_ref(), &core.settings, now)?;

        // Volume telemetry only; a restricted source cannot be metered
        let mut teardown = TeardownList::new();
        let mut meter = None;
        if !core.element.source_restricted() {
            let controls = AnalysisControls::new(core.settings.volume_threshold, 0.0);
            let processor = AnalysisProcessor::meter(
                LOOKAHEAD_SMOOTHING_WINDOW,
                core.element.sample_rate(),
                Arc::clone(&controls),
            );
            teardown.push(core.element.connect_processor(Box::new(processor))?);
            meter = Some(controls);
        }

        let mut recreate = Throttle::new(core.settings.tuning.lookahead_throttle);
        recreate.mark(now);
        core.reset_to_sounded();
        info!(
            "Cloning strategy: {}x sounded, {}x silence, desync correction {}",
            core.settings.sounded_speed,
            core.settings.silence_speed,
            core.settings.enable_desync_correction
        );

        Ok(Self {
            lookahead: Some(lookahead),
            recreate,
            timers: TimerQueue::new(),
            scheduled_skip: None,
            reset_timer: None,
            jump_in_flight: None,
            last_jump: None,
            switches_since_jump: 0,
            meter,
            teardown,
        })
    }

    /// Ready once the shadow has loaded; a lookahead waiting for re-creation does not block
    pub fn is_ready(&self) -> bool {
        self.lookahead.as_ref().map_or(true, |l| l.is_ready())
    }

    pub fn lookahead(&self) -> Option<&LookaheadPredictor> {
        self.lookahead.as_ref()
    }

    pub fn tick(&mut self, core: &mut ControlCore) -> Result<()> {
        let now = core.now();

        if self.lookahead.is_none() && self.recreate.try_acquire(now) {
            self.lookahead = Some(LookaheadPredictor::new(core.element.as_ref(), &core.settings, now)?);
        }
        if let Some(lookahead) = self.lookahead.as_mut() {
            let primary = PrimarySnapshot {
                position: core.element.position(),
                paused: core.element.paused(),
            };
            lookahead.poll(now, primary)?;
        }

        while let Some((id, action)) = self.timers.pop_due(now) {
            match action {
                CloningAction::Skip { expected_position, range } => {
                    if self.scheduled_skip.map(|(scheduled, _)| scheduled) == Some(id) {
                        self.scheduled_skip = None;
                    }
                    self.fire_skip(core, expected_position, range);
                }
                CloningAction::ResetSpeed => {
                    self.reset_timer = None;
                    if core.state() == PlaybackState::Silence {
                        core.apply_speed(SpeedName::Sounded);
                        core.transition(PlaybackState::Sounded);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn on_element_event(&mut self, core: &mut ControlCore, event: &ElementEvent) -> Result<()> {
        match event {
            ElementEvent::PositionAdvanced { position } => {
                if self.jump_in_flight.is_some() {
                    self.complete_jump(core);
                }
                self.schedule_next(core, *position);
            }
            ElementEvent::SeekCompleted => {
                if self.jump_in_flight.is_some() {
                    self.complete_jump(core);
                }
            }
            ElementEvent::SeekStarted | ElementEvent::Paused | ElementEvent::Ended => {
                if self.jump_in_flight.is_none() {
                    self.cancel_scheduled_skip();
                }
            }
            ElementEvent::SourceChanged => {
                self.drop_lookahead();
                self.timers.cancel_all();
                self.scheduled_skip = None;
                self.reset_timer = None;
                if self.jump_in_flight.take().is_some() {
                    core.time_saved.on_resumed(core.now());
                }
                if core.state() == PlaybackState::Silence {
                    core.reset_to_sounded();
                }
                debug!("Source changed, lookahead re-created once the throttle allows");
            }
            ElementEvent::Resumed => {}
        }
        Ok(())
    }

    fn drop_lookahead(&mut self) {
        if let Some(lookahead) = self.lookahead.take() {
            lookahead.destroy();
        }
    }

    fn cancel_scheduled_skip(&mut self) {
        if let Some((id, _)) = self.scheduled_skip.take() {
            self.timers.cancel(id);
        }
    }

    /// Look up the next range and schedule acting on it
    fn schedule_next(&mut self, core: &mut ControlCore, position: MediaTime) {
        if core.state() == PlaybackState::Silence || self.jump_in_flight.is_some() || core.element.paused() {
            return;
        }
        let Some(range) = self.lookahead.as_ref().and_then(|l| l.next_silence_range(position)) else {
            self.cancel_scheduled_skip();
            return;
        };

        let seek_at = range.start.max(position);
        let delay = (seek_at - position) / core.settings.sounded_speed;
        self.cancel_scheduled_skip();
        let id = self.timers.schedule(
            core.now() + delay,
            CloningAction::Skip { expected_position: seek_at, range },
        );
        self.scheduled_skip = Some((id, range));
    }

    fn fire_skip(&mut self, core: &mut ControlCore, expected_position: MediaTime, range: SilenceRange) {
        let position = core.element.position();
        if core.element.paused() {
            trace!("Skip dropped, element paused");
            return;
        }
        if (position - expected_position).abs() > core.settings.tuning.seek_cancel_tolerance {
            debug!(
                "Skip dropped, playhead at {:.3}s instead of {:.3}s",
                position, expected_position
            );
            return;
        }

        let seek_amount = range.end - position;
        let input = DecisionInput::new(
            &core.settings,
            seek_amount,
            core.seek_estimator.next_estimate(),
            self.switches_since_jump,
        );
        match decide(&input) {
            SkipDecision::Jump { forced_by_desync } => self.jump(core, position, range.end, forced_by_desync),
            SkipDecision::SpeedUp { real_duration } => {
                core.apply_speed(SpeedName::Silence);
                core.transition(PlaybackState::Silence);
                self.switches_since_jump += 1;
                self.reset_timer = Some(self.timers.schedule(core.now() + real_duration, CloningAction::ResetSpeed));
                trace!("Speed-up over {:.3}..{:.3} for {:.3}s", position, range.end, real_duration);
            }
            SkipDecision::Nothing => {
                trace!("Silence {:.3}..{:.3} too short to act on", position, range.end);
            }
        }
    }

    fn jump(&mut self, core: &mut ControlCore, from: MediaTime, to: MediaTime, forced_by_desync: bool) {
        let now = core.now();
        if let Err(e) = core.element.set_position(to) {
            warn!("Jump to {:.3}s rejected: {}", to, e);
            return;
        }
        // Stopwatch held until the seek completes; the jump is accounted for as a whole
        core.time_saved.on_paused(now);
        self.jump_in_flight = Some(JumpInFlight { from, to, started_at: now });
        self.last_jump = Some((from, to));
        self.switches_since_jump = 0;
        info!(
            "Jump {:.3}s -> {:.3}s{}",
            from,
            to,
            if forced_by_desync { " (desync correction)" } else { "" }
        );
    }

    fn complete_jump(&mut self, core: &mut ControlCore) {
        let Some(jump) = self.jump_in_flight.take() else {
            return;
        };
        let now = core.now();
        let latency = now - jump.started_at;
        core.time_saved.on_jump(now, jump.to - jump.from, latency);
        if !core.element.paused() {
            core.time_saved.on_resumed(now);
        }
    }

    pub fn update_settings(&mut self, core: &mut ControlCore, previous: &Settings) -> Result<SettingsOutcome> {
        if lookahead_inputs_changed(previous, &core.settings) {
            self.drop_lookahead();
            debug!("Lookahead inputs changed, re-creating shadow");
        }
        if let Some(meter) = self.meter.as_ref() {
            meter.set_volume_threshold(core.settings.volume_threshold);
        }

        // Scheduled times depend on the speeds
        self.cancel_scheduled_skip();
        let name = match core.state() {
            PlaybackState::Sounded => SpeedName::Sounded,
            PlaybackState::Silence => SpeedName::Silence,
        };
        core.apply_speed(name);
        Ok(SettingsOutcome::Applied)
    }

    pub fn fill_telemetry(&self, _core: &ControlCore, record: &mut TelemetryRecord) {
        if let Some(meter) = self.meter.as_ref() {
            record.input_volume = meter.volume();
        }
        record.last_silence_skipping_jump = self.last_jump;
        record.pending_jump = self
            .jump_in_flight
            .map(|j| (j.from, j.to))
            .or_else(|| self.scheduled_skip.map(|(_, r)| (r.start, r.end)));
    }

    pub fn destroy(mut self, core: &mut ControlCore) {
        let cancelled = self.timers.cancel_all();
        self.drop_lookahead();
        self.teardown.release_all();
        if self.jump_in_flight.take().is_some() {
            core.time_saved.on_resumed(core.now());
        }
        debug!("Cloning strategy destroyed ({} timer(s) cancelled)", cancelled);
    }
}
