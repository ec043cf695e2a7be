//! Stretch / pitch-correction scheduler
//!
//! The control-domain half of the stretcher. It turns silence transitions into
//! ramps of a compensating delay line and into crossfades between three pitch
//! branches, and ships them to the audio-domain [`StretcherNode`] as
//! [`StretchCommand`]s over a lock-free channel.
//!
//! Both halves apply every command to their own [`StretchTimeline`], so the
//! control side can answer "what is the delay at time t" without asking the
//! audio domain.
//!
//! Timeline of one silent stretch (delays not to scale):
//!
//! ```text
//! input:   sounded | silence ..................... | sounded
//! rate:    sounded |   (threshold) silence speed   | sounded
//! delay:   D ------\__ ramp to 0 (catch up) _______/ ramp back to D (margin before)
//! ```
//!
//! [`StretcherNode`]: crate::stretch::node::StretcherNode

use crate::audio::event_channel::EventProducer;
use crate::stretch::automation::ParamAutomation;
use crate::stretch::pitch_shift::PITCH_SHIFT_WINDOW;
use jcut_common::events::ScheduledStretchTelemetry;
use jcut_common::time::{
    compensating_semitones, realtime_margin, stretch_compression_ratio, stretcher_delay_change,
};
use jcut_common::{RealTime, Settings, TimeDelta};
use tracing::{debug, trace, warn};

/// Length of a branch crossfade (s)
pub const CROSS_FADE_DURATION: f64 = 0.001;

/// Lookahead slack on top of the margin before (s)
const LOOKAHEAD_SLACK: f64 = 0.01;

/// Mix path of the pitch corrector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchBranch {
    Normal,
    SpeedUp,
    SlowDown,
}

impl PitchBranch {
    fn index(self) -> usize {
        match self {
            PitchBranch::Normal => 0,
            PitchBranch::SpeedUp => 1,
            PitchBranch::SlowDown => 2,
        }
    }
}

/// One linear ramp of the stretcher delay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchSchedule {
    pub start_time: RealTime,
    pub end_time: RealTime,
    pub start_delay: TimeDelta,
    pub end_delay: TimeDelta,
    pub branch: PitchBranch,
}

impl StretchSchedule {
    /// Input seconds consumed per output second while the ramp runs
    pub fn compression_ratio(&self) -> f64 {
        stretch_compression_ratio(self.start_delay, self.end_delay, self.start_time, self.end_time)
    }
}

/// When does the sample that entered the pipeline at `input_moment` leave the stretcher?
///
/// Takes the lookahead delay and the stretcher delay into account, not the pitch
/// corrector's. Valid for moments whose answer falls after `last.start_time`.
pub fn map_input_time_to_output_time(
    input_moment: RealTime,
    lookahead_delay: TimeDelta,
    last: &StretchSchedule,
) -> RealTime {
    let after_ramp = input_moment + lookahead_delay + last.end_delay;
    if after_ramp >= last.end_time {
        return after_ramp;
    }
    // Offset from the ramp start had the delay stayed at its start value,
    // then compressed by the ramp
    let unstretched_offset = input_moment + lookahead_delay + last.start_delay - last.start_time;
    last.start_time + unstretched_offset / last.compression_ratio()
}

/// Delay the stretcher holds while sounded content plays
pub fn stretcher_sounded_delay(margin_before: f64, sounded_speed: f64, silence_speed: f64) -> TimeDelta {
    let realtime_margin_before = margin_before / silence_speed;
    stretcher_delay_change(realtime_margin_before, silence_speed, sounded_speed)
}

/// Lookahead needed so a silence end is known before the margin before is heard
pub fn optimal_lookahead_delay(margin_before: f64, sounded_speed: f64, silence_speed: f64) -> TimeDelta {
    margin_before / sounded_speed.max(silence_speed) + LOOKAHEAD_SLACK
}

/// Messages from the scheduler to the audio-domain node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StretchCommand {
    Stretch { schedule: StretchSchedule, semitones: f64 },
    Interrupt { at_delay: TimeDelta, at_time: RealTime, from: PitchBranch },
    ResetDelay { value: TimeDelta, at_time: RealTime },
    SetLookaheadDelay(TimeDelta),
}

/// Automation state shared in shape by both halves of the stretcher
#[derive(Debug, Clone)]
pub struct StretchTimeline {
    delay: ParamAutomation,
    gains: [ParamAutomation; 3],
    lookahead_delay: TimeDelta,
    last_semitones: f64,
}

impl StretchTimeline {
    pub fn new(initial_delay: TimeDelta, lookahead_delay: TimeDelta) -> Self {
        Self {
            delay: ParamAutomation::new(initial_delay),
            gains: [ParamAutomation::new(1.0), ParamAutomation::new(0.0), ParamAutomation::new(0.0)],
            lookahead_delay,
            last_semitones: 0.0,
        }
    }

    fn crossfade(&mut self, to: PitchBranch, at: RealTime, from: PitchBranch) {
        let half = CROSS_FADE_DURATION / 2.0;
        let from_gain = &mut self.gains[from.index()];
        from_gain.set_value_at_time(1.0, at - half);
        from_gain.linear_ramp_to_value_at_time(0.0, at + half);
        let to_gain = &mut self.gains[to.index()];
        to_gain.set_value_at_time(0.0, at - half);
        to_gain.linear_ramp_to_value_at_time(1.0, at + half);
    }

    pub fn apply(&mut self, command: &StretchCommand) {
        match *command {
            StretchCommand::Stretch { schedule, semitones } => {
                self.delay.set_value_at_time(schedule.start_delay, schedule.start_time);
                self.delay.linear_ramp_to_value_at_time(schedule.end_delay, schedule.end_time);
                self.crossfade(schedule.branch, schedule.start_time, PitchBranch::Normal);
                self.crossfade(PitchBranch::Normal, schedule.end_time, schedule.branch);
                self.last_semitones = semitones;
            }
            StretchCommand::Interrupt { at_delay, at_time, from } => {
                self.delay.cancel_scheduled_values(at_time);
                self.delay.linear_ramp_to_value_at_time(at_delay, at_time);
                for gain in self.gains.iter_mut() {
                    gain.cancel_scheduled_values(at_time);
                }
                self.crossfade(PitchBranch::Normal, at_time, from);
            }
            StretchCommand::ResetDelay { value, at_time } => {
                self.delay.cancel_scheduled_values(at_time);
                self.delay.set_value_at_time(value, at_time);
                for (branch, gain) in self.gains.iter_mut().enumerate() {
                    gain.cancel_scheduled_values(at_time);
                    gain.set_value_at_time(if branch == 0 { 1.0 } else { 0.0 }, at_time);
                }
            }
            StretchCommand::SetLookaheadDelay(delay) => self.lookahead_delay = delay,
        }
    }

    #[inline]
    pub fn stretcher_delay_at(&self, time: RealTime) -> TimeDelta {
        self.delay.value_at(time)
    }

    #[inline]
    pub fn gain_at(&self, branch: PitchBranch, time: RealTime) -> f64 {
        self.gains[branch.index()].value_at(time)
    }

    pub fn lookahead_delay(&self) -> TimeDelta {
        self.lookahead_delay
    }

    pub fn last_semitones(&self) -> f64 {
        self.last_semitones
    }

    pub fn prune_before(&mut self, time: RealTime) {
        self.delay.prune_before(time);
        for gain in self.gains.iter_mut() {
            gain.prune_before(time);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StretchSpeeds {
    sounded: f64,
    silence: f64,
    margin_before: f64,
}

impl StretchSpeeds {
    fn from_settings(settings: &Settings) -> Self {
        Self {
            sounded: settings.sounded_speed,
            silence: settings.silence_speed,
            margin_before: settings.margin_before,
        }
    }
}

pub struct StretchScheduler {
    timeline: StretchTimeline,
    commands: EventProducer<StretchCommand>,
    speeds: StretchSpeeds,
    last_scheduled: Option<StretchSchedule>,
    last_speed_change_at: Option<RealTime>,
}

impl StretchScheduler {
    /// Create a scheduler holding the sounded delay for `settings`
    pub fn new(settings: &Settings, lookahead_delay: TimeDelta, commands: EventProducer<StretchCommand>) -> Self {
        let speeds = StretchSpeeds::from_settings(settings);
        let initial = stretcher_sounded_delay(speeds.margin_before, speeds.sounded, speeds.silence);
        Self {
            timeline: StretchTimeline::new(initial, lookahead_delay),
            commands,
            speeds,
            last_scheduled: None,
            last_speed_change_at: None,
        }
    }

    fn send(&mut self, command: StretchCommand) {
        self.timeline.apply(&command);
        if !self.commands.push(command) {
            warn!("Stretch command dropped, audio domain is not draining: {:?}", command);
        }
    }

    pub fn lookahead_delay(&self) -> TimeDelta {
        self.timeline.lookahead_delay()
    }

    pub fn last_scheduled(&self) -> Option<StretchSchedule> {
        self.last_scheduled
    }

    /// Schedule a linear ramp of the delay from `start_delay` to `end_delay`
    ///
    /// Crossfades to the pitch branch that cancels the ramp's pitch change at
    /// `start_time` and back to pass-through at `end_time`.
    pub fn stretch(&mut self, start_delay: TimeDelta, end_delay: TimeDelta, start_time: RealTime, end_time: RealTime) {
        if start_delay == end_delay {
            return;
        }
        if !(end_time > start_time) {
            trace!("Degenerate stretch {:.4}..{:.4} skipped", start_time, end_time);
            return;
        }

        let branch = if end_delay > start_delay { PitchBranch::SlowDown } else { PitchBranch::SpeedUp };
        let schedule = StretchSchedule { start_time, end_time, start_delay, end_delay, branch };
        let semitones = compensating_semitones(schedule.compression_ratio());
        trace!(
            "Stretch {:?}: delay {:.4}->{:.4} over {:.4}..{:.4} ({:+.2} st)",
            branch,
            start_delay,
            end_delay,
            start_time,
            end_time,
            semitones
        );
        self.send(StretchCommand::Stretch { schedule, semitones });
        self.last_scheduled = Some(schedule);
    }

    /// Stop the in-flight ramp at `at_time`, hold `at_delay` and return to pass-through
    pub fn interrupt_scheduled_stretch(&mut self, at_delay: TimeDelta, at_time: RealTime) {
        debug_assert!(self.last_scheduled.is_some(), "interrupt without a scheduled stretch");
        let Some(last) = self.last_scheduled else {
            return;
        };
        self.send(StretchCommand::Interrupt { at_delay, at_time, from: last.branch });
    }

    /// The element switched to silence speed at `switched_at` (input time)
    pub fn on_silence_start(&mut self, switched_at: RealTime) {
        self.last_speed_change_at = Some(switched_at);

        let StretchSpeeds { sounded, silence, margin_before } = self.speeds;
        let realtime_margin_before = realtime_margin(margin_before, sounded);
        // Delay is at its sounded value when the speed-up reaches the output
        let start_delay = stretcher_sounded_delay(margin_before, sounded, silence);
        let start_in = (self.lookahead_delay() + start_delay) - realtime_margin_before;

        let delay_decrease_speed = silence / sounded - 1.0;
        if !(delay_decrease_speed > 0.0) || start_delay <= 0.0 {
            return;
        }
        let start_time = switched_at + start_in;
        let end_time = start_time + start_delay / delay_decrease_speed;
        self.stretch(start_delay, 0.0, start_time, end_time);
    }

    /// The element switched back to sounded speed at `switched_at` (input time)
    ///
    /// Re-stretches the margin before: the part of it that went through at silence
    /// speed is slowed back down, interrupting the catch-up ramp if it is still running.
    pub fn on_silence_end(&mut self, switched_at: RealTime) {
        debug_assert!(self.last_speed_change_at.is_some(), "silence end before any silence start");
        let Some(last_change) = self.last_speed_change_at.replace(switched_at) else {
            return;
        };
        let Some(last) = self.last_scheduled else {
            return;
        };

        let StretchSpeeds { sounded, silence, margin_before } = self.speeds;
        let lookahead = self.lookahead_delay();

        let silence_intrinsic = (switched_at - last_change) * silence;
        let at_silence_speed_intrinsic = silence_intrinsic.min(margin_before);
        let at_sounded_speed_intrinsic = margin_before - at_silence_speed_intrinsic;
        let at_silence_speed_real = at_silence_speed_intrinsic / silence;
        let at_sounded_speed_real = at_sounded_speed_intrinsic / sounded;

        let margin_start_input = switched_at - at_silence_speed_real - at_sounded_speed_real;
        let margin_start_output = map_input_time_to_output_time(margin_start_input, lookahead, &last);
        let margin_start_stretcher_delay = margin_start_output - margin_start_input - lookahead;

        if margin_start_output < last.end_time {
            debug!(
                "Silence shorter than the catch-up ramp, interrupting at {:.4}",
                margin_start_output
            );
            self.interrupt_scheduled_stretch(margin_start_stretcher_delay, margin_start_output);
        }

        let increase = stretcher_delay_change(at_silence_speed_real, silence, sounded);
        let final_delay = margin_start_stretcher_delay + increase;
        let start_time = margin_start_output + at_sounded_speed_real;
        let end_time = switched_at + lookahead + final_delay;
        self.stretch(margin_start_stretcher_delay, final_delay, start_time, end_time);
    }

    /// Adopt new speeds and margins, snapping the delay to the new sounded value at `now`
    pub fn on_settings_update(&mut self, settings: &Settings, now: RealTime) {
        self.speeds = StretchSpeeds::from_settings(settings);
        let lookahead = optimal_lookahead_delay(settings.margin_before, settings.sounded_speed, settings.silence_speed);
        if lookahead != self.lookahead_delay() {
            self.send(StretchCommand::SetLookaheadDelay(lookahead));
        }
        let value = stretcher_sounded_delay(settings.margin_before, settings.sounded_speed, settings.silence_speed);
        self.send(StretchCommand::ResetDelay { value, at_time: now });
        self.last_scheduled = None;
    }

    /// Forget automation that is fully in the past
    pub fn prune(&mut self, now: RealTime) {
        self.timeline.prune_before(now);
    }

    pub fn stretcher_delay_at(&self, time: RealTime) -> TimeDelta {
        self.timeline.stretcher_delay_at(time)
    }

    pub fn pitch_corrector_delay(&self) -> TimeDelta {
        PITCH_SHIFT_WINDOW / 2.0
    }

    pub fn delay_from_input_to_stretcher_output(&self, time: RealTime) -> TimeDelta {
        self.lookahead_delay() + self.stretcher_delay_at(time)
    }

    pub fn total_output_delay(&self, time: RealTime) -> TimeDelta {
        self.delay_from_input_to_stretcher_output(time) + self.pitch_corrector_delay()
    }

    /// Last scheduled ramp, with its times moved back to when its samples entered the pipeline
    pub fn last_scheduled_input_times(&self) -> Option<ScheduledStretchTelemetry> {
        let lookahead = self.lookahead_delay();
        self.last_scheduled.map(|s| ScheduledStretchTelemetry {
            start_time: s.start_time - (lookahead + s.start_delay),
            end_time: s.end_time - (lookahead + s.end_delay),
            start_delay: s.start_delay,
            end_delay: s.end_delay,
        })
    }
}
