//! Audio-domain half of the stretcher
//!
//! Input → lookahead + automated stretcher delay → three branches:
//! pass-through (delayed to match the shifters), pitch-up and pitch-down,
//! mixed by their automated gains. Commands from the scheduler are applied at
//! the start of each block.

use crate::audio::event_channel::EventConsumer;
use crate::audio::types::AudioBlock;
use crate::element::BlockProcessor;
use crate::stretch::delay_line::DelayLine;
use crate::stretch::pitch_shift::{PitchShifter, PITCH_SHIFT_WINDOW};
use crate::stretch::scheduler::{PitchBranch, StretchCommand, StretchTimeline};
use jcut_common::TimeDelta;

pub struct StretcherNode {
    timeline: StretchTimeline,
    commands: EventConsumer<StretchCommand>,
    line: DelayLine,
    compensation: DelayLine,
    speed_up: PitchShifter,
    slow_down: PitchShifter,
    channels: usize,
    delayed: Box<[f32]>,
    normal: Box<[f32]>,
    up: Box<[f32]>,
    down: Box<[f32]>,
}

impl StretcherNode {
    /// # Arguments
    /// * `max_delay` - Longest lookahead + stretcher delay the node must produce (s)
    /// * `initial_delay` - Stretcher delay held until the first command
    pub fn new(
        max_delay: TimeDelta,
        initial_delay: TimeDelta,
        lookahead_delay: TimeDelta,
        sample_rate: u32,
        channels: u16,
        commands: EventConsumer<StretchCommand>,
    ) -> Self {
        let n = channels.max(1) as usize;
        let scratch = || vec![0.0f32; n].into_boxed_slice();
        Self {
            timeline: StretchTimeline::new(initial_delay, lookahead_delay),
            commands,
            line: DelayLine::new(max_delay, sample_rate, channels),
            compensation: DelayLine::new(PITCH_SHIFT_WINDOW / 2.0, sample_rate, channels),
            speed_up: PitchShifter::new(PITCH_SHIFT_WINDOW, sample_rate, channels),
            slow_down: PitchShifter::new(PITCH_SHIFT_WINDOW, sample_rate, channels),
            channels: n,
            delayed: scratch(),
            normal: scratch(),
            up: scratch(),
            down: scratch(),
        }
    }

    pub fn max_delay(&self) -> TimeDelta {
        self.line.max_delay()
    }

    fn apply_commands(&mut self) {
        while let Some(command) = self.commands.pop() {
            if let StretchCommand::Stretch { schedule, semitones } = command {
                match schedule.branch {
                    PitchBranch::SpeedUp => self.speed_up.set_semitones(semitones),
                    PitchBranch::SlowDown => self.slow_down.set_semitones(semitones),
                    PitchBranch::Normal => {}
                }
            }
            self.timeline.apply(&command);
        }
    }
}

impl BlockProcessor for StretcherNode {
    fn process(&mut self, block: &mut AudioBlock<'_>) {
        self.apply_commands();
        if block.channels as usize != self.channels {
            return;
        }

        let rate = f64::from(block.sample_rate);
        let start = block.start_time;
        let lookahead = self.timeline.lookahead_delay();
        let compensation = PITCH_SHIFT_WINDOW / 2.0;

        for (index, frame) in block.samples.chunks_exact_mut(self.channels).enumerate() {
            let t = start + index as f64 / rate;
            self.line.write_frame(frame);
            self.line
                .read_frame(lookahead + self.timeline.stretcher_delay_at(t), &mut self.delayed);

            self.compensation.write_frame(&self.delayed);
            self.compensation.read_frame(compensation, &mut self.normal);
            self.up.copy_from_slice(&self.delayed);
            self.speed_up.process_frame(&mut self.up);
            self.down.copy_from_slice(&self.delayed);
            self.slow_down.process_frame(&mut self.down);

            let g_normal = self.timeline.gain_at(PitchBranch::Normal, t) as f32;
            let g_up = self.timeline.gain_at(PitchBranch::SpeedUp, t) as f32;
            let g_down = self.timeline.gain_at(PitchBranch::SlowDown, t) as f32;
            for (ch, out) in frame.iter_mut().enumerate() {
                *out = self.normal[ch] * g_normal + self.up[ch] * g_up + self.down[ch] * g_down;
            }
        }

        self.timeline.prune_before(start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::event_channel::EventChannel;

    #[test]
    fn test_constant_delay_passes_signal() {
        let (_tx, rx) = EventChannel::new(None).split();
        let mut node = StretcherNode::new(0.5, 0.0, 0.01, 1000, 1, rx);

        // Impulse at frame 0; expected at lookahead (10) + compensation (50) frames
        let mut samples = vec![0.0f32; 200];
        samples[0] = 1.0;
        node.process(&mut AudioBlock::new(0.0, 1000, 1, &mut samples));
        let peak = samples
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(60));
    }

    #[test]
    fn test_commands_reach_audio_timeline() {
        let (mut tx, rx) = EventChannel::new(None).split();
        let mut node = StretcherNode::new(1.0, 0.2, 0.0, 1000, 2, rx);
        tx.push(StretchCommand::ResetDelay { value: 0.1, at_time: 0.0 });

        let mut samples = vec![0.0f32; 20];
        node.process(&mut AudioBlock::new(0.0, 1000, 2, &mut samples));
        assert!((node.timeline.stretcher_delay_at(0.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_channel_mismatch_leaves_block_untouched() {
        let (_tx, rx) = EventChannel::new(None).split();
        let mut node = StretcherNode::new(0.1, 0.0, 0.0, 1000, 2, rx);
        let mut samples = vec![0.3f32; 9];
        node.process(&mut AudioBlock::new(0.0, 1000, 3, &mut samples));
        assert!(samples.iter().all(|s| *s == 0.3));
    }
}
