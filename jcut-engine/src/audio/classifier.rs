//! Silence classifier
//!
//! Turns a stream of sample blocks into alternating SILENCE_START / SILENCE_END
//! events with asymmetric hysteresis:
//!
//! - A loud sample ends silence immediately, stamped with that sample's time.
//! - Silence is declared only once quiet audio has lasted `duration_threshold`,
//!   stamped with the moment the threshold elapsed.
//!
//! The initial guess is always sounded, even when attached partway through a
//! silence: the first event is then a SILENCE_START one threshold later.
//!
//! All bookkeeping is done in whole frames so the decision point does not drift
//! with block size. `process` never allocates.

use crate::audio::types::AudioBlock;
use jcut_common::events::SilenceEvent;
use jcut_common::RealTime;

pub struct SilenceClassifier {
    volume_threshold: f32,
    duration_threshold: f64,
    threshold_frames: u64,
    sample_rate: u32,
    /// Quiet frames seen since the last loud one
    quiet_frames: u64,
    silent: bool,
}

impl SilenceClassifier {
    /// Create a classifier that starts in the sounded state
    pub fn new(volume_threshold: f64, duration_threshold: f64, sample_rate: u32) -> Self {
        let mut classifier = Self {
            volume_threshold: volume_threshold as f32,
            duration_threshold,
            threshold_frames: 0,
            sample_rate,
            quiet_frames: 0,
            silent: false,
        };
        classifier.set_duration_threshold(duration_threshold);
        classifier
    }

    pub fn set_volume_threshold(&mut self, threshold: f64) {
        self.volume_threshold = threshold as f32;
    }

    pub fn set_duration_threshold(&mut self, seconds: f64) {
        self.duration_threshold = seconds.max(0.0);
        self.threshold_frames = (self.duration_threshold * f64::from(self.sample_rate)).round() as u64;
    }

    pub fn duration_threshold(&self) -> f64 {
        self.duration_threshold
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Classify one block, calling `emit` for every transition in order
    pub fn process_block<F>(&mut self, block: &AudioBlock<'_>, emit: F)
    where
        F: FnMut(SilenceEvent),
    {
        self.process_samples(block.start_time, block.channels, block.samples, emit);
    }

    /// Classify interleaved `samples` whose first frame plays at `start_time`
    pub fn process_samples<F>(&mut self, start_time: RealTime, channels: u16, samples: &[f32], mut emit: F)
    where
        F: FnMut(SilenceEvent),
    {
        let channels = channels.max(1) as usize;
        let rate = f64::from(self.sample_rate);

        if samples.len() < channels {
            // Nothing to judge: assume sound rather than silence unknown audio
            self.quiet_frames = 0;
            if self.silent {
                self.silent = false;
                emit(SilenceEvent::end(start_time));
            }
            return;
        }

        for (index, frame) in samples.chunks_exact(channels).enumerate() {
            let loud = frame.iter().any(|s| s.abs() >= self.volume_threshold);
            if loud {
                self.quiet_frames = 0;
                if self.silent {
                    self.silent = false;
                    emit(SilenceEvent::end(start_time + index as f64 / rate));
                }
            } else {
                self.quiet_frames = self.quiet_frames.saturating_add(1);
                if !self.silent && self.quiet_frames >= self.threshold_frames {
                    self.silent = true;
                    // Threshold elapses at the end of this frame
                    emit(SilenceEvent::start(start_time + (index + 1) as f64 / rate));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jcut_common::events::SilenceEventKind;

    fn run(classifier: &mut SilenceClassifier, start: f64, samples: &[f32]) -> Vec<SilenceEvent> {
        let mut events = Vec::new();
        classifier.process_samples(start, 1, samples, |e| events.push(e));
        events
    }

    #[test]
    fn test_starts_sounded_and_alternates() {
        let mut classifier = SilenceClassifier::new(0.1, 0.01, 1000);
        assert!(!classifier.is_silent());

        // Attached inside a silence: nothing until the threshold has elapsed
        let mut samples = vec![0.0f32; 20];
        samples.extend(vec![0.5f32; 5]);
        samples.extend(vec![0.0f32; 20]);
        let events = run(&mut classifier, 0.0, &samples);
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SilenceEventKind::SilenceStart,
                SilenceEventKind::SilenceEnd,
                SilenceEventKind::SilenceStart
            ]
        );
        assert!((events[0].at - 0.01).abs() < 1e-9);
        assert!((events[1].at - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_short_dip_is_not_silence() {
        let mut classifier = SilenceClassifier::new(0.1, 0.01, 1000);
        let mut samples = vec![0.5f32; 10];
        samples.extend(vec![0.0f32; 9]);
        samples.extend(vec![0.5f32; 10]);
        assert!(run(&mut classifier, 0.0, &samples).is_empty());
    }

    #[test]
    fn test_threshold_reached_exactly_fires() {
        let mut classifier = SilenceClassifier::new(0.1, 0.01, 1000);
        let events = run(&mut classifier, 0.0, &[0.0f32; 10]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SilenceEventKind::SilenceStart);
        assert!((events[0].at - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_start_fires_once_per_quiet_run() {
        let mut classifier = SilenceClassifier::new(0.1, 0.005, 1000);
        let mut events = run(&mut classifier, 0.0, &[0.0f32; 50]);
        events.extend(run(&mut classifier, 0.05, &[0.0f32; 50]));
        assert_eq!(events.len(), 1);
        assert!(classifier.is_silent());
    }

    #[test]
    fn test_any_channel_loud_counts() {
        let mut classifier = SilenceClassifier::new(0.1, 0.0, 1000);
        let mut events = Vec::new();
        classifier.process_samples(0.0, 2, &[0.0, 0.0, 0.0, -0.2], |e| events.push(e));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, SilenceEventKind::SilenceStart);
        assert_eq!(events[1].kind, SilenceEventKind::SilenceEnd);
        assert!((events[1].at - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_empty_block_fails_open() {
        let mut classifier = SilenceClassifier::new(0.1, 0.0, 1000);
        run(&mut classifier, 0.0, &[0.0; 4]);
        assert!(classifier.is_silent());
        let events = run(&mut classifier, 0.004, &[]);
        assert_eq!(events, vec![SilenceEvent::end(0.004)]);
        assert!(!classifier.is_silent());
    }

    #[test]
    fn test_threshold_can_change_mid_stream() {
        let mut classifier = SilenceClassifier::new(0.1, 1.0, 1000);
        assert!(run(&mut classifier, 0.0, &[0.0; 20]).is_empty());
        classifier.set_duration_threshold(0.02);
        let events = run(&mut classifier, 0.02, &[0.0; 1]);
        assert_eq!(events.len(), 1);
    }
}
