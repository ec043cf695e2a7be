//! Analysis processor: volume smoother feeding an optional silence classifier
//!
//! Runs on the audio domain. Thresholds are read from shared atomics at the start
//! of every block, the smoothed volume is published back the same way, and
//! classifier events leave through the lock-free event channel.

use crate::audio::classifier::SilenceClassifier;
use crate::audio::clock::AtomicF64;
use crate::audio::event_channel::EventProducer;
use crate::audio::types::AudioBlock;
use crate::audio::volume::VolumeSmoother;
use crate::element::BlockProcessor;
use jcut_common::events::SilenceEvent;
use std::sync::Arc;

/// Frames smoothed per pass; longer blocks are processed in several passes
const SCRATCH_FRAMES: usize = 4096;

/// Values shared between the control domain and an analysis processor
#[derive(Debug, Default)]
pub struct AnalysisControls {
    volume_threshold: AtomicF64,
    duration_threshold: AtomicF64,
    volume: AtomicF64,
}

impl AnalysisControls {
    pub fn new(volume_threshold: f64, duration_threshold: f64) -> Arc<Self> {
        Arc::new(Self {
            volume_threshold: AtomicF64::new(volume_threshold),
            duration_threshold: AtomicF64::new(duration_threshold),
            volume: AtomicF64::new(0.0),
        })
    }

    pub fn set_volume_threshold(&self, threshold: f64) {
        self.volume_threshold.store(threshold);
    }

    pub fn set_duration_threshold(&self, seconds: f64) {
        self.duration_threshold.store(seconds);
    }

    pub fn duration_threshold(&self) -> f64 {
        self.duration_threshold.load()
    }

    /// Last smoothed volume published by the processor
    pub fn volume(&self) -> f64 {
        self.volume.load()
    }
}

pub struct AnalysisProcessor {
    smoother: VolumeSmoother,
    classifier: Option<(SilenceClassifier, EventProducer<SilenceEvent>)>,
    controls: Arc<AnalysisControls>,
    smoothed: Box<[f32]>,
}

impl AnalysisProcessor {
    /// Volume meter only, no classification
    pub fn meter(window_secs: f64, sample_rate: u32, controls: Arc<AnalysisControls>) -> Self {
        Self {
            smoother: VolumeSmoother::new(window_secs, sample_rate),
            classifier: None,
            controls,
            smoothed: vec![0.0; SCRATCH_FRAMES].into_boxed_slice(),
        }
    }

    /// Smoother plus classifier emitting into `events`
    pub fn classifying(
        window_secs: f64,
        sample_rate: u32,
        controls: Arc<AnalysisControls>,
        events: EventProducer<SilenceEvent>,
    ) -> Self {
        let classifier = SilenceClassifier::new(
            controls.volume_threshold.load(),
            controls.duration_threshold.load(),
            sample_rate,
        );
        Self {
            smoother: VolumeSmoother::new(window_secs, sample_rate),
            classifier: Some((classifier, events)),
            controls,
            smoothed: vec![0.0; SCRATCH_FRAMES].into_boxed_slice(),
        }
    }

    pub fn smoothing_delay(&self) -> f64 {
        self.smoother.smoothing_delay()
    }

    /// Analyse a block without touching its samples
    pub fn analyse(&mut self, block: &AudioBlock<'_>) {
        if let Some((classifier, _)) = self.classifier.as_mut() {
            classifier.set_volume_threshold(self.controls.volume_threshold.load());
            let duration = self.controls.duration_threshold.load();
            if duration != classifier.duration_threshold() {
                classifier.set_duration_threshold(duration);
            }
        }

        let channels = block.channels.max(1) as usize;
        let frames = block.frames();
        if frames == 0 {
            if let Some((classifier, events)) = self.classifier.as_mut() {
                classifier.process_samples(block.start_time, 1, &[], |e| {
                    events.push(e);
                });
            }
            return;
        }

        let rate = f64::from(block.sample_rate);
        let mut offset = 0;
        let mut last = 0.0f32;
        while offset < frames {
            let n = (frames - offset).min(self.smoothed.len());
            let chunk = &block.samples[offset * channels..(offset + n) * channels];
            let out = &mut self.smoothed[..n];
            self.smoother.process(block.channels, chunk, out);
            last = out[n - 1];

            if let Some((classifier, events)) = self.classifier.as_mut() {
                let chunk_start = block.start_time + offset as f64 / rate;
                classifier.process_samples(chunk_start, 1, out, |e| {
                    events.push(e);
                });
            }
            offset += n;
        }

        self.controls.volume.store(f64::from(last));
    }
}

impl BlockProcessor for AnalysisProcessor {
    fn process(&mut self, block: &mut AudioBlock<'_>) {
        self.analyse(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::event_channel::EventChannel;
    use jcut_common::events::SilenceEventKind;

    #[test]
    fn test_meter_publishes_volume() {
        let controls = AnalysisControls::new(0.1, 0.05);
        let mut meter = AnalysisProcessor::meter(0.001, 1000, Arc::clone(&controls));
        let mut samples = vec![0.5f32; 20];
        meter.process(&mut AudioBlock::new(0.0, 1000, 2, &mut samples));
        assert!((controls.volume() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_classifying_processor_emits_through_channel() {
        let controls = AnalysisControls::new(0.1, 0.01);
        let (tx, mut rx) = EventChannel::new(None).split();
        let mut processor = AnalysisProcessor::classifying(0.001, 1000, Arc::clone(&controls), tx);

        let mut loud = vec![0.5f32; 10];
        processor.process(&mut AudioBlock::new(0.0, 1000, 1, &mut loud));
        let mut quiet = vec![0.0f32; 50];
        processor.process(&mut AudioBlock::new(0.01, 1000, 1, &mut quiet));

        let event = rx.pop().expect("silence start");
        assert_eq!(event.kind, SilenceEventKind::SilenceStart);
        assert!((event.at - 0.02).abs() < 1e-9);
        assert!(rx.pop().is_none());
    }

    #[test]
    fn test_threshold_updates_reach_audio_domain() {
        let controls = AnalysisControls::new(0.1, 10.0);
        let (tx, mut rx) = EventChannel::new(None).split();
        let mut processor = AnalysisProcessor::classifying(0.001, 1000, Arc::clone(&controls), tx);

        let mut quiet = vec![0.0f32; 100];
        processor.process(&mut AudioBlock::new(0.0, 1000, 1, &mut quiet));
        assert!(rx.pop().is_none());

        controls.set_duration_threshold(0.05);
        let mut quiet = vec![0.0f32; 10];
        processor.process(&mut AudioBlock::new(0.1, 1000, 1, &mut quiet));
        assert!(rx.pop().is_some());
    }

    #[test]
    fn test_long_block_processed_in_passes() {
        let controls = AnalysisControls::new(0.1, 5.0);
        let (tx, mut rx) = EventChannel::new(None).split();
        let mut processor = AnalysisProcessor::classifying(0.001, 1000, Arc::clone(&controls), tx);

        let mut samples = vec![0.0f32; 10_000];
        processor.process(&mut AudioBlock::new(0.0, 1000, 1, &mut samples));
        let event = rx.pop().expect("silence start");
        assert!((event.at - 5.0).abs() < 1e-9);
    }
}
