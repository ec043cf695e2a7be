//! Media backing a simulated element
//!
//! Either decoded from a file or synthesised from sounded / silent segments.
//! Sounded segments are a 220 Hz sine, which is plenty for a volume classifier.

use crate::audio::decoder::MediaDecoder;
use crate::audio::types::PcmBuffer;
use crate::error::{Error, Result};
use jcut_common::MediaTime;
use std::f64::consts::TAU;
use std::path::Path;
use tracing::info;

const TONE_HZ: f64 = 220.0;

/// Default amplitude of a sounded segment
pub const SOUNDED_AMPLITUDE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub duration: f64,
    pub amplitude: f32,
}

impl Segment {
    pub fn sounded(duration: f64) -> Self {
        Self { duration, amplitude: SOUNDED_AMPLITUDE }
    }

    pub fn silence(duration: f64) -> Self {
        Self { duration, amplitude: 0.0 }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    pcm: PcmBuffer,
    silent_frame: Vec<f32>,
}

impl SimulatedMedia {
    pub fn from_pcm(pcm: PcmBuffer) -> Self {
        let silent_frame = vec![0.0; pcm.channel_count.max(1) as usize];
        Self { pcm, silent_frame }
    }

    /// Decode an audio file into memory
    pub fn from_file(path: &Path) -> Result<Self> {
        let pcm = MediaDecoder::decode_file(path)?;
        if pcm.channel_count == 0 {
            return Err(Error::Decode(format!("{} has no channels", path.display())));
        }
        info!(
            "Loaded {} ({:.1}s, {} Hz, {} ch)",
            path.display(),
            pcm.duration_secs(),
            pcm.sample_rate,
            pcm.channel_count
        );
        Ok(Self::from_pcm(pcm))
    }

    /// Synthesise media from consecutive segments
    pub fn from_segments(sample_rate: u32, channels: u16, segments: &[Segment]) -> Self {
        let channels = channels.max(1);
        let rate = f64::from(sample_rate);
        let total: usize = segments
            .iter()
            .map(|s| (s.duration.max(0.0) * rate).round() as usize)
            .sum();

        let mut samples = Vec::with_capacity(total * channels as usize);
        let mut frame_index = 0usize;
        for segment in segments {
            let frames = (segment.duration.max(0.0) * rate).round() as usize;
            for _ in 0..frames {
                let t = frame_index as f64 / rate;
                let value = segment.amplitude * (TAU * TONE_HZ * t).sin() as f32;
                for _ in 0..channels {
                    samples.push(value);
                }
                frame_index += 1;
            }
        }
        Self::from_pcm(PcmBuffer::new(samples, sample_rate, channels))
    }

    /// Speech-like pattern: sounded phrases separated by pauses of varying length
    pub fn speech_like(sample_rate: u32, duration: f64) -> Self {
        const PAUSES: [f64; 6] = [0.3, 1.2, 0.08, 2.5, 0.6, 4.0];
        const PHRASES: [f64; 4] = [1.8, 3.2, 0.9, 2.4];

        let mut segments = Vec::new();
        let mut total = 0.0;
        let mut i = 0;
        while total < duration {
            let phrase = PHRASES[i % PHRASES.len()];
            let pause = PAUSES[i % PAUSES.len()];
            segments.push(Segment::sounded(phrase));
            segments.push(Segment::silence(pause));
            total += phrase + pause;
            i += 1;
        }
        Self::from_segments(sample_rate, 2, &segments)
    }

    pub fn duration(&self) -> MediaTime {
        self.pcm.duration_secs()
    }

    pub fn sample_rate(&self) -> u32 {
        self.pcm.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.pcm.channel_count
    }

    /// Frame playing at `time`; silence outside the media
    pub fn frame_at(&self, time: MediaTime) -> &[f32] {
        if time < 0.0 {
            return &self.silent_frame;
        }
        self.pcm
            .frame(self.pcm.frame_at(time))
            .unwrap_or(&self.silent_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_laid_out_in_order() {
        let media = SimulatedMedia::from_segments(
            1000,
            2,
            &[Segment::sounded(1.0), Segment::silence(0.5), Segment::sounded(0.5)],
        );
        assert!((media.duration() - 2.0).abs() < 1e-9);
        assert_eq!(media.channels(), 2);
        assert!(media.frame_at(1.2).iter().all(|s| *s == 0.0));
        let loud = (0..100).map(|i| media.frame_at(i as f64 * 0.001)[0].abs()).fold(0.0f32, f32::max);
        assert!(loud > 0.4);
        assert!(media.frame_at(5.0).iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_speech_like_covers_duration() {
        let media = SimulatedMedia::speech_like(8000, 30.0);
        assert!(media.duration() >= 30.0);
    }
}
