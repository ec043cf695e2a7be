//! Core audio data types
//!
//! Defines the block handed to real-time processors and the in-memory PCM
//! buffer that backs simulated media.

use jcut_common::RealTime;

/// One block of interleaved samples handed to a processor
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Interleaved: [c0, c1, ..., c0, c1, ...]
/// - `start_time` is the pipeline time of the first frame
#[derive(Debug)]
pub struct AudioBlock<'a> {
    pub start_time: RealTime,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: &'a mut [f32],
}

impl<'a> AudioBlock<'a> {
    pub fn new(start_time: RealTime, sample_rate: u32, channels: u16, samples: &'a mut [f32]) -> Self {
        Self { start_time, sample_rate, channels, samples }
    }

    /// Number of frames (samples per channel) in the block
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Pipeline time of frame `index`
    pub fn frame_time(&self, index: usize) -> RealTime {
        self.start_time + index as f64 / f64::from(self.sample_rate)
    }

    /// Duration covered by the block
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }
}

/// Decoded audio held entirely in memory
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    /// PCM audio samples (interleaved)
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channel_count: u16,
    /// Number of frames (samples.len() / channel_count)
    pub frame_count: usize,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channel_count: u16) -> Self {
        let frame_count = if channel_count == 0 { 0 } else { samples.len() / channel_count as usize };
        Self { samples, sample_rate, channel_count, frame_count }
    }

    /// Get duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / f64::from(self.sample_rate)
    }

    /// Samples of frame `index`, or None past the end
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        if index >= self.frame_count {
            return None;
        }
        let channels = self.channel_count as usize;
        let start = index * channels;
        Some(&self.samples[start..start + channels])
    }

    /// Frame index playing at media position `time`
    pub fn frame_at(&self, time: f64) -> usize {
        if time <= 0.0 {
            0
        } else {
            (time * f64::from(self.sample_rate)) as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_frame_times() {
        let mut samples = vec![0.0f32; 8];
        let block = AudioBlock::new(2.0, 4, 2, &mut samples);
        assert_eq!(block.frames(), 4);
        assert_eq!(block.frame_time(0), 2.0);
        assert_eq!(block.frame_time(2), 2.5);
        assert_eq!(block.duration(), 1.0);
    }

    #[test]
    fn test_pcm_buffer_frames() {
        let buffer = PcmBuffer::new(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 44100, 2);
        assert_eq!(buffer.frame_count, 3);
        assert_eq!(buffer.frame(1), Some(&[0.3f32, 0.4][..]));
        assert!(buffer.frame(3).is_none());
    }

    #[test]
    fn test_pcm_buffer_duration_and_lookup() {
        let buffer = PcmBuffer::new(vec![0.0; 44100 * 2], 44100, 2);
        assert_eq!(buffer.duration_secs(), 1.0);
        assert_eq!(buffer.frame_at(0.5), 22050);
        assert_eq!(buffer.frame_at(-1.0), 0);
    }
}
