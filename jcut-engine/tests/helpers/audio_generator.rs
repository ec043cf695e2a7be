//! Audio Test File Generation Utilities
//!
//! Deterministic WAV files with known characteristics for decoder tests.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

fn spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Generate a sine wave WAV file
///
/// # Arguments
/// * `path` - Output file path
/// * `sample_rate` - Frames per second
/// * `channels` - Same value is written to every channel
/// * `duration_ms` - Duration in milliseconds
/// * `amplitude` - Amplitude 0.0-1.0 (0.5 recommended to avoid clipping)
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    duration_ms: u64,
    amplitude: f32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(sample_rate, channels))?;
    let total_frames = (sample_rate as u64 * duration_ms) / 1000;
    let peak = amplitude * i16::MAX as f32;

    for frame_idx in 0..total_frames {
        let t = frame_idx as f32 / sample_rate as f32;
        let sample = ((2.0 * PI * 220.0 * t).sin() * peak) as i16;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Generate mono tone / silence / tone, each part `part_ms` long
pub fn generate_gapped_wav<P: AsRef<Path>>(path: P, sample_rate: u32, part_ms: u64) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(sample_rate, 1))?;
    let part_frames = (sample_rate as u64 * part_ms) / 1000;
    let peak = 0.5 * i16::MAX as f32;

    for frame_idx in 0..part_frames * 3 {
        let silent = frame_idx >= part_frames && frame_idx < part_frames * 2;
        let t = frame_idx as f32 / sample_rate as f32;
        let sample = if silent { 0 } else { ((2.0 * PI * 220.0 * t).sin() * peak) as i16 };
        writer.write_sample(sample)?;
    }

    writer.finalize()?;
    Ok(())
}
