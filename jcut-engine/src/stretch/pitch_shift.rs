//! Granular two-tap pitch shifter
//!
//! Two read taps sweep a short delay line at the rate that produces the wanted
//! pitch ratio. The taps are half a window apart and faded with complementary
//! sin² gains, so each wrap of a tap happens while its gain is zero.
//!
//! Average delay through the shifter is half the window. The pass-through branch
//! of the stretcher is delayed by the same amount to stay in sync.

use crate::stretch::delay_line::DelayLine;
use std::f64::consts::PI;

/// Window of the pitch shifters (s)
pub const PITCH_SHIFT_WINDOW: f64 = 0.1;

pub struct PitchShifter {
    line: DelayLine,
    window: f64,
    phase: f64,
    phase_step: f64,
    semitones: f64,
    sample_rate: f64,
    tap_a: Box<[f32]>,
    tap_b: Box<[f32]>,
}

impl PitchShifter {
    pub fn new(window: f64, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1) as usize;
        Self {
            line: DelayLine::new(window, sample_rate, channels as u16),
            window,
            phase: 0.0,
            phase_step: 0.0,
            semitones: 0.0,
            sample_rate: f64::from(sample_rate),
            tap_a: vec![0.0; channels].into_boxed_slice(),
            tap_b: vec![0.0; channels].into_boxed_slice(),
        }
    }

    /// Delay the shifted signal lags the input by, on average
    pub fn average_delay(&self) -> f64 {
        self.window / 2.0
    }

    pub fn semitones(&self) -> f64 {
        self.semitones
    }

    pub fn set_semitones(&mut self, semitones: f64) {
        if !semitones.is_finite() {
            return;
        }
        self.semitones = semitones;
        let ratio = 2f64.powf(semitones / 12.0);
        // Delay must shrink by (ratio - 1) seconds per second of output
        self.phase_step = (1.0 - ratio) / (self.window * self.sample_rate);
    }

    /// Shift one frame in place
    #[inline]
    pub fn process_frame(&mut self, frame: &mut [f32]) {
        self.line.write_frame(frame);

        let phase_b = (self.phase + 0.5).rem_euclid(1.0);
        self.line.read_frame(self.phase * self.window, &mut self.tap_a);
        self.line.read_frame(phase_b * self.window, &mut self.tap_b);

        let gain_a = (PI * self.phase).sin().powi(2) as f32;
        let gain_b = (PI * phase_b).sin().powi(2) as f32;
        for ((out, a), b) in frame.iter_mut().zip(self.tap_a.iter()).zip(self.tap_b.iter()) {
            *out = a * gain_a + b * gain_b;
        }

        self.phase = (self.phase + self.phase_step).rem_euclid(1.0);
    }
}
