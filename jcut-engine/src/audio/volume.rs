//! Volume smoother
//!
//! Rectangular-window RMS over the mean square of all channels of each frame.
//! The window is allocated once; `process` never allocates and is safe to call
//! from the real-time audio domain.
//!
//! The output lags the input by half the window, see [`VolumeSmoother::smoothing_delay`].

/// Window used by the lookahead shadow pipeline (s)
pub const LOOKAHEAD_SMOOTHING_WINDOW: f64 = 0.02;

/// Window used by the stretching pipeline (s)
pub const STRETCHING_SMOOTHING_WINDOW: f64 = 0.03;

pub struct VolumeSmoother {
    squares: Box<[f32]>,
    position: usize,
    sum: f64,
    window_secs: f64,
}

impl VolumeSmoother {
    /// Create a smoother averaging over `window_secs` at `sample_rate`
    pub fn new(window_secs: f64, sample_rate: u32) -> Self {
        let len = ((window_secs * f64::from(sample_rate)).round() as usize).max(1);
        Self {
            squares: vec![0.0; len].into_boxed_slice(),
            position: 0,
            sum: 0.0,
            window_secs,
        }
    }

    /// Delay between a change in the input and its half-way point in the output
    pub fn smoothing_delay(&self) -> f64 {
        self.window_secs / 2.0
    }

    pub fn window_len(&self) -> usize {
        self.squares.len()
    }

    /// Feed one frame, return the smoothed volume after it
    #[inline]
    pub fn push_frame(&mut self, frame: &[f32]) -> f32 {
        let mean_square = if frame.is_empty() {
            0.0
        } else {
            frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32
        };

        let oldest = self.squares[self.position];
        self.squares[self.position] = mean_square;
        self.position += 1;
        if self.position == self.squares.len() {
            self.position = 0;
        }

        // Running sum accumulates rounding error, it must never go negative
        self.sum = (self.sum + f64::from(mean_square) - f64::from(oldest)).max(0.0);
        (self.sum / self.squares.len() as f64).sqrt() as f32
    }

    /// Smooth interleaved `samples` into one mono value per frame
    ///
    /// `out` must hold at least one value per frame; extra values are left untouched.
    pub fn process(&mut self, channels: u16, samples: &[f32], out: &mut [f32]) {
        let channels = channels.max(1) as usize;
        for (frame, slot) in samples.chunks_exact(channels).zip(out.iter_mut()) {
            *slot = self.push_frame(frame);
        }
    }

    pub fn reset(&mut self) {
        self.squares.iter_mut().for_each(|s| *s = 0.0);
        self.position = 0;
        self.sum = 0.0;
    }
}
