//! Multichannel fractional delay line
//!
//! Frames are written one at a time; reads take a delay in seconds and
//! interpolate linearly between the two neighbouring frames. The delay is
//! clamped to what the line can hold.

pub struct DelayLine {
    buffer: Box<[f32]>,
    channels: usize,
    frames: usize,
    write_frame: usize,
    sample_rate: f64,
}

impl DelayLine {
    pub fn new(max_delay_secs: f64, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1) as usize;
        let frames = (max_delay_secs.max(0.0) * f64::from(sample_rate)).ceil() as usize + 2;
        Self {
            buffer: vec![0.0; frames * channels].into_boxed_slice(),
            channels,
            frames,
            write_frame: 0,
            sample_rate: f64::from(sample_rate),
        }
    }

    /// Longest delay this line can produce, in seconds
    pub fn max_delay(&self) -> f64 {
        (self.frames - 2) as f64 / self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn write_frame(&mut self, frame: &[f32]) {
        let start = self.write_frame * self.channels;
        for (slot, sample) in self.buffer[start..start + self.channels].iter_mut().zip(frame) {
            *slot = *sample;
        }
        self.write_frame += 1;
        if self.write_frame == self.frames {
            self.write_frame = 0;
        }
    }

    /// Read the frame written `delay_secs` ago; zero delay is the last written frame
    #[inline]
    pub fn read_frame(&self, delay_secs: f64, out: &mut [f32]) {
        let max = (self.frames - 2) as f64;
        let delay = (delay_secs * self.sample_rate).clamp(0.0, max);
        let whole = delay.floor();
        let frac = (delay - whole) as f32;
        let whole = whole as usize;

        let newest = self.write_frame + self.frames - 1;
        let a = (newest - whole) % self.frames;
        let b = (newest - whole - 1 + self.frames) % self.frames;
        let (a, b) = (a * self.channels, b * self.channels);

        for (ch, slot) in out.iter_mut().take(self.channels).enumerate() {
            let near = self.buffer[a + ch];
            let far = self.buffer[b + ch];
            *slot = near + (far - near) * frac;
        }
    }

    pub fn clear(&mut self) {
        self.buffer.iter_mut().for_each(|s| *s = 0.0);
        self.write_frame = 0;
    }
}
