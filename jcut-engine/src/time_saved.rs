//! Time-saved accounting
//!
//! Playback is cut into snippets at every rate change, sounded-speed change and
//! jump. Each closed snippet is folded into four running totals, either by plain
//! addition (`AllTime`) or by exponential-decay blending (`Exponential`), so the
//! totals describe either the whole session or its recent past.
//!
//! The snippet stopwatch runs on pipeline time and stops while the element is
//! paused.

use jcut_common::events::TimeSavedTotals;
use jcut_common::time::safe_divisor;
use jcut_common::{AveragingMethod, RealTime, Settings, TimeDelta};
use tracing::debug;

/// Time constant of an exponential average whose last `period` seconds make up
/// `weight` of the total
pub fn decay_time_constant(weight: f64, period: f64) -> f64 {
    period / (weight / (1.0 - weight) + 1.0).ln()
}

/// Contribution of one snippet of `duration` real seconds played at `speed`
fn snippet_totals(duration: TimeDelta, speed: f64, sounded_speed: f64) -> TimeSavedTotals {
    let intrinsic = duration * speed;
    let would_have_lasted_if_sounded = intrinsic / sounded_speed;
    TimeSavedTotals {
        saved_vs_sounded: would_have_lasted_if_sounded - duration,
        saved_vs_intrinsic: intrinsic - duration,
        would_have_lasted_if_sounded,
        would_have_lasted_if_intrinsic: intrinsic,
    }
}

fn blend(total: f64, value: f64, duration: TimeDelta, tau: f64) -> f64 {
    let decay = (-duration / tau).exp();
    total * decay + tau * (1.0 - decay) * value / safe_divisor(duration)
}

#[derive(Debug, Clone)]
pub struct TimeSavedAccumulator {
    totals: TimeSavedTotals,
    method: AveragingMethod,
    decay_time_constant: f64,
    current_rate: f64,
    sounded_speed: f64,
    snippet_started_at: RealTime,
    paused_at: Option<RealTime>,
    paused_in_snippet: TimeDelta,
}

impl TimeSavedAccumulator {
    pub fn new(settings: &Settings, current_rate: f64, now: RealTime, paused: bool) -> Self {
        Self {
            totals: TimeSavedTotals::default(),
            method: settings.time_saved_averaging,
            decay_time_constant: decay_time_constant(
                settings.time_saved_exponential_weight,
                settings.time_saved_averaging_window,
            ),
            current_rate,
            sounded_speed: settings.sounded_speed,
            snippet_started_at: now,
            paused_at: paused.then_some(now),
            paused_in_snippet: 0.0,
        }
    }

    pub fn method(&self) -> AveragingMethod {
        self.method
    }

    pub fn decay_time_constant(&self) -> f64 {
        self.decay_time_constant
    }

    /// Playing time of the snippet that is still open
    pub fn pending_snippet_duration(&self, now: RealTime) -> TimeDelta {
        let until = self.paused_at.unwrap_or(now);
        (until - self.snippet_started_at - self.paused_in_snippet).max(0.0)
    }

    fn fold(&self, totals: &mut TimeSavedTotals, duration: TimeDelta) {
        let snippet = snippet_totals(duration, self.current_rate, self.sounded_speed);
        match self.method {
            AveragingMethod::AllTime => {
                totals.saved_vs_sounded += snippet.saved_vs_sounded;
                totals.saved_vs_intrinsic += snippet.saved_vs_intrinsic;
                totals.would_have_lasted_if_sounded += snippet.would_have_lasted_if_sounded;
                totals.would_have_lasted_if_intrinsic += snippet.would_have_lasted_if_intrinsic;
            }
            AveragingMethod::Exponential => {
                let tau = self.decay_time_constant;
                totals.saved_vs_sounded = blend(totals.saved_vs_sounded, snippet.saved_vs_sounded, duration, tau);
                totals.saved_vs_intrinsic =
                    blend(totals.saved_vs_intrinsic, snippet.saved_vs_intrinsic, duration, tau);
                totals.would_have_lasted_if_sounded = blend(
                    totals.would_have_lasted_if_sounded,
                    snippet.would_have_lasted_if_sounded,
                    duration,
                    tau,
                );
                totals.would_have_lasted_if_intrinsic = blend(
                    totals.would_have_lasted_if_intrinsic,
                    snippet.would_have_lasted_if_intrinsic,
                    duration,
                    tau,
                );
            }
        }
    }

    /// Close the open snippet at `now` and start a new one
    pub fn append_pending_snippet(&mut self, now: RealTime) {
        let duration = self.pending_snippet_duration(now);
        let mut totals = self.totals;
        self.fold(&mut totals, duration);
        self.totals = totals;

        self.snippet_started_at = now;
        self.paused_in_snippet = 0.0;
        if self.paused_at.is_some() {
            self.paused_at = Some(now);
        }
    }

    /// Element rate changed to `rate`
    pub fn on_rate_change(&mut self, now: RealTime, rate: f64) {
        if rate == self.current_rate {
            return;
        }
        self.append_pending_snippet(now);
        self.current_rate = rate;
    }

    pub fn on_sounded_speed_change(&mut self, now: RealTime, sounded_speed: f64) {
        if sounded_speed == self.sounded_speed {
            return;
        }
        self.append_pending_snippet(now);
        self.sounded_speed = sounded_speed;
    }

    /// The element jumped `delta` intrinsic seconds forward, taking `latency` real seconds
    ///
    /// Rate is undefined across a jump, so it is accounted for directly.
    pub fn on_jump(&mut self, now: RealTime, delta: TimeDelta, latency: TimeDelta) {
        self.append_pending_snippet(now);

        let would_have_lasted_if_sounded = delta / self.sounded_speed;
        self.totals.saved_vs_sounded += would_have_lasted_if_sounded - latency;
        self.totals.saved_vs_intrinsic += delta - latency;
        self.totals.would_have_lasted_if_sounded += would_have_lasted_if_sounded;
        self.totals.would_have_lasted_if_intrinsic += delta;
        debug!(
            "Jump of {:.3}s saved {:.3}s (latency {:.3}s)",
            delta,
            would_have_lasted_if_sounded - latency,
            latency
        );
    }

    pub fn on_paused(&mut self, now: RealTime) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub fn on_resumed(&mut self, now: RealTime) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_in_snippet += (now - paused_at).max(0.0);
        }
    }

    /// Replace the averaging policy; the open snippet is closed under the old one
    pub fn update_settings(&mut self, now: RealTime, settings: &Settings) {
        self.append_pending_snippet(now);
        self.method = settings.time_saved_averaging;
        self.decay_time_constant = decay_time_constant(
            settings.time_saved_exponential_weight,
            settings.time_saved_averaging_window,
        );
        self.sounded_speed = settings.sounded_speed;
    }

    /// Totals including the snippet still open at `now`
    pub fn totals(&self, now: RealTime) -> TimeSavedTotals {
        let mut totals = self.totals;
        self.fold(&mut totals, self.pending_snippet_duration(now));
        totals
    }

    /// Totals as of the last closed snippet
    pub fn closed_totals(&self) -> TimeSavedTotals {
        self.totals
    }
}
