//! Seek latency estimator
//!
//! Keeps the last few observed jump durations and predicts the next one as
//! their mean. Before any jump has been observed the configured default is used.

use jcut_common::{RealTime, TimeDelta};
use std::collections::VecDeque;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct SeekLatencyEstimator {
    history: VecDeque<TimeDelta>,
    capacity: usize,
    estimate: TimeDelta,
    seek_started_at: Option<RealTime>,
}

impl SeekLatencyEstimator {
    pub fn new(capacity: usize, default_latency: TimeDelta) -> Self {
        let capacity = capacity.max(1);
        let mut history = VecDeque::with_capacity(capacity);
        history.push_back(default_latency);
        Self {
            history,
            capacity,
            estimate: default_latency,
            seek_started_at: None,
        }
    }

    /// Predicted duration of the next jump
    pub fn next_estimate(&self) -> TimeDelta {
        self.estimate
    }

    /// Record one observed jump duration
    pub fn record(&mut self, latency: TimeDelta) {
        if !latency.is_finite() || latency < 0.0 {
            return;
        }
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(latency);
        self.estimate = self.history.iter().sum::<f64>() / self.history.len() as f64;
        trace!("Seek latency {:.3}s, estimate now {:.3}s", latency, self.estimate);
    }

    pub fn on_seek_started(&mut self, now: RealTime) {
        self.seek_started_at = Some(now);
    }

    /// Close the measurement opened by `on_seek_started`
    ///
    /// A completion without a known start is ignored.
    pub fn on_seek_completed(&mut self, now: RealTime) {
        if let Some(started) = self.seek_started_at.take() {
            self.record(now - started);
        }
    }
}
