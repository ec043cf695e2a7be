use jcut_common::{RealTime, TimeDelta};

/// Lets an action through at most once per interval
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: TimeDelta,
    last: Option<RealTime>,
}

impl Throttle {
    pub fn new(interval: TimeDelta) -> Self {
        Self { interval, last: None }
    }

    /// Whether the action may run at `now`; marks it as run if so
    pub fn try_acquire(&mut self, now: RealTime) -> bool {
        if !self.ready(now) {
            return false;
        }
        self.last = Some(now);
        true
    }

    pub fn ready(&self, now: RealTime) -> bool {
        self.last.map_or(true, |last| now - last >= self.interval)
    }

    /// Earliest time the next action may run
    pub fn next_allowed(&self) -> Option<RealTime> {
        self.last.map(|last| last + self.interval)
    }

    pub fn mark(&mut self, now: RealTime) {
        self.last = Some(now);
    }
}
