//! Scheduled parameter automation
//!
//! A parameter whose value over time is described by a sorted list of events:
//! "jump to value at time" and "ramp linearly to value, arriving at time".
//! Between events the value holds; a ramp interpolates from the event before it.
//!
//! Storage is preallocated. Events entirely in the past are pruned with
//! [`ParamAutomation::prune_before`] so the list stays short on the audio domain.

use jcut_common::RealTime;

/// Events kept per parameter before the oldest is folded into the base value
pub const MAX_AUTOMATION_EVENTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
enum EventKind {
    Set,
    LinearRamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AutomationEvent {
    time: RealTime,
    value: f64,
    kind: EventKind,
}

#[derive(Debug, Clone)]
pub struct ParamAutomation {
    base_value: f64,
    events: Vec<AutomationEvent>,
}

impl ParamAutomation {
    pub fn new(value: f64) -> Self {
        Self {
            base_value: value,
            events: Vec::with_capacity(MAX_AUTOMATION_EVENTS),
        }
    }

    fn insert(&mut self, event: AutomationEvent) {
        if self.events.len() == MAX_AUTOMATION_EVENTS {
            let oldest = self.events.remove(0);
            self.base_value = oldest.value;
        }
        // Events at equal times keep insertion order
        let index = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(index, event);
    }

    pub fn set_value_at_time(&mut self, value: f64, time: RealTime) {
        self.insert(AutomationEvent { time, value, kind: EventKind::Set });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, time: RealTime) {
        self.insert(AutomationEvent { time, value, kind: EventKind::LinearRamp });
    }

    /// Remove every event scheduled at or after `time`
    pub fn cancel_scheduled_values(&mut self, time: RealTime) {
        let keep = self.events.partition_point(|e| e.time < time);
        self.events.truncate(keep);
    }

    /// Drop all events and hold `value` from now on
    pub fn reset(&mut self, value: f64) {
        self.events.clear();
        self.base_value = value;
    }

    /// Forget events whose effect is fully in the past at `time`
    pub fn prune_before(&mut self, time: RealTime) {
        let mut drop = 0;
        while drop + 1 < self.events.len() && self.events[drop + 1].time <= time {
            drop += 1;
        }
        if drop > 0 {
            self.base_value = self.events[drop - 1].value;
            self.events.drain(..drop);
        }
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Value of the parameter at `time`
    #[inline]
    pub fn value_at(&self, time: RealTime) -> f64 {
        let index = self.events.partition_point(|e| e.time <= time);
        let (prev_time, prev_value) = match index.checked_sub(1).map(|i| self.events[i]) {
            Some(prev) => (Some(prev.time), prev.value),
            None => (None, self.base_value),
        };

        match (self.events.get(index), prev_time) {
            (Some(next), Some(t0)) if next.kind == EventKind::LinearRamp && next.time > t0 => {
                let progress = (time - t0) / (next.time - t0);
                prev_value + (next.value - prev_value) * progress
            }
            _ => prev_value,
        }
    }
}
