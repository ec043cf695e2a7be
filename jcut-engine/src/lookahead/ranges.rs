//! Predicted silence ranges on the intrinsic timeline

use jcut_common::MediaTime;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SilenceRange {
    pub start: MediaTime,
    pub end: MediaTime,
    /// `end` is a conservative lower bound; the silence has not ended yet
    pub pending: bool,
}

impl SilenceRange {
    pub fn new(start: MediaTime, end: MediaTime) -> Self {
        Self { start, end, pending: false }
    }

    pub fn pending(start: MediaTime, end: MediaTime) -> Self {
        Self { start, end, pending: true }
    }

    pub fn len(&self) -> f64 {
        self.end - self.start
    }
}

/// Finalized ranges kept sorted by start
///
/// Overlapping or duplicate entries are allowed; a resync can re-detect a range
/// that is already known.
#[derive(Debug, Clone)]
pub struct SilenceRanges {
    ranges: Vec<SilenceRange>,
    min_len: f64,
}

impl SilenceRanges {
    pub fn new(min_len: f64) -> Self {
        Self { ranges: Vec::new(), min_len }
    }

    /// Record a finalized range; ranges shorter than the minimum are discarded
    pub fn push(&mut self, start: MediaTime, end: MediaTime) -> bool {
        if !(end - start >= self.min_len) {
            return false;
        }
        let index = self.ranges.partition_point(|r| r.start <= start);
        self.ranges.insert(index, SilenceRange::new(start, end));
        true
    }

    /// Closest range whose end is strictly after `time`
    ///
    /// `pending` is the still-open range, if the shadow is currently in silence.
    pub fn next_after(&self, time: MediaTime, pending: Option<SilenceRange>) -> Option<SilenceRange> {
        let finalized = self.ranges.iter().find(|r| r.end > time).copied();
        let pending = pending.filter(|p| p.end > time && p.len() >= self.min_len);
        match (finalized, pending) {
            (Some(f), Some(p)) if p.start < f.start => Some(p),
            (Some(f), _) => Some(f),
            (None, p) => p,
        }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }
}
