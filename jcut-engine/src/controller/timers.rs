//! Timer queue of the control domain
//!
//! Scheduled actions are plain values keyed by a [`TimerId`]. The controller
//! pops due entries on every tick; nothing runs on its own.

use jcut_common::RealTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<A> {
    id: TimerId,
    due: RealTime,
    action: A,
}

#[derive(Debug)]
pub struct TimerQueue<A> {
    next_id: u64,
    entries: Vec<Entry<A>>,
}

impl<A> Default for TimerQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> TimerQueue<A> {
    pub fn new() -> Self {
        Self { next_id: 0, entries: Vec::new() }
    }

    /// Schedule `action` to fire at `due`; equal due times fire in scheduling order
    pub fn schedule(&mut self, due: RealTime, action: A) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let index = self.entries.partition_point(|e| e.due <= due);
        self.entries.insert(index, Entry { id, due, action });
        id
    }

    /// Returns false if the timer already fired or was cancelled
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Earliest entry due at or before `now`
    pub fn pop_due(&mut self, now: RealTime) -> Option<(TimerId, A)> {
        if self.entries.first().map_or(false, |e| e.due <= now) {
            let entry = self.entries.remove(0);
            return Some((entry.id, entry.action));
        }
        None
    }

    pub fn next_due(&self) -> Option<RealTime> {
        self.entries.first().map(|e| e.due)
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
