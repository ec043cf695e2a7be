//! Ready gate for asynchronously initialised components
//!
//! Calls that arrive while a component is still initialising are not blocked:
//! the newest one is parked in a single slot and handed back once the
//! component reports ready. Older parked values are replaced.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Uninitialized,
    Initializing,
    Ready,
}

#[derive(Debug)]
pub struct ReadyGate<T> {
    state: ReadyState,
    pending: Option<T>,
}

impl<T> Default for ReadyGate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReadyGate<T> {
    pub fn new() -> Self {
        Self { state: ReadyState::Uninitialized, pending: None }
    }

    pub fn state(&self) -> ReadyState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ReadyState::Ready
    }

    pub fn begin(&mut self) {
        self.state = ReadyState::Initializing;
    }

    /// Pass `value` through if ready, otherwise park it
    pub fn offer(&mut self, value: T) -> Option<T> {
        if self.is_ready() {
            return Some(value);
        }
        self.pending = Some(value);
        None
    }

    /// Mark ready and take whatever was parked meanwhile
    pub fn mark_ready(&mut self) -> Option<T> {
        self.state = ReadyState::Ready;
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pending_slot() {
        let mut gate = ReadyGate::new();
        assert_eq!(gate.state(), ReadyState::Uninitialized);
        gate.begin();
        assert_eq!(gate.offer(1), None);
        assert_eq!(gate.offer(2), None);
        assert!(gate.has_pending());
        assert_eq!(gate.mark_ready(), Some(2));
        assert_eq!(gate.offer(3), Some(3));
        assert!(!gate.has_pending());
    }
}
