//! Lock-free channel out of the real-time audio domain
//!
//! Single-producer single-consumer ring buffer. The producer half lives inside a
//! processor running on the audio domain and only ever calls `try_push`; the
//! consumer half is drained by the controller on the control domain.
//!
//! Design:
//! - Producer never blocks and never allocates; a full buffer counts an overrun
//! - Consumer drains whatever is queued, in order
//! - Overrun counts are reported from the control domain, never from the audio domain

use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default channel capacity in messages
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Lock-free SPSC channel for small `Copy` messages
pub struct EventChannel<T> {
    buffer: HeapRb<T>,
    overruns: Arc<AtomicU64>,
}

impl<T> EventChannel<T> {
    /// Create a new channel
    ///
    /// # Arguments
    /// * `capacity` - Capacity in messages (default: 64)
    pub fn new(capacity: Option<usize>) -> Self {
        let capacity = capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY).max(1);
        debug!("Creating event channel with capacity: {} messages", capacity);
        Self {
            buffer: HeapRb::new(capacity),
            overruns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Split into producer (audio domain) and consumer (control domain) halves
    pub fn split(self) -> (EventProducer<T>, EventConsumer<T>) {
        let (prod, cons) = self.buffer.split();
        let producer = EventProducer {
            producer: prod,
            overruns: Arc::clone(&self.overruns),
        };
        let consumer = EventConsumer {
            consumer: cons,
            overruns: Arc::clone(&self.overruns),
            reported_overruns: 0,
        };
        (producer, consumer)
    }
}

/// Producer half, owned by a real-time processor
pub struct EventProducer<T> {
    producer: ringbuf::HeapProd<T>,
    overruns: Arc<AtomicU64>,
}

impl<T> EventProducer<T> {
    /// Push a message
    ///
    /// Returns false if the channel was full (overrun). Lock-free, no logging.
    #[inline]
    pub fn push(&mut self, message: T) -> bool {
        match self.producer.try_push(message) {
            Ok(()) => true,
            Err(_) => {
                self.overruns.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

/// Consumer half, drained on the control domain
pub struct EventConsumer<T> {
    consumer: ringbuf::HeapCons<T>,
    overruns: Arc<AtomicU64>,
    reported_overruns: u64,
}

impl<T> EventConsumer<T> {
    pub fn pop(&mut self) -> Option<T> {
        self.consumer.try_pop()
    }

    /// Pop every queued message in order
    pub fn drain_into(&mut self, mut sink: impl FnMut(T)) {
        self.report_overruns();
        while let Some(message) = self.consumer.try_pop() {
            sink(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    fn report_overruns(&mut self) {
        let total = self.overruns();
        if total > self.reported_overruns {
            warn!(
                "Event channel overrun: {} message(s) dropped (total: {})",
                total - self.reported_overruns,
                total
            );
            self.reported_overruns = total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_arrive_in_order() {
        let (mut tx, mut rx) = EventChannel::new(Some(4)).split();
        assert!(tx.push(1u32));
        assert!(tx.push(2));
        assert!(tx.push(3));

        let mut received = Vec::new();
        rx.drain_into(|m| received.push(m));
        assert_eq!(received, vec![1, 2, 3]);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_full_channel_counts_overrun() {
        let (mut tx, mut rx) = EventChannel::new(Some(2)).split();
        assert!(tx.push(1u8));
        assert!(tx.push(2));
        assert!(!tx.push(3));
        assert_eq!(rx.overruns(), 1);
        assert_eq!(rx.pop(), Some(1));
    }

    #[test]
    fn test_halves_move_across_threads() {
        let (mut tx, mut rx) = EventChannel::new(None).split();
        let handle = std::thread::spawn(move || {
            for i in 0..10u64 {
                while !tx.push(i) {}
            }
        });
        handle.join().unwrap();

        let mut received = Vec::new();
        rx.drain_into(|m| received.push(m));
        assert_eq!(received, (0..10).collect::<Vec<_>>());
    }
}
