//! Playback element boundary
//!
//! The engine never owns media playback. It drives an element supplied by the
//! embedding application through [`PlaybackElement`], and asks that element for
//! a muted [`ShadowPlayback`] when it needs to look ahead.
//!
//! Every "connect" or "listen" operation hands back a [`Subscription`]. Dropping
//! or releasing it undoes the connection exactly once.

use crate::audio::types::AudioBlock;
use crate::error::Result;
use jcut_common::MediaTime;
use tokio::sync::broadcast;

/// Real-time processor attached to an element's audio stream
///
/// `process` is called on the audio domain: it must not block, allocate or log.
pub trait BlockProcessor: Send {
    fn process(&mut self, block: &mut AudioBlock<'_>);
}

/// Notifications published by a playback element
#[derive(Debug, Clone, PartialEq)]
pub enum ElementEvent {
    /// Playhead moved during normal playback (roughly once per rendered frame)
    PositionAdvanced { position: MediaTime },

    /// Playback paused by the user or the application
    Paused,

    /// Playback resumed
    Resumed,

    /// A new source was loaded, or the current one was emptied
    SourceChanged,

    /// Playback reached the end of the source
    Ended,

    /// A seek started (position change requested)
    SeekStarted,

    /// The seek finished and playback can continue
    SeekCompleted,
}

/// Capability set of an attached playback element
pub trait PlaybackElement: Send + Sync {
    fn position(&self) -> MediaTime;
    fn set_position(&self, position: MediaTime) -> Result<()>;
    fn rate(&self) -> f64;
    fn set_rate(&self, rate: f64) -> Result<()>;
    fn paused(&self) -> bool;
    fn ended(&self) -> bool;
    fn duration(&self) -> Option<MediaTime>;

    /// Sample rate of the stream handed to processors
    fn sample_rate(&self) -> u32;
    fn channel_count(&self) -> u16;

    /// Source whose audio may not be read or freely re-opened
    fn source_restricted(&self) -> bool {
        false
    }

    fn subscribe(&self) -> broadcast::Receiver<ElementEvent>;

    /// Insert a processor in the element's output path
    ///
    /// Processors run in connection order; the last one's output is what is heard.
    fn connect_processor(&self, processor: Box<dyn BlockProcessor>) -> Result<Subscription>;

    /// Create a muted, detached playback of the same source
    fn create_shadow(&self) -> Result<Box<dyn ShadowPlayback>>;
}

/// Muted detached playback used for prediction
pub trait ShadowPlayback: Send {
    fn position(&self) -> MediaTime;
    fn set_position(&self, position: MediaTime) -> Result<()>;
    fn rate(&self) -> f64;
    fn set_rate(&self, rate: f64) -> Result<()>;
    fn play(&self) -> Result<()>;
    fn pause(&self);
    fn paused(&self) -> bool;
    fn ended(&self) -> bool;
    fn duration(&self) -> Option<MediaTime>;

    /// Source loaded and able to play
    fn ready(&self) -> bool;

    /// Whether `time` lies inside a range this shadow has already rendered
    fn played_contains(&self, time: MediaTime) -> bool;

    fn sample_rate(&self) -> u32;
    fn connect_processor(&self, processor: Box<dyn BlockProcessor>) -> Result<Subscription>;
}

/// Handle that undoes one connection when released or dropped
pub struct Subscription {
    label: &'static str,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(label: &'static str, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            label,
            release: Some(Box::new(release)),
        }
    }

    /// Subscription with nothing to undo
    pub fn noop(label: &'static str) -> Self {
        Self { label, release: None }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Undo the connection; later calls do nothing
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_subscription_releases_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let mut sub = Subscription::new("test", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(sub.is_active());
        sub.release();
        sub.release();
        drop(sub);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_released_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        {
            let _sub = Subscription::new("scoped", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_element_event_variants() {
        let event = ElementEvent::PositionAdvanced { position: 1.5 };
        match event {
            ElementEvent::PositionAdvanced { position } => assert_eq!(position, 1.5),
            _ => panic!("Wrong event type"),
        }
        assert_ne!(ElementEvent::Paused, ElementEvent::Resumed);
    }
}
