//! Engine context shared by every attachment of one session
//!
//! The embedding application creates one context per page or session and hands
//! it to each attachment. Components borrow the clock and the sink from here
//! and never create their own.

use crate::audio::clock::{Clock, SystemClock};
use crate::audio::sink::AudioSink;
use std::sync::Arc;

#[derive(Clone)]
pub struct EngineContext {
    pub clock: Arc<dyn Clock>,
    pub sink: Arc<AudioSink>,
}

impl EngineContext {
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<AudioSink>) -> Self {
        Self { clock, sink }
    }

    /// Context driven by the wall clock
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock::new()), Arc::new(AudioSink::new()))
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("now", &self.clock.now())
            .field("sink_connections", &self.sink.connection_count())
            .finish()
    }
}
