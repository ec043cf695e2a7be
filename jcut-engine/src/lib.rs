//! # JCut Engine Library (jcut-engine)
//!
//! Real-time silence skipping for an externally owned playback element.
//!
//! **Purpose:** Watch the audio an element plays, classify it as sounded or
//! silent, and speed through (or jump over) the silent parts while keeping
//! margins of context around sounded content. Report how much time was saved.
//!
//! **Architecture:** Two domains. Real-time [`BlockProcessor`]s (volume smoother,
//! silence classifier, stretcher) run on the audio domain and hand events over
//! lock-free channels. The [`controller`] runs on the control domain, reacting to
//! those events, to element notifications and to its own timers. One of three
//! strategies drives each attached element:
//!
//! - `stretching`: switch rate on the live signal, pre-compensate `margin_before`
//!   with a delay line and pitch-corrected time stretch
//! - `cloning`: a muted shadow playback runs ahead to find silences, which are
//!   then jumped over or sped through
//! - `always_sounded`: constant sounded speed
//!
//! [`attach`] spawns an async controller task for real hosts; [`sim`] provides a
//! deterministic simulated element for the CLI, tests and benches.

pub mod audio;
pub mod context;
pub mod controller;
pub mod element;
pub mod error;
pub mod lookahead;
pub mod seek_estimator;
pub mod sim;
pub mod stretch;
pub mod time_saved;

pub use context::EngineContext;
pub use controller::{attach, AttachHandle, ElementController};
pub use element::{BlockProcessor, ElementEvent, PlaybackElement, ShadowPlayback, Subscription};
pub use error::{Error, Result};
pub use seek_estimator::SeekLatencyEstimator;
pub use time_saved::TimeSavedAccumulator;
