//! Simulated playback host
//!
//! A [`SimulatedElement`] stands in for a browser-style media element: it plays
//! synthetic or decoded media on a manual clock, runs connected processors on
//! each block and can spawn muted shadows. [`SimulationRun`] drives a controller
//! against it. Used by the `jcut-sim` binary, the benches and the integration
//! tests.

pub mod element;
pub mod media;
pub mod run;

pub use element::{SimOptions, SimulatedElement, SimulatedShadow};
pub use media::{Segment, SimulatedMedia, SOUNDED_AMPLITUDE};
pub use run::SimulationRun;
