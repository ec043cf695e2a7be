//! # JCut Common Library
//!
//! Shared code for the silence-skipping playback engine:
//! - Time domains and rate-aware conversions
//! - Settings (whole-object configuration) with validation and TOML loading
//! - Silence events, rate-change records and telemetry types
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use config::{AveragingMethod, Settings, StrategyKind, Tuning};
pub use error::{Error, Result};
pub use time::{MediaTime, RealTime, TimeDelta};
