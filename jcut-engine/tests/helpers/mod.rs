//! Test helper modules for jcut-engine integration tests
//!
//! Provides reusable test infrastructure components:
//! - Scenario builders: media with known sounded/silent layout, settings presets
//! - WAV generation for decoder tests

#![allow(dead_code)]

pub mod audio_generator;
pub mod scenario;

pub use audio_generator::{generate_gapped_wav, generate_sine_wav};
pub use scenario::{all_time, cloning, element, stretching, with_options};
