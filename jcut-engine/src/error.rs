//! Error types for jcut-engine
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Pipeline and shadow failures never escape `attach()`: the controller turns them
//! into a downgrade to the always-sounded strategy.

use thiserror::Error;

/// Main error type for jcut-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Settings or settings-file errors
    #[error(transparent)]
    Common(#[from] jcut_common::Error),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// The element cannot expose its audio to a processing pipeline
    #[error("Audio pipeline error: {0}")]
    AudioPipeline(String),

    /// The shadow clone cannot be created or played
    #[error("Shadow playback unavailable: {0}")]
    ShadowUnavailable(String),

    /// The playback element rejected an operation
    #[error("Playback element error: {0}")]
    Element(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The controller task is gone
    #[error("Controller detached")]
    Detached,

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using jcut-engine Error
pub type Result<T> = std::result::Result<T, Error>;
