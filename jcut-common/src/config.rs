//! Engine settings, validation and settings-file resolution
//!
//! Settings are delivered to the engine as a whole object. A changed field is
//! never patched in place; the embedding application builds a new `Settings`
//! and hands it over.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit settings file
pub const CONFIG_ENV_VAR: &str = "JCUT_CONFIG";

/// Longest accepted margin before sounded content (intrinsic seconds)
pub const MAX_MARGIN_BEFORE: f64 = 0.5;

/// Highest accepted playback speed
pub const MAX_SPEED: f64 = 16.0;

/// Which controller drives an attached element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Rate follows the live output, margin-before handled by the stretcher
    #[default]
    Stretching,
    /// A shadow clone predicts silence ahead of the playhead
    Cloning,
    /// Constant sounded speed, no skipping
    AlwaysSounded,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Stretching => write!(f, "stretching"),
            StrategyKind::Cloning => write!(f, "cloning"),
            StrategyKind::AlwaysSounded => write!(f, "always_sounded"),
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = Error;

    /// Accepts the snake_case names plus hyphenated spellings
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "stretching" => Ok(StrategyKind::Stretching),
            "cloning" => Ok(StrategyKind::Cloning),
            "always_sounded" | "alwayssounded" => Ok(StrategyKind::AlwaysSounded),
            other => Err(invalid("strategy", format!("unknown strategy '{}'", other))),
        }
    }
}

/// Averaging policy of the time-saved totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AveragingMethod {
    AllTime,
    #[default]
    Exponential,
}

/// Empirically tuned constants of the decision and prediction logic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Number of observed jump latencies kept for the running mean
    pub seek_history_len: usize,
    /// Assumed jump latency before any jump has been observed (s)
    pub default_seek_latency: f64,
    /// Scheduled action is dropped if the element drifted further than this (s)
    pub seek_cancel_tolerance: f64,
    /// Cloning: speed switches that amortize one desync-correcting jump
    pub cloning_desync_period: u32,
    /// Stretching: silence starts between two position nudges
    pub stretching_desync_period: u32,
    /// Shortest real duration a temporary speed-up must last (s)
    pub min_speedup_real_duration: f64,
    /// Predicted ranges shorter than this are discarded (s)
    pub min_silence_range: f64,
    /// Minimum spacing of shadow resyncs and lookahead re-creations (s)
    pub lookahead_throttle: f64,
    /// Period of the shadow rate adjustment (s)
    pub lookahead_rate_interval: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            seek_history_len: 5,
            default_seek_latency: 0.150,
            seek_cancel_tolerance: 0.5,
            cloning_desync_period: 20,
            stretching_desync_period: 10,
            min_speedup_real_duration: 0.05,
            min_silence_range: 0.010,
            lookahead_throttle: 1.0,
            lookahead_rate_interval: 3.0,
        }
    }
}

/// Whole-object engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Rectified amplitude at or above which a sample counts as loud (0..1)
    pub volume_threshold: f64,
    pub sounded_speed: f64,
    pub silence_speed: f64,
    /// Sounded context kept before a loud part (intrinsic seconds)
    pub margin_before: f64,
    /// Sounded context kept after a loud part (intrinsic seconds)
    pub margin_after: f64,
    pub enable_desync_correction: bool,
    pub strategy: StrategyKind,
    pub time_saved_averaging: AveragingMethod,
    /// Averaging window for the exponential policy (s)
    pub time_saved_averaging_window: f64,
    /// Share of the total the window accounts for (0..1, exclusive)
    pub time_saved_exponential_weight: f64,
    pub tuning: Tuning,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            volume_threshold: 0.005,
            sounded_speed: 1.0,
            silence_speed: 2.5,
            margin_before: 0.0,
            margin_after: 0.100,
            enable_desync_correction: false,
            strategy: StrategyKind::Stretching,
            time_saved_averaging: AveragingMethod::Exponential,
            time_saved_averaging_window: 600.0,
            time_saved_exponential_weight: 0.95,
            tuning: Tuning::default(),
        }
    }
}

fn invalid(field: &'static str, reason: String) -> Error {
    Error::InvalidSetting { field, reason }
}

fn check_speed(field: &'static str, value: f64) -> Result<()> {
    if !(value > 0.0 && value <= MAX_SPEED) {
        return Err(invalid(field, format!("{} out of range (0, {}]", value, MAX_SPEED)));
    }
    Ok(())
}

impl Settings {
    /// Parse settings from TOML text; missing fields take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&text)?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Resolve the settings file and load it, falling back to defaults
    ///
    /// A missing file is not an error: a warning is logged and defaults are used.
    /// A file that exists but does not parse or validate is an error.
    pub fn load_or_default(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                warn!("Settings file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.volume_threshold) {
            return Err(invalid(
                "volume_threshold",
                format!("{} out of range [0.0, 1.0]", self.volume_threshold),
            ));
        }
        check_speed("sounded_speed", self.sounded_speed)?;
        check_speed("silence_speed", self.silence_speed)?;
        if !(self.margin_before >= 0.0 && self.margin_before <= MAX_MARGIN_BEFORE) {
            return Err(invalid(
                "margin_before",
                format!("{} out of range [0.0, {}]", self.margin_before, MAX_MARGIN_BEFORE),
            ));
        }
        if !(self.margin_after >= 0.0) {
            return Err(invalid("margin_after", format!("{} is negative", self.margin_after)));
        }
        if !(self.time_saved_averaging_window > 0.0) {
            return Err(invalid(
                "time_saved_averaging_window",
                format!("{} must be positive", self.time_saved_averaging_window),
            ));
        }
        let weight = self.time_saved_exponential_weight;
        if !(weight > 0.0 && weight < 1.0) {
            return Err(invalid(
                "time_saved_exponential_weight",
                format!("{} out of range (0.0, 1.0)", weight),
            ));
        }
        if self.tuning.seek_history_len == 0 {
            return Err(invalid("tuning.seek_history_len", "must be at least 1".to_string()));
        }
        if self.tuning.cloning_desync_period == 0 || self.tuning.stretching_desync_period == 0 {
            return Err(invalid("tuning", "desync periods must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Threshold after which quiet audio counts as silence, in real seconds
    pub fn silence_duration_threshold(&self, speed: f64) -> f64 {
        crate::time::realtime_margin(self.margin_after + self.margin_before, speed)
    }
}

/// Settings file resolution, highest priority first:
/// 1. Command-line argument
/// 2. `JCUT_CONFIG` environment variable
/// 3. `<config_dir>/jcut/settings.toml`
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// OS-dependent default settings file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("jcut").join("settings.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.strategy, StrategyKind::Stretching);
        assert_eq!(settings.tuning.seek_history_len, 5);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            silence_speed = 4.0
            strategy = "cloning"

            [tuning]
            seek_cancel_tolerance = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(settings.silence_speed, 4.0);
        assert_eq!(settings.strategy, StrategyKind::Cloning);
        assert_eq!(settings.tuning.seek_cancel_tolerance, 0.25);
        assert_eq!(settings.tuning.cloning_desync_period, 20);
        assert_eq!(settings.sounded_speed, 1.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut settings = Settings::default();
        settings.volume_threshold = 1.5;
        assert!(matches!(
            settings.validate(),
            Err(Error::InvalidSetting { field: "volume_threshold", .. })
        ));

        let mut settings = Settings::default();
        settings.silence_speed = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.margin_before = 0.8;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.time_saved_exponential_weight = 1.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_unknown_strategy_is_parse_error() {
        let result = Settings::from_toml_str("strategy = \"teleport\"");
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_silence_duration_threshold() {
        let mut settings = Settings::default();
        settings.margin_before = 0.05;
        settings.margin_after = 0.15;
        assert!((settings.silence_duration_threshold(2.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(StrategyKind::AlwaysSounded.to_string(), "always_sounded");
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("cloning".parse::<StrategyKind>().unwrap(), StrategyKind::Cloning);
        assert_eq!("Always-Sounded".parse::<StrategyKind>().unwrap(), StrategyKind::AlwaysSounded);
        assert!("teleport".parse::<StrategyKind>().is_err());
    }
}
