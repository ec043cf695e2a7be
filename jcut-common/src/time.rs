//! Time domains and rate-aware conversions
//!
//! Two clocks are in play:
//!
//! 1. **MediaTime**: intrinsic position inside the content (what the element reports)
//! 2. **RealTime**: wall / audio-pipeline clock time
//!
//! Both are plain `f64` seconds. Crossing from one to the other always goes
//! through one of the rate-aware helpers below, never through ad hoc arithmetic.

use chrono::{DateTime, Utc};

/// Position inside the content, in seconds
pub type MediaTime = f64;

/// Pipeline / wall clock time, in seconds
pub type RealTime = f64;

/// Signed difference between two times on the same clock, in seconds
pub type TimeDelta = f64;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Unix time in fractional seconds, used for telemetry stamps
pub fn unix_time_secs() -> f64 {
    let ts = now();
    ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_micros()) / 1_000_000.0
}

/// How long an intrinsic `margin` lasts in real time when played at `speed`
pub fn realtime_margin(margin: TimeDelta, speed: f64) -> TimeDelta {
    margin / speed
}

/// Real duration of `intrinsic` media time played at `speed`
pub fn media_to_real(intrinsic: TimeDelta, speed: f64) -> TimeDelta {
    intrinsic / speed
}

/// Intrinsic media time covered by `real` seconds of playback at `speed`
pub fn real_to_media(real: TimeDelta, speed: f64) -> TimeDelta {
    real * speed
}

/// Duration a snippet would take if its rate changed from `old_speed` to `new_speed`
pub fn new_snippet_duration(duration: TimeDelta, old_speed: f64, new_speed: f64) -> TimeDelta {
    duration * old_speed / new_speed
}

/// Change in delay accumulated when a snippet recorded at `old_speed` is played at `new_speed`
///
/// Positive result: playing at `new_speed` takes longer, the delay line grows.
pub fn stretcher_delay_change(duration: TimeDelta, old_speed: f64, new_speed: f64) -> TimeDelta {
    new_snippet_duration(duration, old_speed, new_speed) - duration
}

/// Local time-compression ratio of a linear delay ramp
///
/// Output covering `end_time - start_time` seconds while the delay moves from
/// `start_delay` to `end_delay` consumes `(end - start) + (start_delay - end_delay)`
/// seconds of input.
pub fn stretch_compression_ratio(
    start_delay: TimeDelta,
    end_delay: TimeDelta,
    start_time: RealTime,
    end_time: RealTime,
) -> f64 {
    let original_duration = end_time - start_time;
    (original_duration + (start_delay - end_delay)) / original_duration
}

/// Pitch offset (semitones) that cancels the pitch change caused by `ratio`
pub fn compensating_semitones(ratio: f64) -> f64 {
    -12.0 * ratio.log2()
}

/// Divisor that never lets a zero duration turn into NaN or infinity
pub fn safe_divisor(duration: TimeDelta) -> TimeDelta {
    if duration == 0.0 {
        1.0
    } else {
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800);
        assert!(unix_time_secs() > 946_684_800.0);
    }

    #[test]
    fn test_realtime_margin_scales_with_speed() {
        assert_eq!(realtime_margin(0.2, 2.0), 0.1);
        assert_eq!(realtime_margin(0.2, 1.0), 0.2);
    }

    #[test]
    fn test_media_real_round_trip() {
        let real = media_to_real(3.0, 1.5);
        assert!((real_to_media(real, 1.5) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_delay_change_when_slowing_down_is_positive() {
        // 1s recorded at 2x takes 2s at 1x: delay grows by 1s
        assert!((stretcher_delay_change(1.0, 2.0, 1.0) - 1.0).abs() < 1e-12);
        assert!(stretcher_delay_change(1.0, 1.0, 2.0) < 0.0);
        assert_eq!(stretcher_delay_change(1.0, 1.5, 1.5), 0.0);
    }

    #[test]
    fn test_compression_ratio_and_pitch() {
        // Delay shrinks by 0.5s over 1s of output: 1.5s of input consumed
        let ratio = stretch_compression_ratio(0.5, 0.0, 10.0, 11.0);
        assert!((ratio - 1.5).abs() < 1e-12);
        assert!(compensating_semitones(ratio) < 0.0);

        let slowdown = stretch_compression_ratio(0.0, 0.5, 10.0, 11.0);
        assert!(slowdown < 1.0);
        assert!(compensating_semitones(slowdown) > 0.0);
    }

    #[test]
    fn test_safe_divisor() {
        assert_eq!(safe_divisor(0.0), 1.0);
        assert_eq!(safe_divisor(0.25), 0.25);
    }
}
