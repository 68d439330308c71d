//! Timestamp and transport position utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a position in seconds to a duration.
///
/// Negative and non-finite values clamp to zero.
pub fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}

/// Format a transport position for display.
///
/// - Under an hour: `M:SS.s` (e.g. `3:07.5`)
/// - An hour or more: `H:MM:SS`
///
/// Negative positions (pre-roll) get a leading `-`.
pub fn format_position(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "--:--".to_string();
    }

    let sign = if seconds < 0.0 { "-" } else { "" };
    // Round to tenths first so 59.96 shows as 1:00.0, not 0:60.0
    let tenths = (seconds.abs() * 10.0).round() as u64;
    let whole = tenths / 10;

    if whole >= 3600 {
        let hours = whole / 3600;
        let mins = (whole % 3600) / 60;
        let secs = whole % 60;
        format!("{}{}:{:02}:{:02}", sign, hours, mins, secs)
    } else {
        let mins = whole / 60;
        let secs = whole % 60;
        format!("{}{}:{:02}.{}", sign, mins, secs, tenths % 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01
    }

    #[test]
    fn test_seconds_to_duration() {
        assert_eq!(seconds_to_duration(1.5), Duration::from_millis(1500));
        assert_eq!(seconds_to_duration(0.0), Duration::ZERO);
    }

    #[test]
    fn test_seconds_to_duration_clamps_invalid() {
        assert_eq!(seconds_to_duration(-3.0), Duration::ZERO);
        assert_eq!(seconds_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(seconds_to_duration(f64::INFINITY), Duration::ZERO);
    }

    #[test]
    fn test_format_position_short() {
        assert_eq!(format_position(0.0), "0:00.0");
        assert_eq!(format_position(7.25), "0:07.3");
        assert_eq!(format_position(187.5), "3:07.5");
    }

    #[test]
    fn test_format_position_rounds_into_next_minute() {
        assert_eq!(format_position(59.96), "1:00.0");
    }

    #[test]
    fn test_format_position_long() {
        assert_eq!(format_position(3600.0), "1:00:00");
        assert_eq!(format_position(3661.0), "1:01:01");
    }

    #[test]
    fn test_format_position_negative() {
        assert_eq!(format_position(-2.0), "-0:02.0");
    }

    #[test]
    fn test_format_position_non_finite() {
        assert_eq!(format_position(f64::NAN), "--:--");
    }
}
