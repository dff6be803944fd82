//! Clock-style formatting for elapsed/total track times.

use std::time::Duration;

/// Extension trait for safe Duration conversions.
pub trait DurationExt {
    /// Convert duration to milliseconds as u64, saturating at `u64::MAX`.
    ///
    /// In practice, this is always safe because durations exceeding `u64::MAX`
    /// milliseconds would represent ~584 million years.
    fn as_millis_u64(&self) -> u64;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }
}

/// A millisecond count split into clock units, rounded to the nearest second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hms {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

/// Split `ms` into hours/minutes/seconds, rounding to the nearest second
/// with carry: 59 999 ms is one minute sharp, not 0:59.
#[must_use]
pub fn calc_hms(ms: u64) -> Hms {
    let total_secs = (ms + 500) / 1000;
    Hms {
        hours: total_secs / 3600,
        minutes: (total_secs / 60) % 60,
        seconds: total_secs % 60,
    }
}

/// Format the elapsed and total times as a matching pair.
///
/// Both strings take their shape from the total: hours appear only when the
/// total is at least one hour. Seconds are always zero-padded; minutes are
/// zero-padded only when hours are shown; the leading unit is never padded.
#[must_use]
pub fn format_time_pair(current_ms: u64, total_ms: u64) -> (String, String) {
    let total = calc_hms(total_ms);
    let current = calc_hms(current_ms);
    let with_hours = total.hours > 0;
    (render(current, with_hours), render(total, with_hours))
}

fn render(hms: Hms, with_hours: bool) -> String {
    if with_hours {
        format!("{}:{:02}:{:02}", hms.hours, hms.minutes, hms.seconds)
    } else {
        format!("{}:{:02}", hms.minutes, hms.seconds)
    }
}

/// Fraction of the track played, clamped to `0.0..=1.0`. Zero-length tracks
/// report zero rather than dividing by zero.
#[must_use]
pub fn progress_ratio(current_ms: u64, total_ms: u64) -> f64 {
    if total_ms == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)] // track times are far below 2^52 ms
    let ratio = current_ms as f64 / total_ms as f64;
    ratio.min(1.0)
}
