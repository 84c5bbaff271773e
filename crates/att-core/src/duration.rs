//! Duration calculation with clock-anomaly correction.
//!
//! Scan timestamps come from wall clocks on scanner devices, so an interval
//! can come out negative: device clocks drift, daylight-saving transitions
//! rewind the clock, and a time-out recorded against the session's date can
//! land before its time-in when the session crossed midnight. This module
//! always produces a non-negative duration plus the list of corrections it
//! applied; it never fails, because duration display must not block the
//! scan path.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Configuration for duration correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationConfig {
    /// Durations above this are flagged (not truncated). Default: 18.
    pub max_reasonable_hours: i64,

    /// Negative intervals that cannot be explained are clamped to this.
    /// Default: 1.
    pub min_reasonable_minutes: i64,

    /// Half-width of the window around each DST transition instant within
    /// which a negative interval is attributed to the transition. Default: 4.
    pub dst_transition_window_hours: i64,

    /// DST transition instants for the host locale, supplied by the caller.
    /// Empty by default: with no known transitions, no DST correction is
    /// ever applied.
    pub dst_transitions: Vec<NaiveDateTime>,
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            max_reasonable_hours: 18,
            min_reasonable_minutes: 1,
            dst_transition_window_hours: 4,
            dst_transitions: Vec::new(),
        }
    }
}

/// A correction or warning attached to a computed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationCorrection {
    /// One hour added to undo a daylight-saving rewind.
    DstTransition,
    /// Twenty-four hours added because the wall clock wrapped past midnight.
    DayBoundary,
    /// Unexplained negative interval clamped to the configured minimum.
    NegativeClamped,
    /// Result exceeds the maximum reasonable duration; kept, but flagged.
    ExtremeDuration,
}

impl DurationCorrection {
    /// Stable string form for outcome warnings and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DstTransition => "dst_transition_corrected",
            Self::DayBoundary => "day_boundary_corrected",
            Self::NegativeClamped => "negative_duration_corrected",
            Self::ExtremeDuration => "extreme_duration",
        }
    }
}

impl std::fmt::Display for DurationCorrection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A corrected, non-negative duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectedDuration {
    /// Full-precision corrected duration.
    pub duration: Duration,
    /// Whole minutes (truncated) for reporting.
    pub minutes: i64,
    /// Corrections and warnings applied, in order.
    pub corrections: Vec<DurationCorrection>,
}

/// Computes the corrected elapsed time between `time_in` and `time_out`.
///
/// Correction strategies for a negative raw delta, tried in order:
///
/// 1. The interval falls within the configured window of a known DST
///    transition: add one hour and recompute.
/// 2. The negative magnitude is consistent with a same-clock midnight
///    wraparound (adding 24 h lands within the maximum reasonable
///    duration): add 24 h.
/// 3. Otherwise treat as clock-synchronization noise and clamp to the
///    configured minimum.
#[must_use]
pub fn compute_duration(
    time_in: NaiveDateTime,
    time_out: NaiveDateTime,
    config: &DurationConfig,
) -> CorrectedDuration {
    let mut corrections = Vec::new();
    let mut delta = time_out - time_in;

    if delta < Duration::zero() {
        if spans_dst_transition(time_in, time_out, config) {
            tracing::warn!(
                %time_in, %time_out,
                "negative duration within DST transition window, adding one hour"
            );
            corrections.push(DurationCorrection::DstTransition);
            delta += Duration::hours(1);
        }

        if delta < Duration::zero() {
            let wrapped = delta + Duration::hours(24);
            if wrapped > Duration::zero() && wrapped <= Duration::hours(config.max_reasonable_hours)
            {
                tracing::warn!(
                    %time_in, %time_out,
                    "negative duration consistent with midnight wraparound, adding 24h"
                );
                corrections.push(DurationCorrection::DayBoundary);
                delta = wrapped;
            } else {
                tracing::warn!(
                    %time_in, %time_out,
                    "unexplained negative duration, clamping to minimum"
                );
                corrections.push(DurationCorrection::NegativeClamped);
                delta = Duration::minutes(config.min_reasonable_minutes);
            }
        }
    }

    if delta > Duration::hours(config.max_reasonable_hours) {
        // Kept as-is so genuinely long presence stays visible to the reaper.
        corrections.push(DurationCorrection::ExtremeDuration);
    }

    CorrectedDuration {
        minutes: delta.num_minutes(),
        duration: delta,
        corrections,
    }
}

/// Whether the interval falls within the window of any configured DST
/// transition instant.
fn spans_dst_transition(
    time_in: NaiveDateTime,
    time_out: NaiveDateTime,
    config: &DurationConfig,
) -> bool {
    let window = Duration::hours(config.dst_transition_window_hours);
    let (lo, hi) = if time_in <= time_out {
        (time_in, time_out)
    } else {
        (time_out, time_in)
    };
    config
        .dst_transitions
        .iter()
        .any(|&transition| lo <= transition + window && hi >= transition - window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn same_day_interval_is_exact_with_no_warnings() {
        let result = compute_duration(dt(10, 8, 0), dt(10, 9, 15), &DurationConfig::default());
        assert_eq!(result.minutes, 75);
        assert!(result.corrections.is_empty());
    }

    #[test]
    fn sub_minute_precision_is_retained_internally() {
        let time_in = dt(10, 8, 0);
        let time_out = time_in + Duration::seconds(150);
        let result = compute_duration(time_in, time_out, &DurationConfig::default());
        assert_eq!(result.minutes, 2);
        assert_eq!(result.duration, Duration::seconds(150));
    }

    #[test]
    fn midnight_wraparound_is_corrected() {
        // time_out recorded against the same date: 23:50 -> 00:10 reads as
        // -23h40m raw. Corrected to 20 minutes.
        let result = compute_duration(dt(10, 23, 50), dt(10, 0, 10), &DurationConfig::default());
        assert_eq!(result.minutes, 20);
        assert_eq!(result.corrections, vec![DurationCorrection::DayBoundary]);
    }

    #[test]
    fn small_negative_noise_clamps_to_minimum() {
        let time_in = dt(10, 8, 0);
        let time_out = time_in - Duration::seconds(30);
        let result = compute_duration(time_in, time_out, &DurationConfig::default());
        assert_eq!(result.minutes, 1);
        assert_eq!(result.corrections, vec![DurationCorrection::NegativeClamped]);
    }

    #[test]
    fn dst_rewind_near_transition_adds_an_hour() {
        // Fall-back transition at 02:00; clock rewound mid-interval so the
        // recorded time_out is 40 minutes before time_in.
        let config = DurationConfig {
            dst_transitions: vec![dt(10, 2, 0)],
            ..DurationConfig::default()
        };
        let result = compute_duration(dt(10, 1, 50), dt(10, 1, 10), &config);
        assert_eq!(result.minutes, 20);
        assert_eq!(result.corrections, vec![DurationCorrection::DstTransition]);
    }

    #[test]
    fn dst_correction_ignored_far_from_transition() {
        let config = DurationConfig {
            dst_transitions: vec![dt(10, 2, 0)],
            ..DurationConfig::default()
        };
        // Noon interval is outside the +/-4h window; falls through to clamp.
        let time_in = dt(10, 12, 0);
        let time_out = time_in - Duration::minutes(40);
        let result = compute_duration(time_in, time_out, &config);
        assert_eq!(result.corrections, vec![DurationCorrection::NegativeClamped]);
    }

    #[test]
    fn extreme_duration_is_flagged_not_truncated() {
        let result = compute_duration(dt(10, 8, 0), dt(11, 8, 0), &DurationConfig::default());
        assert_eq!(result.minutes, 24 * 60);
        assert_eq!(result.corrections, vec![DurationCorrection::ExtremeDuration]);
    }

    #[test]
    fn zero_duration_is_not_corrected() {
        let result = compute_duration(dt(10, 8, 0), dt(10, 8, 0), &DurationConfig::default());
        assert_eq!(result.minutes, 0);
        assert!(result.corrections.is_empty());
    }
}
