//! Engine configuration surface.
//!
//! A fixed set of tuning knobs, no free-form options. Per-session grace
//! intervals live on the session itself (`window::DEFAULT_GRACE_MINUTES`
//! when unspecified).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::duration::DurationConfig;

/// Tuning knobs for the attendance state engine and orphan reaper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum spacing between two accepted scans for the same
    /// (identity, room) pair. Default: 5.
    pub rapid_scan_threshold_seconds: i64,

    /// Active records older than this are force-closed by the reaper.
    /// Default: 24.
    pub orphan_max_age_hours: i64,

    /// Durations above this are flagged; the reaper caps force-closed
    /// records at it. Default: 18.
    pub max_reasonable_duration_hours: i64,

    /// Clamp for unexplained negative durations. Default: 1.
    pub min_reasonable_duration_minutes: i64,

    /// Half-width of the DST correction window. Default: 4.
    pub dst_transition_window_hours: i64,

    /// DST transition instants for the host locale, as wall-clock
    /// timestamps (e.g. `["2025-11-02T02:00:00"]`). Empty by default:
    /// with no known transitions, no DST correction is applied.
    pub dst_transitions: Vec<NaiveDateTime>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rapid_scan_threshold_seconds: 5,
            orphan_max_age_hours: 24,
            max_reasonable_duration_hours: 18,
            min_reasonable_duration_minutes: 1,
            dst_transition_window_hours: 4,
            dst_transitions: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// The duration-correction view of this configuration.
    #[must_use]
    pub fn duration_config(&self) -> DurationConfig {
        DurationConfig {
            max_reasonable_hours: self.max_reasonable_duration_hours,
            min_reasonable_minutes: self.min_reasonable_duration_minutes,
            dst_transition_window_hours: self.dst_transition_window_hours,
            dst_transitions: self.dst_transitions.clone(),
        }
    }
}
