//! Session window evaluation.
//!
//! Maps a scan instant to one of five window phases and, independently,
//! decides lateness for time-in events.
//!
//! The two predicates are deliberately decoupled: a time-in during the
//! grace-in interval is accepted *and on time*, while a time-in at or after
//! the scheduled start is late even though it is also accepted. Earlier
//! systems conflated "accepted during grace" with "late" and produced wrong
//! lateness flags for early arrivals.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Default grace interval before start and after end, in minutes.
pub const DEFAULT_GRACE_MINUTES: i64 = 15;

/// A session's scheduled occupancy window, including grace intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    /// Scheduled start (wall clock).
    pub starts_at: NaiveDateTime,
    /// Scheduled end (wall clock).
    pub ends_at: NaiveDateTime,
    /// Accepted early-arrival interval before `starts_at`, in minutes.
    pub grace_in_minutes: i64,
    /// Accepted late-departure interval after `ends_at`, in minutes.
    pub grace_out_minutes: i64,
}

/// Where an instant falls relative to a session window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPhase {
    /// Before the grace-in interval opens. Scans are rejected.
    TooEarly,
    /// Inside the grace-in interval: accepted, on time.
    GraceIn,
    /// Between scheduled start and end (inclusive).
    InSession,
    /// Inside the grace-out interval after the scheduled end.
    GraceOut,
    /// After the grace-out interval. Scans are rejected.
    Closed,
}

impl WindowPhase {
    /// Whether the engine proceeds past rejection in this phase.
    #[must_use]
    pub const fn allows_scan(self) -> bool {
        matches!(self, Self::GraceIn | Self::InSession | Self::GraceOut)
    }
}

impl SessionWindow {
    #[must_use]
    pub fn new(starts_at: NaiveDateTime, ends_at: NaiveDateTime) -> Self {
        Self {
            starts_at,
            ends_at,
            grace_in_minutes: DEFAULT_GRACE_MINUTES,
            grace_out_minutes: DEFAULT_GRACE_MINUTES,
        }
    }

    /// First instant at which a scan is accepted.
    #[must_use]
    pub fn opens_at(&self) -> NaiveDateTime {
        self.starts_at - Duration::minutes(self.grace_in_minutes)
    }

    /// Last instant at which a scan is accepted.
    #[must_use]
    pub fn closes_at(&self) -> NaiveDateTime {
        self.ends_at + Duration::minutes(self.grace_out_minutes)
    }

    /// Classifies `t` into a window phase.
    #[must_use]
    pub fn phase_at(&self, t: NaiveDateTime) -> WindowPhase {
        if t < self.opens_at() {
            WindowPhase::TooEarly
        } else if t < self.starts_at {
            WindowPhase::GraceIn
        } else if t <= self.ends_at {
            WindowPhase::InSession
        } else if t <= self.closes_at() {
            WindowPhase::GraceOut
        } else {
            WindowPhase::Closed
        }
    }

    /// Lateness predicate for time-in events. Independent of the phase:
    /// any arrival at or after the scheduled start is late.
    #[must_use]
    pub fn is_late(&self, t: NaiveDateTime) -> bool {
        t >= self.starts_at
    }

    /// Remaining wait before the window opens, for too-early rejections.
    ///
    /// Returns zero once the window has opened.
    #[must_use]
    pub fn wait_until_open(&self, t: NaiveDateTime) -> Duration {
        (self.opens_at() - t).max(Duration::zero())
    }

    /// Validates the window's shape.
    ///
    /// An inverted window (end at or before start) is an error; unusually
    /// short or long sessions are accepted with advisory warnings.
    pub fn validate(&self) -> Result<Vec<String>, InvalidWindow> {
        if self.ends_at <= self.starts_at {
            return Err(InvalidWindow {
                starts_at: self.starts_at,
                ends_at: self.ends_at,
            });
        }
        let mut warnings = Vec::new();
        let length = self.ends_at - self.starts_at;
        if length < Duration::minutes(30) {
            warnings.push(format!(
                "session is very short ({} minutes)",
                length.num_minutes()
            ));
        }
        if length > Duration::hours(12) {
            warnings.push(format!(
                "session is very long ({} hours)",
                length.num_hours()
            ));
        }
        Ok(warnings)
    }
}

/// A session window whose end is not after its start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidWindow {
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
}

impl std::fmt::Display for InvalidWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "session end {} is not after start {}",
            self.ends_at, self.starts_at
        )
    }
}

impl std::error::Error for InvalidWindow {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> SessionWindow {
        // 08:00 - 09:00, 15 min grace either side
        SessionWindow::new(at(8, 0, 0), at(9, 0, 0))
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn phase_boundaries() {
        let w = window();
        assert_eq!(w.phase_at(at(7, 44, 59)), WindowPhase::TooEarly);
        assert_eq!(w.phase_at(at(7, 45, 0)), WindowPhase::GraceIn);
        assert_eq!(w.phase_at(at(7, 59, 59)), WindowPhase::GraceIn);
        assert_eq!(w.phase_at(at(8, 0, 0)), WindowPhase::InSession);
        assert_eq!(w.phase_at(at(9, 0, 0)), WindowPhase::InSession);
        assert_eq!(w.phase_at(at(9, 0, 1)), WindowPhase::GraceOut);
        assert_eq!(w.phase_at(at(9, 15, 0)), WindowPhase::GraceOut);
        assert_eq!(w.phase_at(at(9, 15, 1)), WindowPhase::Closed);
    }

    #[test]
    fn grace_in_arrival_is_on_time() {
        let w = window();
        // Accepted during grace-in, and NOT late.
        assert_eq!(w.phase_at(at(7, 45, 0)), WindowPhase::GraceIn);
        assert!(!w.is_late(at(7, 45, 0)));
        assert!(!w.is_late(at(7, 59, 59)));
    }

    #[test]
    fn arrival_at_start_is_late() {
        let w = window();
        assert!(w.is_late(at(8, 0, 0)));
        assert!(w.is_late(at(8, 10, 0)));
        // Still accepted, though.
        assert!(w.phase_at(at(8, 10, 0)).allows_scan());
    }

    #[test]
    fn allows_scan_only_in_open_phases() {
        assert!(!WindowPhase::TooEarly.allows_scan());
        assert!(WindowPhase::GraceIn.allows_scan());
        assert!(WindowPhase::InSession.allows_scan());
        assert!(WindowPhase::GraceOut.allows_scan());
        assert!(!WindowPhase::Closed.allows_scan());
    }

    #[test]
    fn wait_until_open_counts_down() {
        let w = window();
        assert_eq!(w.wait_until_open(at(7, 30, 0)), Duration::minutes(15));
        assert_eq!(w.wait_until_open(at(7, 44, 59)), Duration::seconds(1));
        assert_eq!(w.wait_until_open(at(8, 0, 0)), Duration::zero());
    }

    #[test]
    fn validate_rejects_inverted_window() {
        let w = SessionWindow::new(at(9, 0, 0), at(8, 0, 0));
        assert!(w.validate().is_err());
    }

    #[test]
    fn validate_warns_on_unusual_lengths() {
        let short = SessionWindow::new(at(8, 0, 0), at(8, 10, 0));
        assert_eq!(short.validate().unwrap().len(), 1);

        let long = SessionWindow::new(at(8, 0, 0), at(21, 0, 0));
        assert_eq!(long.validate().unwrap().len(), 1);

        assert!(window().validate().unwrap().is_empty());
    }
}
