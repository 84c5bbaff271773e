//! Scan decision vocabulary.
//!
//! These types form the engine's inbound/outbound contract: every
//! `process_scan` call yields a [`ScanOutcome`], and every closed record
//! carries a [`ClosedReason`]. Enum string forms are the single source of
//! truth for SQL storage and JSON output.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// What an accepted scan did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanAction {
    TimeIn,
    TimeOut,
}

impl ScanAction {
    /// Returns the string representation for SQL storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TimeIn => "time_in",
            Self::TimeOut => "time_out",
        }
    }
}

impl std::fmt::Display for ScanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScanAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time_in" => Ok(Self::TimeIn),
            "time_out" => Ok(Self::TimeOut),
            _ => Err(format!("invalid scan action: {s}")),
        }
    }
}

/// Why a closed record was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClosedReason {
    /// Closed by a matching time-out scan.
    #[default]
    Normal,
    /// Force-closed by the orphan reaper.
    OrphanAutoclose,
    /// Closed while resolving a multiple-active-record conflict.
    DuplicateResolution,
}

impl ClosedReason {
    /// Returns the string representation for SQL storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::OrphanAutoclose => "orphan_autoclose",
            Self::DuplicateResolution => "duplicate_resolution",
        }
    }
}

impl std::fmt::Display for ClosedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClosedReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "orphan_autoclose" => Ok(Self::OrphanAutoclose),
            "duplicate_resolution" => Ok(Self::DuplicateResolution),
            _ => Err(format!("invalid closed reason: {s}")),
        }
    }
}

/// Why a scan was rejected. Rejections never mutate state and produce no
/// events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// Identity, room or session unknown, inactive, or mismatched.
    NotFound { message: String },
    /// Before the grace-in interval opens.
    TooEarly { wait_seconds: i64 },
    /// After the grace-out interval has expired.
    Closed,
    /// Repeat scan inside the rapid-scan threshold.
    DuplicateScan,
}

impl RejectReason {
    #[must_use]
    pub fn too_early(wait: Duration) -> Self {
        Self::TooEarly {
            wait_seconds: wait.num_seconds(),
        }
    }

    /// Stable error code for callers and logs.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::TooEarly { .. } => "too_early",
            Self::Closed => "closed",
            Self::DuplicateScan => "duplicate_scan",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { message } => write!(f, "not found: {message}"),
            Self::TooEarly { wait_seconds } => {
                write!(f, "too early: window opens in {wait_seconds}s")
            }
            Self::Closed => f.write_str("session window has closed"),
            Self::DuplicateScan => f.write_str("duplicate scan"),
        }
    }
}

/// Result of processing one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    Accepted {
        action: ScanAction,
        record_id: String,
        /// Fixed at time-in; repeated on the time-out outcome for display.
        is_late: bool,
        /// Present on time-out outcomes only.
        duration_minutes: Option<i64>,
        /// Time-in accepted during the grace-in interval: early, on time.
        /// Never set on time-out outcomes.
        via_grace: bool,
        /// Corrections and conflict notes, human-readable.
        warnings: Vec<String>,
    },
    Rejected {
        #[serde(flatten)]
        reason: RejectReason,
    },
}

impl ScanOutcome {
    #[must_use]
    pub const fn rejected(reason: RejectReason) -> Self {
        Self::Rejected { reason }
    }

    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}
