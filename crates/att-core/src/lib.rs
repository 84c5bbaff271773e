//! Core domain logic for the attendance tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Window evaluation: classifying a scan instant against a session window
//! - Duration correction: numerically careful elapsed-time accounting
//! - Scan decisions: the accepted/rejected outcome vocabulary
//!
//! Everything here is pure: no I/O, no persisted state. The stateful engine
//! and the orphan reaper live in `att-db`, where the store transaction is
//! the unit of atomicity.

pub mod config;
pub mod duration;
pub mod scan;
pub mod window;

pub use config::EngineConfig;
pub use duration::{CorrectedDuration, DurationConfig, DurationCorrection, compute_duration};
pub use scan::{ClosedReason, RejectReason, ScanAction, ScanOutcome};
pub use window::{SessionWindow, WindowPhase};
