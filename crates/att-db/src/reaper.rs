//! Orphan reaper.
//!
//! An orphan is an active record whose time-in is older than the configured
//! age threshold: the person scanned in and never scanned out. The reaper
//! force-closes orphans at `time_in + max_reasonable_duration` rather than
//! at the sweep instant, so a record forgotten for a week does not book a
//! week of presence. Each close is its own transaction; a failed sweep
//! leaves completed closes intact and a retry picks up the remainder.

use chrono::{Duration, NaiveDateTime};
use rusqlite::{Connection, params};

use att_core::{ClosedReason, EngineConfig, ScanAction, compute_duration};

use crate::engine::insert_event;
use crate::{AttendanceRecord, Database, DbError, active_records_older_than, format_timestamp};

const REAP_BATCH_SIZE: usize = 50;

/// Summary of one reaper sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReapStats {
    /// Orphan candidates examined.
    pub scanned: usize,
    /// Records force-closed.
    pub closed: usize,
}

impl Database {
    /// Force-closes every active record older than the orphan age threshold.
    ///
    /// `now` is the sweep instant; records with
    /// `time_in <= now - orphan_max_age_hours` are candidates. Safe to run
    /// concurrently with scan processing and safe to re-run after a failure.
    pub fn reap_orphans(
        &mut self,
        now: NaiveDateTime,
        config: &EngineConfig,
    ) -> Result<ReapStats, DbError> {
        let cutoff = now - Duration::hours(config.orphan_max_age_hours);
        let mut stats = ReapStats::default();
        loop {
            let batch = active_records_older_than(&self.conn, cutoff, REAP_BATCH_SIZE)?;
            if batch.is_empty() {
                break;
            }
            stats.scanned += batch.len();
            for record in &batch {
                let tx = self.conn.transaction()?;
                force_close_record(&tx, record, config, None)?;
                tx.commit()?;
                stats.closed += 1;
            }
        }
        if stats.closed > 0 {
            tracing::info!(
                scanned = stats.scanned,
                closed = stats.closed,
                "reaper sweep closed orphaned records"
            );
        }
        Ok(stats)
    }
}

/// Closes one record with the orphan formula and a synthetic event.
///
/// Shared with the engine, which runs it for a whole session when a scan
/// arrives past the session's closed boundary. That path passes the
/// window's closure as `cap` so a fresh record is closed at the session
/// boundary instead of booking the full maximum duration with a
/// future-dated event.
pub(crate) fn force_close_record(
    conn: &Connection,
    record: &AttendanceRecord,
    config: &EngineConfig,
    cap: Option<NaiveDateTime>,
) -> Result<(), DbError> {
    let mut time_out = record.time_in + Duration::hours(config.max_reasonable_duration_hours);
    if let Some(cap) = cap {
        time_out = time_out.min(cap);
    }
    let corrected = compute_duration(record.time_in, time_out, &config.duration_config());
    tracing::info!(
        record_id = %record.id,
        identity_id = %record.identity_id,
        minutes = corrected.minutes,
        "force-closing orphaned record"
    );
    conn.execute(
        "UPDATE attendance_records SET time_out = ?, closed_reason = ? WHERE id = ?",
        params![
            format_timestamp(time_out),
            ClosedReason::OrphanAutoclose.as_str(),
            record.id,
        ],
    )?;
    insert_event(
        conn,
        &record.id,
        &record.identity_id,
        &record.room_id,
        &record.session_id,
        ScanAction::TimeOut,
        time_out,
        true,
    )?;
    Ok(())
}
