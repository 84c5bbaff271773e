//! Scan-processing state engine.
//!
//! [`Database::process_scan`] is the single entry point through which
//! scanner input mutates attendance state. Each call is one
//! read-check-write transaction: an accepted scan performs exactly one
//! record creation or mutation plus one event insertion, and a rejected
//! scan performs none. Callers may safely retry a failed call with
//! identical arguments; duplicate suppression absorbs the retry.

use chrono::{Duration, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior, params};
use uuid::Uuid;

use att_core::{
    ClosedReason, EngineConfig, RejectReason, ScanAction, ScanOutcome, SessionWindow,
    WindowPhase, compute_duration,
};

use crate::{
    AttendanceRecord, Database, DbError, active_records, active_records_for_session,
    format_timestamp, get_identity, get_room, get_session, last_event_at,
    reaper::force_close_record,
};

impl Database {
    /// Processes one scan against a session and returns the decision.
    ///
    /// `t` is the wall-clock instant reported by the scanner. Rejections
    /// are ordinary `Ok` outcomes; `Err` means the store itself failed and
    /// nothing was written.
    pub fn process_scan(
        &mut self,
        identity_id: &str,
        room_id: &str,
        session_id: &str,
        t: NaiveDateTime,
        config: &EngineConfig,
    ) -> Result<ScanOutcome, DbError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(identity) = get_identity(&tx, identity_id)? else {
            return Ok(not_found(format!("unknown identity: {identity_id}")));
        };
        if !identity.is_active {
            return Ok(not_found(format!("identity is inactive: {identity_id}")));
        }
        let Some(room) = get_room(&tx, room_id)? else {
            return Ok(not_found(format!("unknown room: {room_id}")));
        };
        if !room.is_active {
            return Ok(not_found(format!("room is inactive: {room_id}")));
        }
        let Some(session) = get_session(&tx, session_id)? else {
            return Ok(not_found(format!("unknown session: {session_id}")));
        };
        if session.room_id != room_id {
            return Ok(not_found(format!(
                "session {session_id} is not bound to room {room_id}"
            )));
        }

        let window = session.window;
        let phase = window.phase_at(t);
        match phase {
            WindowPhase::TooEarly => {
                return Ok(ScanOutcome::rejected(RejectReason::too_early(
                    window.wait_until_open(t),
                )));
            }
            WindowPhase::Closed => {
                // The session is over; any record still open is an orphan
                // regardless of age. Close them now so staleness is bounded
                // by the session's own closure, then reject the scan. The
                // close instant is capped at the window's closure so a
                // same-day forgotten scan-out never books the full maximum
                // duration.
                let leftovers = active_records_for_session(&tx, session_id)?;
                for record in &leftovers {
                    force_close_record(&tx, record, config, Some(window.closes_at()))?;
                }
                if !leftovers.is_empty() {
                    tracing::info!(
                        session_id,
                        closed = leftovers.len(),
                        "closed leftover records for ended session"
                    );
                }
                tx.commit()?;
                return Ok(ScanOutcome::rejected(RejectReason::Closed));
            }
            WindowPhase::GraceIn | WindowPhase::InSession | WindowPhase::GraceOut => {}
        }

        // Rapid re-scans of the same badge are hardware bounce, not intent.
        if let Some(previous) = last_event_at(&tx, identity_id, room_id)? {
            let elapsed = (t - previous).abs();
            if elapsed < Duration::seconds(config.rapid_scan_threshold_seconds) {
                tracing::debug!(
                    identity_id,
                    room_id,
                    elapsed_ms = elapsed.num_milliseconds(),
                    "suppressed duplicate scan"
                );
                return Ok(ScanOutcome::rejected(RejectReason::DuplicateScan));
            }
        }

        // Annotates grace-in time-ins only: early, therefore on time.
        let via_grace = phase == WindowPhase::GraceIn;
        let records = active_records(&tx, identity_id, room_id)?;
        let outcome = if records.is_empty() {
            match insert_record(&tx, identity_id, room_id, session_id, t, &window, via_grace) {
                Ok(outcome) => outcome,
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    // Another writer created an active record between our
                    // read and our insert. The unique index held the
                    // invariant; treat this scan as the time-out it now is.
                    tracing::warn!(
                        identity_id,
                        room_id,
                        "time-in raced an existing active record, switching to time-out"
                    );
                    let records = active_records(&tx, identity_id, room_id)?;
                    perform_time_out(&tx, records, t, config)?
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            perform_time_out(&tx, records, t, config)?
        };
        tx.commit()?;
        Ok(outcome)
    }
}

fn not_found(message: String) -> ScanOutcome {
    ScanOutcome::rejected(RejectReason::NotFound { message })
}

#[allow(clippy::too_many_arguments)]
fn insert_record(
    conn: &Connection,
    identity_id: &str,
    room_id: &str,
    session_id: &str,
    t: NaiveDateTime,
    window: &SessionWindow,
    via_grace: bool,
) -> rusqlite::Result<ScanOutcome> {
    let record_id = Uuid::new_v4().to_string();
    let is_late = window.is_late(t);
    conn.execute(
        "
        INSERT INTO attendance_records
        (id, identity_id, room_id, session_id, time_in, is_late)
        VALUES (?, ?, ?, ?, ?, ?)
        ",
        params![
            record_id,
            identity_id,
            room_id,
            session_id,
            format_timestamp(t),
            is_late,
        ],
    )?;
    insert_event(
        conn,
        &record_id,
        identity_id,
        room_id,
        session_id,
        ScanAction::TimeIn,
        t,
        false,
    )?;
    Ok(ScanOutcome::Accepted {
        action: ScanAction::TimeIn,
        record_id,
        is_late,
        duration_minutes: None,
        via_grace,
        warnings: Vec::new(),
    })
}

fn perform_time_out(
    conn: &Connection,
    records: Vec<AttendanceRecord>,
    t: NaiveDateTime,
    config: &EngineConfig,
) -> Result<ScanOutcome, DbError> {
    let mut warnings = Vec::new();
    let mut records = records.into_iter();
    let Some(authoritative) = records.next() else {
        // Unreachable in practice: callers only take this path with at
        // least one record in hand.
        return Ok(ScanOutcome::rejected(RejectReason::NotFound {
            message: "no active record to close".to_string(),
        }));
    };

    // More than one active record means a past consistency failure (the
    // unique index did not exist, or was violated out-of-band). Keep the
    // earliest time-in as the authoritative presence and fold the rest
    // away silently: resolution closes are bookkeeping, not scans, so
    // they emit no events.
    let mut resolved = 0usize;
    for duplicate in records {
        conn.execute(
            "UPDATE attendance_records SET time_out = ?, closed_reason = ? WHERE id = ?",
            params![
                format_timestamp(duplicate.time_in),
                ClosedReason::DuplicateResolution.as_str(),
                duplicate.id,
            ],
        )?;
        resolved += 1;
    }
    if resolved > 0 {
        tracing::warn!(
            identity_id = %authoritative.identity_id,
            room_id = %authoritative.room_id,
            resolved,
            "resolved conflicting active records, kept earliest time-in"
        );
        warnings.push(format!("resolved {resolved} conflicting active records"));
    }

    let corrected = compute_duration(authoritative.time_in, t, &config.duration_config());
    warnings.extend(corrected.corrections.iter().map(|c| c.as_str().to_string()));
    conn.execute(
        "UPDATE attendance_records SET time_out = ?, closed_reason = ? WHERE id = ?",
        params![
            format_timestamp(t),
            ClosedReason::Normal.as_str(),
            authoritative.id,
        ],
    )?;
    insert_event(
        conn,
        &authoritative.id,
        &authoritative.identity_id,
        &authoritative.room_id,
        &authoritative.session_id,
        ScanAction::TimeOut,
        t,
        false,
    )?;
    Ok(ScanOutcome::Accepted {
        action: ScanAction::TimeOut,
        record_id: authoritative.id,
        is_late: authoritative.is_late,
        duration_minutes: Some(corrected.minutes),
        via_grace: false,
        warnings,
    })
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn insert_event(
    conn: &Connection,
    record_id: &str,
    identity_id: &str,
    room_id: &str,
    session_id: &str,
    event_type: ScanAction,
    event_at: NaiveDateTime,
    system_generated: bool,
) -> rusqlite::Result<()> {
    conn.execute(
        "
        INSERT INTO attendance_events
        (id, record_id, identity_id, room_id, session_id, event_type, event_at, system_generated)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
        params![
            Uuid::new_v4().to_string(),
            record_id,
            identity_id,
            room_id,
            session_id,
            event_type.as_str(),
            format_timestamp(event_at),
            system_generated,
        ],
    )?;
    Ok(())
}
