//! Storage layer and state engine for the attendance tracker.
//!
//! Provides persistence for identities, rooms, sessions, attendance records
//! and attendance events using `rusqlite`, plus the two stateful components
//! that own persisted state: the scan-processing engine ([`engine`]) and the
//! orphan reaper ([`reaper`]).
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but
//! not `Sync`. For multi-threaded access use a `Mutex<Database>` or separate
//! `Database` instances per thread. Correctness does not depend on either:
//! the one-active-record invariant is enforced by a partial unique index in
//! the store itself, so it holds across independent connections and
//! processes.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Scan timestamps are wall-clock readings from scanner devices and are
//! stored as naive ISO 8601 TEXT (e.g., `2025-03-10T08:00:00`), so
//! lexicographic ordering matches chronological ordering. Negative
//! intervals caused by clock skew, DST rewinds or midnight wraparound are
//! corrected downstream by `att_core::duration`.
//!
//! ## Active Records
//!
//! A record is active iff `time_out IS NULL`; there is no separate flag to
//! drift out of sync. The partial unique index `idx_records_one_active`
//! guarantees at most one active record per (identity, room) pair — a
//! constraint violation on insert is routed into the duplicate-resolution
//! path, never surfaced as corruption.

mod engine;
mod reaper;

pub use reaper::ReapStats;

use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::{Connection, params};
use thiserror::Error;

use att_core::{ClosedReason, ScanAction, SessionWindow, window::InvalidWindow};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {context}: {timestamp}")]
    TimestampParse {
        context: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored enum value is not part of the vocabulary.
    #[error("invalid stored value for {context}: {message}")]
    InvalidStoredValue { context: String, message: String },
    /// Refused to store a session whose end is not after its start.
    #[error(transparent)]
    InvalidWindow(#[from] InvalidWindow),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A person who can be marked present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

/// A physical room that sessions are bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

/// A scheduled occupancy window for one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: String,
    pub room_id: String,
    pub name: Option<String>,
    pub window: SessionWindow,
}

/// The current-occupancy fact for one (identity, room, session) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub id: String,
    pub identity_id: String,
    pub room_id: String,
    pub session_id: String,
    pub time_in: NaiveDateTime,
    pub time_out: Option<NaiveDateTime>,
    pub is_late: bool,
    pub closed_reason: Option<ClosedReason>,
}

impl AttendanceRecord {
    /// A record is active while it has no time-out.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.time_out.is_none()
    }
}

/// Append-only log entry for one accepted scan (or one synthetic close).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceEvent {
    pub id: String,
    pub record_id: String,
    pub identity_id: String,
    pub room_id: String,
    pub session_id: String,
    pub event_type: ScanAction,
    pub event_at: NaiveDateTime,
    pub system_generated: bool,
}

/// Read-only occupancy monitoring signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OccupancySummary {
    /// Records currently active across all rooms.
    pub active_records: usize,
    /// Identities simultaneously active in more than one room. Reported,
    /// never prevented.
    pub multi_room_identities: usize,
    /// Active records older than the orphan age threshold.
    pub orphan_candidates: usize,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection
    /// closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS identities (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                name TEXT,
                starts_at TEXT NOT NULL,
                ends_at TEXT NOT NULL,
                grace_in_minutes INTEGER NOT NULL DEFAULT 15,
                grace_out_minutes INTEGER NOT NULL DEFAULT 15,
                FOREIGN KEY (room_id) REFERENCES rooms(id)
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_room ON sessions(room_id);

            -- Current-occupancy records. A record is active iff time_out IS
            -- NULL; closed records are history and are never deleted.
            CREATE TABLE IF NOT EXISTS attendance_records (
                id TEXT PRIMARY KEY,
                identity_id TEXT NOT NULL,
                room_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                time_in TEXT NOT NULL,
                time_out TEXT,
                is_late INTEGER NOT NULL DEFAULT 0,
                closed_reason TEXT,
                FOREIGN KEY (identity_id) REFERENCES identities(id),
                FOREIGN KEY (room_id) REFERENCES rooms(id),
                FOREIGN KEY (session_id) REFERENCES sessions(id)
            );

            -- The store-level lock: at most one active record per
            -- (identity, room). Racing time-ins trip this index and are
            -- resolved, not corrupted.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_records_one_active
                ON attendance_records(identity_id, room_id)
                WHERE time_out IS NULL;

            CREATE INDEX IF NOT EXISTS idx_records_session
                ON attendance_records(session_id);
            CREATE INDEX IF NOT EXISTS idx_records_time_in
                ON attendance_records(time_in);

            -- Append-only audit trail: one row per accepted scan, plus
            -- system-generated rows for reaper closes. Never mutated.
            CREATE TABLE IF NOT EXISTS attendance_events (
                id TEXT PRIMARY KEY,
                record_id TEXT NOT NULL,
                identity_id TEXT NOT NULL,
                room_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                event_at TEXT NOT NULL,
                system_generated INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (record_id) REFERENCES attendance_records(id)
            );

            CREATE INDEX IF NOT EXISTS idx_events_identity_room
                ON attendance_events(identity_id, room_id, event_at);
            CREATE INDEX IF NOT EXISTS idx_events_session
                ON attendance_events(session_id);
            ",
        )?;
        Ok(())
    }

    /// Inserts or replaces an identity.
    pub fn upsert_identity(&self, identity: &Identity) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO identities (id, name, is_active) VALUES (?, ?, ?)",
            params![identity.id, identity.name, identity.is_active],
        )?;
        Ok(())
    }

    /// Inserts or replaces a room.
    pub fn upsert_room(&self, room: &Room) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO rooms (id, name, is_active) VALUES (?, ?, ?)",
            params![room.id, room.name, room.is_active],
        )?;
        Ok(())
    }

    /// Inserts a session after validating its window shape.
    ///
    /// Advisory shape warnings (very short / very long sessions) are logged,
    /// not returned as errors.
    pub fn insert_session(&self, session: &SessionRecord) -> Result<(), DbError> {
        for warning in session.window.validate()? {
            tracing::warn!(session_id = %session.id, warning, "unusual session window");
        }
        self.conn.execute(
            "
            INSERT INTO sessions
            (id, room_id, name, starts_at, ends_at, grace_in_minutes, grace_out_minutes)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                session.id,
                session.room_id,
                session.name,
                format_timestamp(session.window.starts_at),
                format_timestamp(session.window.ends_at),
                session.window.grace_in_minutes,
                session.window.grace_out_minutes,
            ],
        )?;
        Ok(())
    }

    /// Lists identities ordered by id.
    pub fn list_identities(&self) -> Result<Vec<Identity>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, is_active FROM identities ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Identity {
                id: row.get(0)?,
                name: row.get(1)?,
                is_active: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(DbError::from)
    }

    /// Lists rooms ordered by id.
    pub fn list_rooms(&self) -> Result<Vec<Room>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, is_active FROM rooms ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Room {
                id: row.get(0)?,
                name: row.get(1)?,
                is_active: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(DbError::from)
    }

    pub fn get_identity(&self, id: &str) -> Result<Option<Identity>, DbError> {
        get_identity(&self.conn, id)
    }

    pub fn get_room(&self, id: &str) -> Result<Option<Room>, DbError> {
        get_room(&self.conn, id)
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, DbError> {
        get_session(&self.conn, id)
    }

    /// Lists sessions ordered by start time.
    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, room_id, name, starts_at, ends_at, grace_in_minutes, grace_out_minutes
            FROM sessions
            ORDER BY starts_at ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([], session_row)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(parse_session(row?)?);
        }
        Ok(sessions)
    }

    /// Active records for an (identity, room) pair, earliest time-in first.
    pub fn active_records(
        &self,
        identity_id: &str,
        room_id: &str,
    ) -> Result<Vec<AttendanceRecord>, DbError> {
        active_records(&self.conn, identity_id, room_id)
    }

    /// All currently active records, earliest time-in first.
    pub fn all_active_records(&self) -> Result<Vec<AttendanceRecord>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT} WHERE time_out IS NULL ORDER BY time_in ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], record_row)?;
        collect_records(rows)
    }

    /// Records for a session, earliest time-in first. Includes closed ones.
    pub fn records_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<AttendanceRecord>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT} WHERE session_id = ? ORDER BY time_in ASC, id ASC"
        ))?;
        let rows = stmt.query_map([session_id], record_row)?;
        collect_records(rows)
    }

    /// Events for a session in chronological order.
    pub fn events_for_session(&self, session_id: &str) -> Result<Vec<AttendanceEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, record_id, identity_id, room_id, session_id,
                   event_type, event_at, system_generated
            FROM attendance_events
            WHERE session_id = ?
            ORDER BY event_at ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([session_id], event_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(parse_event(row?)?);
        }
        Ok(events)
    }

    /// Occupancy monitoring signals for `att status`.
    pub fn occupancy_summary(
        &self,
        now: NaiveDateTime,
        orphan_max_age_hours: i64,
    ) -> Result<OccupancySummary, DbError> {
        let active_records: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM attendance_records WHERE time_out IS NULL",
            [],
            |row| row.get::<_, i64>(0),
        )? as usize;

        let multi_room_identities: usize = self.conn.query_row(
            "
            SELECT COUNT(*) FROM (
                SELECT identity_id
                FROM attendance_records
                WHERE time_out IS NULL
                GROUP BY identity_id
                HAVING COUNT(DISTINCT room_id) > 1
            )
            ",
            [],
            |row| row.get::<_, i64>(0),
        )? as usize;

        let cutoff = now - chrono::Duration::hours(orphan_max_age_hours);
        let orphan_candidates: usize = self.conn.query_row(
            "
            SELECT COUNT(*) FROM attendance_records
            WHERE time_out IS NULL AND time_in <= ?
            ",
            [format_timestamp(cutoff)],
            |row| row.get::<_, i64>(0),
        )? as usize;

        Ok(OccupancySummary {
            active_records,
            multi_room_identities,
            orphan_candidates,
        })
    }
}

// Query helpers shared between the public API and in-transaction engine
// code. `rusqlite::Transaction` derefs to `Connection`, so everything takes
// `&Connection`.

const RECORD_SELECT: &str = "
    SELECT id, identity_id, room_id, session_id, time_in, time_out, is_late, closed_reason
    FROM attendance_records
";

#[derive(Debug)]
struct RawRecord {
    id: String,
    identity_id: String,
    room_id: String,
    session_id: String,
    time_in: String,
    time_out: Option<String>,
    is_late: bool,
    closed_reason: Option<String>,
}

#[derive(Debug)]
struct RawSession {
    id: String,
    room_id: String,
    name: Option<String>,
    starts_at: String,
    ends_at: String,
    grace_in_minutes: i64,
    grace_out_minutes: i64,
}

#[derive(Debug)]
struct RawEvent {
    id: String,
    record_id: String,
    identity_id: String,
    room_id: String,
    session_id: String,
    event_type: String,
    event_at: String,
    system_generated: bool,
}

fn record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        identity_id: row.get(1)?,
        room_id: row.get(2)?,
        session_id: row.get(3)?,
        time_in: row.get(4)?,
        time_out: row.get(5)?,
        is_late: row.get(6)?,
        closed_reason: row.get(7)?,
    })
}

fn session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSession> {
    Ok(RawSession {
        id: row.get(0)?,
        room_id: row.get(1)?,
        name: row.get(2)?,
        starts_at: row.get(3)?,
        ends_at: row.get(4)?,
        grace_in_minutes: row.get(5)?,
        grace_out_minutes: row.get(6)?,
    })
}

fn event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        id: row.get(0)?,
        record_id: row.get(1)?,
        identity_id: row.get(2)?,
        room_id: row.get(3)?,
        session_id: row.get(4)?,
        event_type: row.get(5)?,
        event_at: row.get(6)?,
        system_generated: row.get(7)?,
    })
}

fn parse_record(raw: RawRecord) -> Result<AttendanceRecord, DbError> {
    let time_in = parse_timestamp(&raw.time_in, &raw.id)?;
    let time_out = raw
        .time_out
        .as_deref()
        .map(|t| parse_timestamp(t, &raw.id))
        .transpose()?;
    let closed_reason = raw
        .closed_reason
        .as_deref()
        .map(|r| {
            r.parse::<ClosedReason>()
                .map_err(|message| DbError::InvalidStoredValue {
                    context: format!("record {}", raw.id),
                    message,
                })
        })
        .transpose()?;
    Ok(AttendanceRecord {
        id: raw.id,
        identity_id: raw.identity_id,
        room_id: raw.room_id,
        session_id: raw.session_id,
        time_in,
        time_out,
        is_late: raw.is_late,
        closed_reason,
    })
}

fn parse_session(raw: RawSession) -> Result<SessionRecord, DbError> {
    let starts_at = parse_timestamp(&raw.starts_at, &raw.id)?;
    let ends_at = parse_timestamp(&raw.ends_at, &raw.id)?;
    Ok(SessionRecord {
        id: raw.id,
        room_id: raw.room_id,
        name: raw.name,
        window: SessionWindow {
            starts_at,
            ends_at,
            grace_in_minutes: raw.grace_in_minutes,
            grace_out_minutes: raw.grace_out_minutes,
        },
    })
}

fn parse_event(raw: RawEvent) -> Result<AttendanceEvent, DbError> {
    let event_at = parse_timestamp(&raw.event_at, &raw.id)?;
    let event_type =
        raw.event_type
            .parse::<ScanAction>()
            .map_err(|message| DbError::InvalidStoredValue {
                context: format!("event {}", raw.id),
                message,
            })?;
    Ok(AttendanceEvent {
        id: raw.id,
        record_id: raw.record_id,
        identity_id: raw.identity_id,
        room_id: raw.room_id,
        session_id: raw.session_id,
        event_type,
        event_at,
        system_generated: raw.system_generated,
    })
}

fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<RawRecord>>,
) -> Result<Vec<AttendanceRecord>, DbError> {
    let mut records = Vec::new();
    for row in rows {
        records.push(parse_record(row?)?);
    }
    Ok(records)
}

fn get_identity(conn: &Connection, id: &str) -> Result<Option<Identity>, DbError> {
    let mut stmt = conn.prepare("SELECT id, name, is_active FROM identities WHERE id = ?")?;
    let mut rows = stmt.query_map([id], |row| {
        Ok(Identity {
            id: row.get(0)?,
            name: row.get(1)?,
            is_active: row.get(2)?,
        })
    })?;
    rows.next().transpose().map_err(DbError::from)
}

fn get_room(conn: &Connection, id: &str) -> Result<Option<Room>, DbError> {
    let mut stmt = conn.prepare("SELECT id, name, is_active FROM rooms WHERE id = ?")?;
    let mut rows = stmt.query_map([id], |row| {
        Ok(Room {
            id: row.get(0)?,
            name: row.get(1)?,
            is_active: row.get(2)?,
        })
    })?;
    rows.next().transpose().map_err(DbError::from)
}

fn get_session(conn: &Connection, id: &str) -> Result<Option<SessionRecord>, DbError> {
    let mut stmt = conn.prepare(
        "
        SELECT id, room_id, name, starts_at, ends_at, grace_in_minutes, grace_out_minutes
        FROM sessions
        WHERE id = ?
        ",
    )?;
    let mut rows = stmt.query_map([id], session_row)?;
    rows.next().transpose()?.map(parse_session).transpose()
}

fn active_records(
    conn: &Connection,
    identity_id: &str,
    room_id: &str,
) -> Result<Vec<AttendanceRecord>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "
        {RECORD_SELECT}
        WHERE identity_id = ? AND room_id = ? AND time_out IS NULL
        ORDER BY time_in ASC, id ASC
        "
    ))?;
    let rows = stmt.query_map([identity_id, room_id], record_row)?;
    collect_records(rows)
}

fn active_records_for_session(
    conn: &Connection,
    session_id: &str,
) -> Result<Vec<AttendanceRecord>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "{RECORD_SELECT} WHERE session_id = ? AND time_out IS NULL ORDER BY time_in ASC, id ASC"
    ))?;
    let rows = stmt.query_map([session_id], record_row)?;
    collect_records(rows)
}

fn active_records_older_than(
    conn: &Connection,
    cutoff: NaiveDateTime,
    limit: usize,
) -> Result<Vec<AttendanceRecord>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "
        {RECORD_SELECT}
        WHERE time_out IS NULL AND time_in <= ?
        ORDER BY time_in ASC, id ASC
        LIMIT ?
        "
    ))?;
    let rows = stmt.query_map(
        params![format_timestamp(cutoff), limit as i64],
        record_row,
    )?;
    collect_records(rows)
}

/// Most recent event instant for an (identity, room) pair.
fn last_event_at(
    conn: &Connection,
    identity_id: &str,
    room_id: &str,
) -> Result<Option<NaiveDateTime>, DbError> {
    let timestamp: Option<String> = conn.query_row(
        "
        SELECT MAX(event_at) FROM attendance_events
        WHERE identity_id = ? AND room_id = ?
        ",
        [identity_id, room_id],
        |row| row.get(0),
    )?;
    timestamp
        .as_deref()
        .map(|t| parse_timestamp(t, "last event"))
        .transpose()
}

fn parse_timestamp(timestamp: &str, context: &str) -> Result<NaiveDateTime, DbError> {
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).map_err(|source| {
        DbError::TimestampParse {
            context: context.to_string(),
            timestamp: timestamp.to_string(),
            source,
        }
    })
}

fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}
