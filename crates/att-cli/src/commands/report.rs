//! Report command: list a session's attendance records.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::NaiveDateTime;
use serde_json::json;

use att_core::{DurationConfig, compute_duration};
use att_db::Database;

pub fn run<W: Write>(
    db: &Database,
    writer: &mut W,
    session_id: &str,
    json_output: bool,
    now: NaiveDateTime,
    durations: &DurationConfig,
) -> Result<()> {
    if db.get_session(session_id)?.is_none() {
        bail!("unknown session: {session_id}");
    }
    let records = db.records_for_session(session_id)?;

    if json_output {
        let entries: Vec<_> = records
            .iter()
            .map(|r| {
                // Durations of still-open records run against "now", for
                // display only.
                let end = r.time_out.unwrap_or(now);
                let corrected = compute_duration(r.time_in, end, durations);
                json!({
                    "record_id": r.id,
                    "identity_id": r.identity_id,
                    "time_in": r.time_in.to_string(),
                    "time_out": r.time_out.map(|t| t.to_string()),
                    "is_late": r.is_late,
                    "duration_minutes": corrected.minutes,
                    "closed_reason": r.closed_reason.map(|c| c.as_str()),
                })
            })
            .collect();
        writeln!(writer, "{}", serde_json::to_string(&entries)?)?;
        return Ok(());
    }

    if records.is_empty() {
        writeln!(writer, "No records for session {session_id}.")?;
        return Ok(());
    }
    writeln!(writer, "Session {session_id}:")?;
    for record in records {
        let end = record.time_out.unwrap_or(now);
        let corrected = compute_duration(record.time_in, end, durations);
        let late = if record.is_late { ", late" } else { "" };
        let state = match record.time_out {
            Some(t) => format!("out {t}"),
            None => "still active".to_string(),
        };
        writeln!(
            writer,
            "- {}: in {}, {state} ({} min{late})",
            record.identity_id, record.time_in, corrected.minutes
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use att_core::{EngineConfig, SessionWindow};
    use att_db::{Identity, Room, SessionRecord};
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.upsert_identity(&Identity {
            id: "stu-1".to_string(),
            name: "Ada".to_string(),
            is_active: true,
        })
        .unwrap();
        db.upsert_room(&Room {
            id: "room-1".to_string(),
            name: "Lab A".to_string(),
            is_active: true,
        })
        .unwrap();
        db.insert_session(&SessionRecord {
            id: "sess-1".to_string(),
            room_id: "room-1".to_string(),
            name: None,
            window: SessionWindow::new(dt(8, 0), dt(9, 0)),
        })
        .unwrap();
        db
    }

    #[test]
    fn reports_closed_record_with_duration() {
        let mut db = seeded_db();
        let config = EngineConfig::default();
        db.process_scan("stu-1", "room-1", "sess-1", dt(7, 50), &config)
            .unwrap();
        db.process_scan("stu-1", "room-1", "sess-1", dt(9, 10), &config)
            .unwrap();

        let mut output = Vec::new();
        run(
            &db,
            &mut output,
            "sess-1",
            false,
            dt(12, 0),
            &config.duration_config(),
        )
        .unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("out 2025-03-10 09:10:00 (80 min)"));
    }

    #[test]
    fn open_record_duration_runs_against_now() {
        let mut db = seeded_db();
        let config = EngineConfig::default();
        db.process_scan("stu-1", "room-1", "sess-1", dt(8, 0), &config)
            .unwrap();

        let mut output = Vec::new();
        run(
            &db,
            &mut output,
            "sess-1",
            false,
            dt(8, 30),
            &config.duration_config(),
        )
        .unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("still active (30 min, late)"));
    }

    #[test]
    fn unknown_session_is_an_error() {
        let db = seeded_db();
        let mut output = Vec::new();
        let result = run(
            &db,
            &mut output,
            "ghost",
            false,
            dt(8, 0),
            &DurationConfig::default(),
        );
        assert!(result.is_err());
    }
}
