//! Scan command: feed one scanner reading into the engine.

use std::io::Write;

use anyhow::Result;

use att_core::{EngineConfig, RejectReason, ScanAction, ScanOutcome};
use att_db::Database;

use super::util;

pub fn run<W: Write>(
    db: &mut Database,
    writer: &mut W,
    identity: &str,
    session: &str,
    at: Option<&str>,
    json: bool,
    engine: &EngineConfig,
) -> Result<()> {
    let t = util::timestamp_or_now(at)?;

    // The room comes from the session; scanners only know the session id.
    let outcome = match db.get_session(session)? {
        Some(record) => db.process_scan(identity, &record.room_id, session, t, engine)?,
        None => ScanOutcome::rejected(RejectReason::NotFound {
            message: format!("unknown session: {session}"),
        }),
    };

    if json {
        writeln!(writer, "{}", serde_json::to_string(&outcome)?)?;
        return Ok(());
    }

    match &outcome {
        ScanOutcome::Accepted {
            action: ScanAction::TimeIn,
            is_late,
            via_grace,
            warnings,
            ..
        } => {
            let punctuality = if *is_late { "late" } else { "on time" };
            let grace = if *via_grace { ", via grace" } else { "" };
            writeln!(writer, "Time in recorded at {t} ({punctuality}{grace})")?;
            for warning in warnings {
                writeln!(writer, "  warning: {warning}")?;
            }
        }
        ScanOutcome::Accepted {
            action: ScanAction::TimeOut,
            duration_minutes,
            warnings,
            ..
        } => {
            let minutes = duration_minutes.unwrap_or(0);
            writeln!(writer, "Time out recorded at {t} ({minutes} min)")?;
            for warning in warnings {
                writeln!(writer, "  warning: {warning}")?;
            }
        }
        ScanOutcome::Rejected { reason } => {
            writeln!(writer, "Scan rejected: {reason}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use att_core::SessionWindow;
    use att_db::{Identity, Room, SessionRecord};
    use chrono::NaiveDate;

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
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        db.insert_session(&SessionRecord {
            id: "sess-1".to_string(),
            room_id: "room-1".to_string(),
            name: None,
            window: SessionWindow::new(
                day.and_hms_opt(8, 0, 0).unwrap(),
                day.and_hms_opt(9, 0, 0).unwrap(),
            ),
        })
        .unwrap();
        db
    }

    #[test]
    fn scan_prints_time_in_decision() {
        let mut db = seeded_db();
        let mut output = Vec::new();
        run(
            &mut db,
            &mut output,
            "stu-1",
            "sess-1",
            Some("2025-03-10T07:50:00"),
            false,
            &EngineConfig::default(),
        )
        .unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Time in recorded"));
        assert!(output.contains("on time, via grace"));
    }

    #[test]
    fn scan_emits_json_decision() {
        let mut db = seeded_db();
        let mut output = Vec::new();
        run(
            &mut db,
            &mut output,
            "stu-1",
            "sess-1",
            Some("2025-03-10T08:05:00"),
            true,
            &EngineConfig::default(),
        )
        .unwrap();
        let decision: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(decision["status"], "accepted");
        assert_eq!(decision["action"], "time_in");
        assert_eq!(decision["is_late"], true);
    }

    #[test]
    fn unknown_session_is_a_rejection_not_an_error() {
        let mut db = seeded_db();
        let mut output = Vec::new();
        run(
            &mut db,
            &mut output,
            "stu-1",
            "ghost",
            Some("2025-03-10T08:00:00"),
            false,
            &EngineConfig::default(),
        )
        .unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Scan rejected"));
        assert!(output.contains("ghost"));
    }
}
