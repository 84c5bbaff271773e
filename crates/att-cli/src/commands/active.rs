//! Active command: list currently open attendance records.

use std::io::Write;

use anyhow::Result;
use serde_json::json;

use att_db::Database;

pub fn run<W: Write>(db: &Database, writer: &mut W, json: bool) -> Result<()> {
    let records = db.all_active_records()?;

    if json {
        let entries: Vec<_> = records
            .iter()
            .map(|r| {
                json!({
                    "record_id": r.id,
                    "identity_id": r.identity_id,
                    "room_id": r.room_id,
                    "session_id": r.session_id,
                    "time_in": r.time_in.to_string(),
                    "is_late": r.is_late,
                })
            })
            .collect();
        writeln!(writer, "{}", serde_json::to_string(&entries)?)?;
        return Ok(());
    }

    if records.is_empty() {
        writeln!(writer, "No active records.")?;
        return Ok(());
    }
    for record in records {
        let late = if record.is_late { " (late)" } else { "" };
        writeln!(
            writer,
            "- {} in {} since {}{late}",
            record.identity_id, record.room_id, record.time_in
        )?;
    }
    Ok(())
}
