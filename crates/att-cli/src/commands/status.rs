//! Status command: occupancy monitoring summary.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDateTime;

use att_core::EngineConfig;
use att_db::Database;

pub fn run<W: Write>(
    db: &Database,
    writer: &mut W,
    database_path: &Path,
    now: NaiveDateTime,
    engine: &EngineConfig,
) -> Result<()> {
    let summary = db.occupancy_summary(now, engine.orphan_max_age_hours)?;

    writeln!(writer, "Attendance tracker status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer, "Active records: {}", summary.active_records)?;
    writeln!(
        writer,
        "Identities in multiple rooms: {}",
        summary.multi_room_identities
    )?;
    writeln!(writer, "Orphan candidates: {}", summary.orphan_candidates)?;
    Ok(())
}
