//! Reap command: close orphaned records.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDateTime;

use att_core::EngineConfig;
use att_db::Database;

pub fn run<W: Write>(
    db: &mut Database,
    writer: &mut W,
    now: NaiveDateTime,
    engine: &EngineConfig,
) -> Result<()> {
    let stats = db.reap_orphans(now, engine)?;
    writeln!(
        writer,
        "Scanned {} orphan candidates, closed {}.",
        stats.scanned, stats.closed
    )?;
    Ok(())
}
