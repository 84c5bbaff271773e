//! Session management commands.

use std::io::Write;

use anyhow::{Context, Result};
use uuid::Uuid;

use att_core::{SessionWindow, window::DEFAULT_GRACE_MINUTES};
use att_db::{Database, SessionRecord};

use super::util;

pub struct AddArgs<'a> {
    pub id: Option<&'a str>,
    pub room: &'a str,
    pub name: Option<&'a str>,
    pub starts: &'a str,
    pub ends: &'a str,
    pub grace_in: Option<i64>,
    pub grace_out: Option<i64>,
}

pub fn add<W: Write>(db: &Database, writer: &mut W, args: &AddArgs<'_>) -> Result<()> {
    let starts_at = util::parse_timestamp_arg(args.starts).context("invalid --starts")?;
    let ends_at = util::parse_timestamp_arg(args.ends).context("invalid --ends")?;
    let id = args
        .id
        .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);

    let session = SessionRecord {
        id: id.clone(),
        room_id: args.room.to_string(),
        name: args.name.map(ToString::to_string),
        window: SessionWindow {
            starts_at,
            ends_at,
            grace_in_minutes: args.grace_in.unwrap_or(DEFAULT_GRACE_MINUTES),
            grace_out_minutes: args.grace_out.unwrap_or(DEFAULT_GRACE_MINUTES),
        },
    };
    db.insert_session(&session)
        .with_context(|| format!("failed to create session {id}"))?;
    writeln!(
        writer,
        "Added session {id} in room {} ({starts_at} to {ends_at})",
        args.room
    )?;
    Ok(())
}

pub fn list<W: Write>(db: &Database, writer: &mut W) -> Result<()> {
    let sessions = db.list_sessions()?;
    if sessions.is_empty() {
        writeln!(writer, "No sessions.")?;
        return Ok(());
    }
    for session in sessions {
        let name = session.name.as_deref().unwrap_or("-");
        writeln!(
            writer,
            "- {}: {} in room {} ({} to {})",
            session.id,
            name,
            session.room_id,
            session.window.starts_at,
            session.window.ends_at,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use att_db::Room;

    fn db_with_room() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.upsert_room(&Room {
            id: "room-1".to_string(),
            name: "Lab A".to_string(),
            is_active: true,
        })
        .unwrap();
        db
    }

    #[test]
    fn add_applies_default_grace() {
        let db = db_with_room();
        let mut output = Vec::new();
        add(
            &db,
            &mut output,
            &AddArgs {
                id: Some("sess-1"),
                room: "room-1",
                name: None,
                starts: "2025-03-10T08:00:00",
                ends: "2025-03-10T09:00:00",
                grace_in: None,
                grace_out: None,
            },
        )
        .unwrap();

        let session = db.get_session("sess-1").unwrap().unwrap();
        assert_eq!(session.window.grace_in_minutes, DEFAULT_GRACE_MINUTES);
        assert_eq!(session.window.grace_out_minutes, DEFAULT_GRACE_MINUTES);
    }

    #[test]
    fn add_rejects_inverted_window() {
        let db = db_with_room();
        let mut output = Vec::new();
        let result = add(
            &db,
            &mut output,
            &AddArgs {
                id: Some("sess-bad"),
                room: "room-1",
                name: None,
                starts: "2025-03-10T09:00:00",
                ends: "2025-03-10T08:00:00",
                grace_in: None,
                grace_out: None,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn add_generates_an_id_when_omitted() {
        let db = db_with_room();
        let mut output = Vec::new();
        add(
            &db,
            &mut output,
            &AddArgs {
                id: None,
                room: "room-1",
                name: Some("Morning"),
                starts: "2025-03-10T08:00:00",
                ends: "2025-03-10T09:00:00",
                grace_in: Some(10),
                grace_out: Some(5),
            },
        )
        .unwrap();
        assert_eq!(db.list_sessions().unwrap().len(), 1);
    }
}
