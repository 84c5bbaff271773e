//! Room management commands.

use std::io::Write;

use anyhow::Result;

use att_db::{Database, Room};

pub fn add<W: Write>(db: &Database, writer: &mut W, id: &str, name: &str) -> Result<()> {
    db.upsert_room(&Room {
        id: id.to_string(),
        name: name.to_string(),
        is_active: true,
    })?;
    writeln!(writer, "Added room {id} ({name})")?;
    Ok(())
}

pub fn list<W: Write>(db: &Database, writer: &mut W) -> Result<()> {
    let rooms = db.list_rooms()?;
    if rooms.is_empty() {
        writeln!(writer, "No rooms.")?;
        return Ok(());
    }
    for room in rooms {
        let suffix = if room.is_active { "" } else { " (inactive)" };
        writeln!(writer, "- {}: {}{suffix}", room.id, room.name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_list() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        add(&db, &mut output, "room-1", "Lab A").unwrap();

        let mut output = Vec::new();
        list(&db, &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "- room-1: Lab A\n");
    }
}
