//! Identity management commands.

use std::io::Write;

use anyhow::Result;

use att_db::{Database, Identity};

pub fn add<W: Write>(db: &Database, writer: &mut W, id: &str, name: &str) -> Result<()> {
    db.upsert_identity(&Identity {
        id: id.to_string(),
        name: name.to_string(),
        is_active: true,
    })?;
    writeln!(writer, "Added identity {id} ({name})")?;
    Ok(())
}

pub fn list<W: Write>(db: &Database, writer: &mut W) -> Result<()> {
    let identities = db.list_identities()?;
    if identities.is_empty() {
        writeln!(writer, "No identities.")?;
        return Ok(());
    }
    for identity in identities {
        let suffix = if identity.is_active { "" } else { " (inactive)" };
        writeln!(writer, "- {}: {}{suffix}", identity.id, identity.name)?;
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
        add(&db, &mut output, "stu-1", "Ada").unwrap();
        add(&db, &mut output, "stu-2", "Grace").unwrap();

        let mut output = Vec::new();
        list(&db, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_eq!(output, "- stu-1: Ada\n- stu-2: Grace\n");
    }

    #[test]
    fn empty_list() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        list(&db, &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No identities.\n");
    }
}
