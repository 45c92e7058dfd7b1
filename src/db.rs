use rusqlite::{params, Connection, OptionalExtension};
use std::fs;

use crate::config::DatabaseLocation;
use crate::error::Result;

const MIGRATION_CATALOG_SQL: &str = include_str!("../migrations/0000_catalog.sql");
const MIGRATION_BOOK_INSTANCES_SQL: &str = include_str!("../migrations/0001_book_instances.sql");

/// Migrations in the order they must be applied.
pub const MIGRATIONS: [(&str, &str); 2] = [
    ("0000_catalog", MIGRATION_CATALOG_SQL),
    ("0001_book_instances", MIGRATION_BOOK_INSTANCES_SQL),
];

/// Opens the database, brings the schema up to date and turns on
/// foreign key enforcement.
pub fn open_db(location: &DatabaseLocation) -> Result<Connection> {
    let conn = match location {
        DatabaseLocation::Memory => Connection::open_in_memory()?,
        DatabaseLocation::File(path) => {
            if let Some(dir) = path.parent() {
                if !dir.as_os_str().is_empty() && !dir.exists() {
                    fs::create_dir_all(dir)?;
                }
            }
            log::debug!("opening catalog database at {}", path.display());
            Connection::open(path)?
        }
    };
    init_db(&conn)?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            id TEXT PRIMARY KEY NOT NULL,
            applied_at INTEGER NOT NULL
        );",
    )?;

    for (id, sql) in MIGRATIONS {
        apply_migration(conn, id, sql)?;
    }

    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

fn apply_migration(conn: &Connection, id: &str, sql: &str) -> Result<()> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM schema_migrations WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Ok(());
    }
    conn.execute_batch(sql)?;
    conn.execute(
        "INSERT INTO schema_migrations (id, applied_at) VALUES (?1, ?2)",
        params![id, chrono::Utc::now().timestamp_millis()],
    )?;
    log::info!("applied migration {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT id FROM schema_migrations ORDER BY id")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<String>>>()
            .unwrap()
    }

    #[test]
    fn applies_all_migrations_once() {
        let conn = open_db(&DatabaseLocation::Memory).unwrap();
        assert_eq!(applied(&conn), vec!["0000_catalog", "0001_book_instances"]);

        init_db(&conn).unwrap();
        assert_eq!(applied(&conn).len(), MIGRATIONS.len());
    }

    #[test]
    fn enables_foreign_keys() {
        let conn = open_db(&DatabaseLocation::Memory).unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn reopens_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let location = DatabaseLocation::File(dir.path().join("nested").join("privlib.db"));
        {
            let conn = open_db(&location).unwrap();
            conn.execute("INSERT INTO genres (name) VALUES ('Проза')", [])
                .unwrap();
        }
        let conn = open_db(&location).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM genres", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(applied(&conn).len(), 2);
    }
}
