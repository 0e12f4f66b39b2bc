//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- One row per city chamber
            CREATE TABLE IF NOT EXISTS chamber_configs (
                city TEXT PRIMARY KEY,
                allowed_ip TEXT NOT NULL DEFAULT '',
                is_active INTEGER NOT NULL DEFAULT 1,
                last_session_date TEXT,
                active_bill_id TEXT,
                active_speaker_id TEXT,
                active_speaker_start_time TEXT,
                is_voting_open INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );

            -- Councilmen (participants)
            CREATE TABLE IF NOT EXISTS councilmen (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                party TEXT NOT NULL,
                city TEXT NOT NULL,
                avatar TEXT,
                is_present INTEGER NOT NULL DEFAULT 0,
                current_vote TEXT NOT NULL DEFAULT 'PENDING',
                is_requesting_floor INTEGER NOT NULL DEFAULT 0,
                is_requesting_intervention INTEGER NOT NULL DEFAULT 0,
                is_speaking INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );

            -- Bills
            CREATE TABLE IF NOT EXISTS bills (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                type TEXT NOT NULL DEFAULT 'PL',
                status TEXT NOT NULL DEFAULT 'PENDING',
                full_text TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL
            );

            -- Completed votes (append-only)
            CREATE TABLE IF NOT EXISTS session_history (
                id TEXT PRIMARY KEY,
                bill_id TEXT NOT NULL,
                city TEXT NOT NULL,
                date TEXT NOT NULL,
                result TEXT NOT NULL,
                individual_votes TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes for query performance",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_councilmen_city ON councilmen(city);
            CREATE INDEX IF NOT EXISTS idx_history_created ON session_history(created_at);
            CREATE INDEX IF NOT EXISTS idx_history_bill ON session_history(bill_id);
        "#,
    },
    Migration {
        version: 3,
        description: "Add floor request timestamp for queue ordering",
        sql: r#"
            ALTER TABLE councilmen ADD COLUMN floor_requested_at TEXT;
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .unwrap_or(None);
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            conn.execute_batch(migration.sql)?;
            record_migration(conn, migration)?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Get the latest migration version (test helper)
    fn latest_version() -> u32 {
        MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
    }

    #[test]
    fn test_migrations_run() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run twice
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_sequential() {
        // Verify migrations are numbered sequentially
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(
                migration.version as usize,
                i + 1,
                "Migration {} should have version {}",
                migration.description,
                i + 1
            );
        }
    }

    #[test]
    fn test_floor_request_column_added() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('councilmen') WHERE name = 'floor_requested_at'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
