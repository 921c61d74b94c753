//! SQLite schema migrations, versioned with `PRAGMA user_version`.

use rusqlite::Connection;

pub const SCHEMA_VERSION: i32 = 2;

pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    let current_version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::info!(current_version, target = SCHEMA_VERSION, "SQLite schema version");

    if current_version < 1 {
        tracing::info!("Running migration v1: serials table");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS serials (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                serial_number TEXT NOT NULL UNIQUE,
                source_filename TEXT,
                extracted_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                status TEXT NOT NULL DEFAULT 'confirmed'
                    CHECK (status IN ('confirmed', 'imported', 'flagged'))
            );
            "#,
        )?;
    }

    if current_version < 2 {
        tracing::info!("Running migration v2: read-path indexes");
        conn.execute_batch(
            r#"
            CREATE INDEX IF NOT EXISTS idx_serials_extracted ON serials(extracted_at DESC);
            CREATE INDEX IF NOT EXISTS idx_serials_status ON serials(status);
            "#,
        )?;
    }

    if current_version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    Ok(())
}
