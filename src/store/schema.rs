use rusqlite::Connection;
use tracing::debug;

/// Current schema version.  Increment when adding new migrations.
const SCHEMA_VERSION: u32 = 1;

/// Apply all pending migrations to `conn`.
///
/// Tables are created with `IF NOT EXISTS` and the `meta` table records the
/// applied version, so running this on every open is safe.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    // WAL lets a concurrent sync and a bootstrap read the table together.
    // In-memory databases report "memory" here, which is fine.
    conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    let current_version = get_schema_version(conn);

    if current_version >= SCHEMA_VERSION {
        debug!(version = current_version, "secrets schema up to date");
        return Ok(());
    }

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    debug!(version = SCHEMA_VERSION, "secrets schema migrated");
    Ok(())
}

// ---------------------------------------------------------------------------
// v1: secrets table
// ---------------------------------------------------------------------------

fn migrate_v1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS secrets (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            name             TEXT    NOT NULL,
            label            TEXT    NOT NULL,
            constant_name    TEXT,
            constant_enabled INTEGER NOT NULL DEFAULT 0,
            load_context     TEXT    NOT NULL DEFAULT 'manual',
            environment      TEXT    NOT NULL,
            owned_by_system  INTEGER NOT NULL DEFAULT 0,
            deleted_locally  INTEGER NOT NULL DEFAULT 0,
            status           TEXT    NOT NULL DEFAULT 'active',
            last_synced_at   TEXT,
            created_at       TEXT    NOT NULL,
            updated_at       TEXT    NOT NULL,
            UNIQUE(name, environment)
        );",
    )?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_secrets_environment ON secrets(environment);",
    )?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn get_schema_version(conn: &Connection) -> u32 {
    conn.query_row(
        "SELECT value FROM meta WHERE key = 'schema_version'",
        [],
        |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<u32>().unwrap_or(0))
        },
    )
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
        [version.to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn unique_key_on_name_and_environment() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let insert = "INSERT INTO secrets (name, label, environment, created_at, updated_at)
                      VALUES (?1, ?1, ?2, 'now', 'now')";
        conn.execute(insert, ["API_KEY", "dev"]).unwrap();
        conn.execute(insert, ["API_KEY", "live"]).unwrap();
        assert!(conn.execute(insert, ["API_KEY", "dev"]).is_err());
    }
}
