use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::schema;
use super::RecordStore;
use crate::secrets::{LoadContext, RecordStatus, Result, SecretRecord, SecretsError};

const SELECT_COLUMNS: &str = "id, name, label, constant_name, constant_enabled, load_context,
     environment, owned_by_system, deleted_locally, status, last_synced_at,
     created_at, updated_at";

/// SQLite-backed record store.
///
/// Cheaply cloneable; the connection is shared behind `Arc<Mutex<_>>`.
#[derive(Clone)]
pub struct SqliteRecordStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) the database file at `path` and apply migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SecretsError::persistence(path.display().to_string(), e))?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| SecretsError::persistence(path.display().to_string(), e))?;
        let store = Self::from_connection(conn, &path.display().to_string())?;
        info!(db = %path.display(), "secret record store ready");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SecretsError::persistence(":memory:", e))?;
        Self::from_connection(conn, ":memory:")
    }

    fn from_connection(conn: Connection, label: &str) -> Result<Self> {
        schema::run_migrations(&conn).map_err(|e| SecretsError::persistence(label, e))?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    fn insert(&self, record: &SecretRecord) -> Result<i64> {
        let now = format_ts(Utc::now());
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO secrets (
                name, label, constant_name, constant_enabled, load_context,
                environment, owned_by_system, deleted_locally, status,
                last_synced_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                record.name,
                record.label,
                record.constant_name,
                record.constant_enabled,
                record.load_context.as_str(),
                record.environment,
                record.owned_by_system,
                record.deleted_locally,
                record.status.as_str(),
                record.last_synced_at.map(format_ts),
                now,
            ],
        )
        .map_err(|e| map_write_error(record, e))?;

        let id = conn.last_insert_rowid();
        debug!(id, name = %record.name, environment = %record.environment, "inserted secret record");
        Ok(id)
    }

    fn update(&self, id: i64, record: &SecretRecord) -> Result<i64> {
        let now = format_ts(Utc::now());
        let changed = self
            .db
            .lock()
            .execute(
                "UPDATE secrets SET
                    name = ?1, label = ?2, constant_name = ?3, constant_enabled = ?4,
                    load_context = ?5, environment = ?6, owned_by_system = ?7,
                    deleted_locally = ?8, status = ?9, last_synced_at = ?10,
                    updated_at = ?11
                 WHERE id = ?12",
                params![
                    record.name,
                    record.label,
                    record.constant_name,
                    record.constant_enabled,
                    record.load_context.as_str(),
                    record.environment,
                    record.owned_by_system,
                    record.deleted_locally,
                    record.status.as_str(),
                    record.last_synced_at.map(format_ts),
                    now,
                    id,
                ],
            )
            .map_err(|e| map_write_error(record, e))?;

        if changed == 0 {
            return Err(SecretsError::NotFound(format!("id {id}")));
        }
        debug!(id, name = %record.name, "updated secret record");
        Ok(id)
    }
}

impl RecordStore for SqliteRecordStore {
    fn save(&self, record: &SecretRecord) -> Result<i64> {
        match record.id {
            Some(id) => self.update(id, record),
            None => self.insert(record),
        }
    }

    fn get(&self, id: i64) -> Result<SecretRecord> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM secrets WHERE id = ?1");
        self.db
            .lock()
            .query_row(&sql, [id], row_to_record)
            .optional()
            .map_err(|e| SecretsError::persistence(format!("id {id}"), e))?
            .ok_or_else(|| SecretsError::NotFound(format!("id {id}")))
    }

    fn find_by_name(&self, name: &str, environment: &str) -> Result<SecretRecord> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM secrets WHERE name = ?1 AND environment = ?2"
        );
        self.db
            .lock()
            .query_row(&sql, [name, environment], row_to_record)
            .optional()
            .map_err(|e| SecretsError::persistence(name, e))?
            .ok_or_else(|| SecretsError::NotFound(name.to_string()))
    }

    fn list_by_environment(&self, environment: &str) -> Result<Vec<SecretRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM secrets WHERE environment = ?1 ORDER BY id"
        );
        let conn = self.db.lock();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| SecretsError::persistence(environment, e))?;
        let rows = stmt
            .query_map([environment], row_to_record)
            .map_err(|e| SecretsError::persistence(environment, e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| SecretsError::persistence(environment, e))
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let removed = self
            .db
            .lock()
            .execute("DELETE FROM secrets WHERE id = ?1", [id])
            .map_err(|e| SecretsError::persistence(format!("id {id}"), e))?;
        Ok(removed > 0)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<SecretRecord> {
    let load_context: String = row.get(5)?;
    let status: String = row.get(9)?;
    let last_synced_at: Option<String> = row.get(10)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;

    Ok(SecretRecord {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        label: row.get(2)?,
        constant_name: row.get(3)?,
        constant_enabled: row.get(4)?,
        load_context: load_context
            .parse::<LoadContext>()
            .map_err(|e| conversion_error(5, e))?,
        environment: row.get(6)?,
        owned_by_system: row.get(7)?,
        deleted_locally: row.get(8)?,
        status: status
            .parse::<RecordStatus>()
            .map_err(|e| conversion_error(9, e))?,
        last_synced_at: last_synced_at
            .map(|s| parse_ts(10, &s))
            .transpose()?,
        created_at: Some(parse_ts(11, &created_at)?),
        updated_at: Some(parse_ts(12, &updated_at)?),
    })
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

/// Unique-key violations become `DuplicateKey`; everything else is a
/// persistence failure.
fn map_write_error(record: &SecretRecord, err: rusqlite::Error) -> SecretsError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            return SecretsError::DuplicateKey {
                name: record.name.clone(),
                environment: record.environment.clone(),
            };
        }
    }
    SecretsError::persistence(record.name.clone(), err)
}
