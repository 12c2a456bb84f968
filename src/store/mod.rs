//! Persistence for secret records, keyed by (name, environment).
//!
//! The store is a dumb repository: it enforces the unique key and owns the
//! `created_at` / `updated_at` timestamps, but it does not validate names.
//! Callers apply [`crate::secrets::validation`] before handing records over.

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

use crate::secrets::{Result, SecretRecord};

/// CRUD + query contract over secret records.
pub trait RecordStore: Send + Sync {
    /// Insert when `record.id` is `None`, update otherwise. Returns the id.
    ///
    /// Insert fails with `DuplicateKey` when (name, environment) is taken.
    fn save(&self, record: &SecretRecord) -> Result<i64>;

    /// Fetch by storage id, `NotFound` if absent.
    fn get(&self, id: i64) -> Result<SecretRecord>;

    /// Fetch by identity within an environment, `NotFound` if absent.
    fn find_by_name(&self, name: &str, environment: &str) -> Result<SecretRecord>;

    /// All records of one environment, in insertion order.
    fn list_by_environment(&self, environment: &str) -> Result<Vec<SecretRecord>>;

    /// Returns `false` when nothing was deleted.
    fn delete(&self, id: i64) -> Result<bool>;
}
