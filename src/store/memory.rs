use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::Mutex;

use super::RecordStore;
use crate::secrets::{Result, SecretRecord, SecretsError};

/// In-memory record store with the same unique-key and timestamp semantics as
/// [`super::SqliteRecordStore`]. Used as an injectable fake.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: BTreeMap<i64, SecretRecord>,
}

impl Inner {
    fn key_taken(&self, record: &SecretRecord, except: Option<i64>) -> bool {
        self.rows.values().any(|r| {
            r.id != except && r.name == record.name && r.environment == record.environment
        })
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all environments.
    pub fn len(&self) -> usize {
        self.inner.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryRecordStore {
    fn save(&self, record: &SecretRecord) -> Result<i64> {
        let mut inner = self.inner.lock();
        let now = Utc::now();

        match record.id {
            Some(id) => {
                let created_at = match inner.rows.get(&id) {
                    Some(existing) => existing.created_at,
                    None => return Err(SecretsError::NotFound(format!("id {id}"))),
                };
                if inner.key_taken(record, Some(id)) {
                    return Err(SecretsError::DuplicateKey {
                        name: record.name.clone(),
                        environment: record.environment.clone(),
                    });
                }
                let mut stored = record.clone();
                stored.created_at = created_at;
                stored.updated_at = Some(now);
                inner.rows.insert(id, stored);
                Ok(id)
            }
            None => {
                if inner.key_taken(record, None) {
                    return Err(SecretsError::DuplicateKey {
                        name: record.name.clone(),
                        environment: record.environment.clone(),
                    });
                }
                inner.next_id += 1;
                let id = inner.next_id;
                let mut stored = record.clone();
                stored.id = Some(id);
                stored.created_at = Some(now);
                stored.updated_at = Some(now);
                inner.rows.insert(id, stored);
                Ok(id)
            }
        }
    }

    fn get(&self, id: i64) -> Result<SecretRecord> {
        self.inner
            .lock()
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| SecretsError::NotFound(format!("id {id}")))
    }

    fn find_by_name(&self, name: &str, environment: &str) -> Result<SecretRecord> {
        self.inner
            .lock()
            .rows
            .values()
            .find(|r| r.name == name && r.environment == environment)
            .cloned()
            .ok_or_else(|| SecretsError::NotFound(name.to_string()))
    }

    fn list_by_environment(&self, environment: &str) -> Result<Vec<SecretRecord>> {
        Ok(self
            .inner
            .lock()
            .rows
            .values()
            .filter(|r| r.environment == environment)
            .cloned()
            .collect())
    }

    fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.inner.lock().rows.remove(&id).is_some())
    }
}
