//! Reconciliation of local secret records against the remote store.
//!
//! The remote store is authoritative for *existence* only. For one
//! environment, a pass:
//! 1. reactivates local records whose name is listed remotely,
//! 2. creates discovered records (binding disabled) for unknown remote names,
//! 3. hard-deletes local records whose name is no longer listed.
//!
//! Locally-authored metadata (label, binding, load context) of a surviving
//! record is never touched. Sync never writes to the remote store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::remote::{with_timeout, RemoteSecretClient};
use crate::secrets::validation::validate_name;
use crate::secrets::{ErrorKind, RecordStatus, Result, SecretRecord, SecretsError};
use crate::store::RecordStore;

/// Outcome counters of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Per-record failures. The pass carried on past each of them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// `true` when the pass changed nothing.
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }

    fn fail(&mut self, name: &str, err: &SecretsError) {
        warn!(name, kind = %err.kind(), "sync: {err}");
        self.failures.push(SyncFailure {
            name: name.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub name: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Computes and applies the diff between remote names and local records.
pub struct SyncEngine {
    store: Arc<dyn RecordStore>,
    remote: Arc<dyn RemoteSecretClient>,
    remote_timeout: Duration,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        remote: Arc<dyn RemoteSecretClient>,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            store,
            remote,
            remote_timeout,
        }
    }

    /// Reconcile `environment` with the remote listing.
    ///
    /// Fails as a whole only when the remote listing or the local listing
    /// cannot be read. Individual record failures land in
    /// [`SyncReport::failures`].
    pub async fn sync(&self, environment: &str) -> Result<SyncReport> {
        info!(environment, remote = self.remote.name(), "secrets sync started");

        let remote_secrets =
            with_timeout(self.remote_timeout, "list", None, self.remote.list()).await?;

        let mut local: HashMap<String, SecretRecord> = self
            .store
            .list_by_environment(environment)?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        let mut report = SyncReport::default();
        let mut seen: HashSet<String> = HashSet::new();

        for remote_secret in remote_secrets {
            let name = remote_secret.name;
            if name.is_empty() || !seen.insert(name.clone()) {
                continue;
            }

            match local.remove(&name) {
                Some(record) => self.reactivate(record, &mut report),
                None => self.discover(&name, environment, &mut report),
            }
        }

        // Whatever is left has no remote counterpart.
        for (name, record) in local {
            self.remove(&name, &record, &mut report);
        }

        info!(
            environment,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            failed = report.failures.len(),
            "secrets sync complete"
        );
        Ok(report)
    }

    fn reactivate(&self, mut record: SecretRecord, report: &mut SyncReport) {
        if record.status == RecordStatus::Active {
            return;
        }
        record.status = RecordStatus::Active;
        record.last_synced_at = Some(Utc::now());
        match self.store.save(&record) {
            Ok(_) => {
                debug!(name = %record.name, "sync: reactivated record");
                report.updated += 1;
            }
            Err(err) => report.fail(&record.name, &err),
        }
    }

    fn discover(&self, name: &str, environment: &str, report: &mut SyncReport) {
        if let Err(err) = validate_name(name) {
            report.fail(name, &err);
            return;
        }

        let record = SecretRecord::discovered(name, environment, Utc::now());
        match self.store.save(&record) {
            Ok(id) => {
                debug!(id, name, "sync: created discovered record");
                report.created += 1;
            }
            Err(err) if err.is_duplicate_key() => {
                // A concurrent writer created it first.
                debug!(name, "sync: record already created by another writer");
            }
            Err(err) => report.fail(name, &err),
        }
    }

    fn remove(&self, name: &str, record: &SecretRecord, report: &mut SyncReport) {
        let Some(id) = record.id else {
            return;
        };
        match self.store.delete(id) {
            Ok(true) => {
                debug!(id, name, "sync: deleted record missing from remote");
                report.deleted += 1;
            }
            Ok(false) => debug!(id, name, "sync: record already gone"),
            Err(err) => report.fail(name, &err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteClient;
    use crate::secrets::LoadContext;
    use crate::store::MemoryRecordStore;
    use pretty_assertions::assert_eq;

    const ENV: &str = "dev";

    fn engine(
        store: &Arc<MemoryRecordStore>,
        remote: &Arc<MemoryRemoteClient>,
    ) -> SyncEngine {
        SyncEngine::new(store.clone(), remote.clone(), Duration::from_secs(5))
    }

    fn counts(report: &SyncReport) -> (usize, usize, usize) {
        (report.created, report.updated, report.deleted)
    }

    #[tokio::test]
    async fn creates_discovered_record() {
        let store = Arc::new(MemoryRecordStore::new());
        let remote = Arc::new(MemoryRemoteClient::with_secrets([("API_KEY", "abc")]));

        let report = engine(&store, &remote).sync(ENV).await.unwrap();
        assert_eq!(counts(&report), (1, 0, 0));

        let record = store.find_by_name("API_KEY", ENV).unwrap();
        assert_eq!(record.status, RecordStatus::Active);
        assert_eq!(record.constant_name.as_deref(), Some("API_KEY"));
        assert!(!record.constant_enabled);
        assert_eq!(record.load_context, LoadContext::Manual);
        assert!(!record.owned_by_system);
        assert!(record.last_synced_at.is_some());
    }

    #[tokio::test]
    async fn reactivates_inactive_record() {
        let store = Arc::new(MemoryRecordStore::new());
        let mut record = SecretRecord::new("API_KEY", ENV);
        record.status = RecordStatus::Inactive;
        store.save(&record).unwrap();
        let remote = Arc::new(MemoryRemoteClient::with_secrets([("API_KEY", "abc")]));

        let report = engine(&store, &remote).sync(ENV).await.unwrap();
        assert_eq!(counts(&report), (0, 1, 0));

        let record = store.find_by_name("API_KEY", ENV).unwrap();
        assert_eq!(record.status, RecordStatus::Active);
        assert!(record.last_synced_at.is_some());
    }

    #[tokio::test]
    async fn deletes_record_missing_remotely() {
        let store = Arc::new(MemoryRecordStore::new());
        store.save(&SecretRecord::new("OLD_KEY", ENV)).unwrap();
        let remote = Arc::new(MemoryRemoteClient::new());

        let report = engine(&store, &remote).sync(ENV).await.unwrap();
        assert_eq!(counts(&report), (0, 0, 1));
        assert!(store.find_by_name("OLD_KEY", ENV).is_err());
    }

    #[tokio::test]
    async fn other_environments_untouched() {
        let store = Arc::new(MemoryRecordStore::new());
        store.save(&SecretRecord::new("LIVE_ONLY", "live")).unwrap();
        let remote = Arc::new(MemoryRemoteClient::new());

        let report = engine(&store, &remote).sync(ENV).await.unwrap();
        assert!(report.is_noop());
        assert!(store.find_by_name("LIVE_ONLY", "live").is_ok());
    }

    #[tokio::test]
    async fn remote_list_failure_aborts_pass() {
        let store = Arc::new(MemoryRecordStore::new());
        store.save(&SecretRecord::new("KEEP_ME", ENV)).unwrap();
        let remote = Arc::new(MemoryRemoteClient::new());
        remote.fail_list(true);

        let err = engine(&store, &remote).sync(ENV).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
        // Nothing was deleted on the strength of an empty listing.
        assert!(store.find_by_name("KEEP_ME", ENV).is_ok());
    }

    #[tokio::test]
    async fn invalid_remote_name_reported_without_aborting() {
        let store = Arc::new(MemoryRecordStore::new());
        let remote = Arc::new(MemoryRemoteClient::with_secrets([
            ("lower-case", "x"),
            ("VALID", "y"),
        ]));

        let report = engine(&store, &remote).sync(ENV).await.unwrap();
        assert_eq!(counts(&report), (1, 0, 0));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "lower-case");
        assert_eq!(report.failures[0].kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn second_pass_is_noop() {
        let store = Arc::new(MemoryRecordStore::new());
        let mut inactive = SecretRecord::new("B", ENV);
        inactive.status = RecordStatus::Inactive;
        store.save(&inactive).unwrap();
        store.save(&SecretRecord::new("GONE", ENV)).unwrap();
        let remote = Arc::new(MemoryRemoteClient::with_secrets([("A", "1"), ("B", "2")]));
        let engine = engine(&store, &remote);

        let first = engine.sync(ENV).await.unwrap();
        assert_eq!(counts(&first), (1, 1, 1));

        let second = engine.sync(ENV).await.unwrap();
        assert_eq!(second, SyncReport::default());
    }
}
