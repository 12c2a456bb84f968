//! Operator actions on tracked secrets.
//!
//! Every action validates names before touching either store. Values go to
//! the remote store first; the local record is only written once the remote
//! write succeeded.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::error::{Result, SecretsError};
use super::types::{LoadContext, RecordStatus, SecretRecord};
use super::validation::{validate_constant_name, validate_name, validate_record};
use crate::remote::{with_timeout, RemoteSecretClient};
use crate::store::RecordStore;

/// Input for [`SecretsService::create`].
#[derive(Debug, Clone, Default)]
pub struct NewSecret {
    pub name: String,
    /// Defaults to `name`.
    pub label: Option<String>,
    pub value: String,
    /// Defaults to `name`.
    pub constant_name: Option<String>,
    pub load_context: LoadContext,
    pub constant_enabled: bool,
}

/// Partial edit for [`SecretsService::update`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct SecretUpdate {
    pub label: Option<String>,
    pub value: Option<String>,
    pub constant_name: Option<String>,
    pub load_context: Option<LoadContext>,
    pub constant_enabled: Option<bool>,
}

impl SecretUpdate {
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.value.is_none()
            && self.constant_name.is_none()
            && self.load_context.is_none()
            && self.constant_enabled.is_none()
    }
}

pub struct SecretsService {
    store: Arc<dyn RecordStore>,
    remote: Arc<dyn RemoteSecretClient>,
    environment: String,
    remote_timeout: Duration,
}

impl SecretsService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        remote: Arc<dyn RemoteSecretClient>,
        environment: impl Into<String>,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            store,
            remote,
            environment: environment.into(),
            remote_timeout,
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Write the value remotely, then track it locally as system-owned.
    pub async fn create(&self, new: NewSecret) -> Result<SecretRecord> {
        validate_name(&new.name)?;
        let constant_name = match new.constant_name {
            Some(c) if !c.is_empty() => c,
            _ => new.name.clone(),
        };
        validate_constant_name(&constant_name)?;

        match self.store.find_by_name(&new.name, &self.environment) {
            Ok(_) => {
                return Err(SecretsError::persistence(
                    &new.name,
                    format!("already tracked in environment '{}'", self.environment),
                ))
            }
            Err(SecretsError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        self.put_value(&new.name, &new.value).await?;

        let mut record = SecretRecord::new(&new.name, &self.environment);
        if let Some(label) = new.label.filter(|l| !l.is_empty()) {
            record.label = label;
        }
        record.constant_name = Some(constant_name);
        record.constant_enabled = new.constant_enabled;
        record.load_context = new.load_context;
        record.owned_by_system = true;
        record.status = RecordStatus::Active;

        let id = self.store.save(&record).map_err(|err| {
            warn!(name = %new.name, "value stored remotely but local record failed: {err}");
            hard_duplicate(err)
        })?;
        info!(id, name = %new.name, environment = %self.environment, "secret created");
        self.store.get(id)
    }

    pub async fn update(&self, name: &str, update: SecretUpdate) -> Result<SecretRecord> {
        validate_name(name)?;
        if let Some(ref constant) = update.constant_name {
            validate_constant_name(constant)?;
        }

        let mut record = self.store.find_by_name(name, &self.environment)?;

        if let Some(ref value) = update.value {
            self.put_value(name, value).await?;
        }
        if let Some(label) = update.label {
            record.label = label;
        }
        if let Some(constant) = update.constant_name {
            record.constant_name = Some(constant);
        }
        if let Some(context) = update.load_context {
            record.load_context = context;
        }
        if let Some(enabled) = update.constant_enabled {
            record.constant_enabled = enabled;
        }

        let id = self.store.save(&record).map_err(hard_duplicate)?;
        info!(id, name, environment = %self.environment, "secret updated");
        self.store.get(id)
    }

    /// Remove the local record. With `force`, the remote secret is removed
    /// first; a remote failure only warns.
    pub async fn delete(&self, name: &str, force: bool) -> Result<()> {
        validate_name(name)?;
        let record = self.store.find_by_name(name, &self.environment)?;

        if force {
            let deleted =
                with_timeout(self.remote_timeout, "delete", Some(name), self.remote.delete(name))
                    .await;
            if let Err(err) = deleted {
                warn!(name, "remote delete failed, removing local record anyway: {err}");
            }
        }

        let Some(id) = record.id else {
            return Err(SecretsError::NotFound(name.to_string()));
        };
        if !self.store.delete(id)? {
            return Err(SecretsError::NotFound(name.to_string()));
        }
        info!(id, name, environment = %self.environment, force, "secret deleted");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<SecretRecord>> {
        self.store.list_by_environment(&self.environment)
    }

    pub fn get(&self, name: &str) -> Result<SecretRecord> {
        validate_name(name)?;
        self.store.find_by_name(name, &self.environment)
    }

    /// Current remote value of `name`, if any.
    pub async fn fetch_value(&self, name: &str) -> Result<Option<String>> {
        validate_name(name)?;
        with_timeout(self.remote_timeout, "get", Some(name), self.remote.get(name)).await
    }

    /// Validated pass-through of [`RecordStore::save`].
    pub fn save_record(&self, record: &SecretRecord) -> Result<i64> {
        validate_record(record)?;
        self.store.save(record).map_err(hard_duplicate)
    }

    pub fn get_record(&self, id: i64) -> Result<SecretRecord> {
        self.store.get(id)
    }

    pub fn delete_record(&self, id: i64) -> Result<bool> {
        self.store.delete(id)
    }

    async fn put_value(&self, name: &str, value: &str) -> Result<()> {
        with_timeout(
            self.remote_timeout,
            "put",
            Some(name),
            self.remote.put(name, value),
        )
        .await
    }
}

/// Outside sync discovery a taken (name, environment) is a write failure.
fn hard_duplicate(err: SecretsError) -> SecretsError {
    match err {
        SecretsError::DuplicateKey { name, environment } => SecretsError::persistence(
            name,
            format!("already exists in environment '{environment}'"),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteClient;
    use crate::secrets::ErrorKind;
    use crate::store::MemoryRecordStore;

    struct Fixture {
        store: Arc<MemoryRecordStore>,
        remote: Arc<MemoryRemoteClient>,
        service: SecretsService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryRecordStore::new());
        let remote = Arc::new(MemoryRemoteClient::new());
        let service = SecretsService::new(
            store.clone(),
            remote.clone(),
            "dev",
            Duration::from_secs(5),
        );
        Fixture {
            store,
            remote,
            service,
        }
    }

    fn new_secret(name: &str, value: &str) -> NewSecret {
        NewSecret {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_writes_remote_then_local() {
        let f = fixture();
        let record = f
            .service
            .create(NewSecret {
                label: Some("Stripe key".into()),
                constant_enabled: true,
                load_context: LoadContext::DeferredBootstrap,
                ..new_secret("STRIPE_KEY", "sk_live_123")
            })
            .await
            .unwrap();

        assert_eq!(f.remote.value_of("STRIPE_KEY").as_deref(), Some("sk_live_123"));
        assert!(record.id.is_some());
        assert!(record.owned_by_system);
        assert_eq!(record.label, "Stripe key");
        assert_eq!(record.constant_name.as_deref(), Some("STRIPE_KEY"));
        assert_eq!(record.load_context, LoadContext::DeferredBootstrap);
        assert_eq!(record.status, RecordStatus::Active);
    }

    #[tokio::test]
    async fn create_rejects_bad_name_before_any_write() {
        let f = fixture();
        let err = f.service.create(new_secret("my-secret", "x")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(f.store.is_empty());
        assert_eq!(f.remote.value_of("my-secret"), None);
    }

    #[tokio::test]
    async fn create_rejects_bad_constant_name() {
        let f = fixture();
        let err = f
            .service
            .create(NewSecret {
                constant_name: Some("lower".into()),
                ..new_secret("API_KEY", "x")
            })
            .await
            .unwrap_err();
        assert_eq!(err.identifier(), Some("lower"));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn create_skips_local_write_when_remote_fails() {
        let f = fixture();
        f.remote.fail_name("API_KEY");
        let err = f.service.create(new_secret("API_KEY", "x")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn create_duplicate_is_persistence_error() {
        let f = fixture();
        f.service.create(new_secret("API_KEY", "x")).await.unwrap();
        let err = f.service.create(new_secret("API_KEY", "y")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(err.identifier(), Some("API_KEY"));
    }

    #[tokio::test]
    async fn create_duplicate_leaves_remote_value_alone() {
        let f = fixture();
        f.service.create(new_secret("API_KEY", "x")).await.unwrap();
        f.service.create(new_secret("API_KEY", "y")).await.unwrap_err();
        assert_eq!(f.remote.value_of("API_KEY").as_deref(), Some("x"));
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn update_applies_only_given_fields() {
        let f = fixture();
        f.service
            .create(NewSecret {
                label: Some("original".into()),
                ..new_secret("API_KEY", "v1")
            })
            .await
            .unwrap();

        let record = f
            .service
            .update(
                "API_KEY",
                SecretUpdate {
                    value: Some("v2".into()),
                    constant_enabled: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(f.remote.value_of("API_KEY").as_deref(), Some("v2"));
        assert!(record.constant_enabled);
        assert_eq!(record.label, "original");
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let f = fixture();
        let err = f
            .service
            .update("NOPE", SecretUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_keeps_remote_unless_forced() {
        let f = fixture();
        f.service.create(new_secret("A", "1")).await.unwrap();
        f.service.create(new_secret("B", "2")).await.unwrap();

        f.service.delete("A", false).await.unwrap();
        assert_eq!(f.remote.value_of("A").as_deref(), Some("1"));

        f.service.delete("B", true).await.unwrap();
        assert_eq!(f.remote.value_of("B"), None);
        assert!(f.service.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn forced_delete_survives_remote_failure() {
        let f = fixture();
        f.service.create(new_secret("A", "1")).await.unwrap();
        f.remote.fail_name("A");

        f.service.delete("A", true).await.unwrap();
        assert_eq!(f.service.get("A").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn save_record_validates_before_store() {
        let f = fixture();
        let record = SecretRecord::new("bad name", "dev");
        let err = f.service.save_record(&record).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(f.store.is_empty());

        let id = f.service.save_record(&SecretRecord::new("GOOD", "dev")).unwrap();
        assert_eq!(f.service.get_record(id).unwrap().name, "GOOD");
        assert!(f.service.delete_record(id).unwrap());
        assert!(!f.service.delete_record(id).unwrap());
    }

    #[test]
    fn save_record_duplicate_is_persistence_error() {
        let f = fixture();
        f.service.save_record(&SecretRecord::new("GOOD", "dev")).unwrap();
        let err = f
            .service
            .save_record(&SecretRecord::new("GOOD", "dev"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(err.identifier(), Some("GOOD"));
    }
}
