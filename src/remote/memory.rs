use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{RemoteSecret, RemoteSecretClient};
use crate::secrets::{Result, SecretsError};

/// In-memory remote store with failure injection, for tests and dry runs.
#[derive(Default)]
pub struct MemoryRemoteClient {
    secrets: Mutex<BTreeMap<String, String>>,
    fail_list: Mutex<bool>,
    failing_names: Mutex<HashSet<String>>,
}

impl MemoryRemoteClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secrets<I, K, V>(secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let client = Self::new();
        {
            let mut map = client.secrets.lock();
            for (k, v) in secrets {
                map.insert(k.into(), v.into());
            }
        }
        client
    }

    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        self.secrets.lock().insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) {
        self.secrets.lock().remove(name);
    }

    pub fn value_of(&self, name: &str) -> Option<String> {
        self.secrets.lock().get(name).cloned()
    }

    /// Make every subsequent `list()` fail.
    pub fn fail_list(&self, fail: bool) {
        *self.fail_list.lock() = fail;
    }

    /// Make `get`/`put`/`delete` of `name` fail.
    pub fn fail_name(&self, name: impl Into<String>) {
        self.failing_names.lock().insert(name.into());
    }

    fn check_name(&self, operation: &'static str, name: &str) -> Result<()> {
        if self.failing_names.lock().contains(name) {
            return Err(SecretsError::remote(operation, Some(name), "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSecretClient for MemoryRemoteClient {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self) -> Result<Vec<RemoteSecret>> {
        if *self.fail_list.lock() {
            return Err(SecretsError::remote("list", None, "injected failure"));
        }
        Ok(self
            .secrets
            .lock()
            .iter()
            .map(|(name, value)| RemoteSecret {
                name: name.clone(),
                value: Some(value.clone()),
            })
            .collect())
    }

    async fn get(&self, name: &str) -> Result<Option<String>> {
        self.check_name("get", name)?;
        Ok(self.value_of(name))
    }

    async fn put(&self, name: &str, value: &str) -> Result<()> {
        self.check_name("put", name)?;
        self.insert(name, value);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.check_name("delete", name)?;
        self.remove(name);
        Ok(())
    }
}
