//! Remote store backed by a local JSON file of `{ "NAME": "value" }`.
//!
//! Stands in for a hosted secret store during local development.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{RemoteSecret, RemoteSecretClient};
use crate::secrets::{Result, SecretsError};

pub struct FileRemoteClient {
    path: PathBuf,
}

impl FileRemoteClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self, operation: &'static str) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                SecretsError::remote(
                    operation,
                    None,
                    format!("malformed secrets file '{}': {e}", self.path.display()),
                )
            }),
            // A store that has never been written to is empty.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(SecretsError::remote(
                operation,
                None,
                format!("cannot read '{}': {e}", self.path.display()),
            )),
        }
    }

    async fn write_all(
        &self,
        operation: &'static str,
        name: &str,
        secrets: &BTreeMap<String, String>,
    ) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| SecretsError::remote(operation, Some(name), e))?;
            }
        }
        let content = serde_json::to_string_pretty(secrets)
            .map_err(|e| SecretsError::remote(operation, Some(name), e))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| SecretsError::remote(operation, Some(name), e))?;
        debug!(path = %self.path.display(), name, operation, "secrets file written");
        Ok(())
    }
}

#[async_trait]
impl RemoteSecretClient for FileRemoteClient {
    fn name(&self) -> &str {
        "file"
    }

    async fn list(&self) -> Result<Vec<RemoteSecret>> {
        Ok(self
            .read_all("list")
            .await?
            .into_iter()
            .map(|(name, value)| RemoteSecret {
                name,
                value: Some(value),
            })
            .collect())
    }

    async fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.read_all("get").await?.remove(name))
    }

    async fn put(&self, name: &str, value: &str) -> Result<()> {
        let mut secrets = self.read_all("put").await?;
        secrets.insert(name.to_string(), value.to_string());
        self.write_all("put", name, &secrets).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut secrets = self.read_all("delete").await?;
        if secrets.remove(name).is_some() {
            self.write_all("delete", name, &secrets).await?;
        }
        Ok(())
    }
}
