//! Clients for the authoritative remote secret store.
//!
//! The rest of the crate only assumes "name + opaque value". Every transport
//! failure surfaces as `SecretsError::RemoteUnavailable`.

mod file;
mod http;
mod memory;

pub use file::FileRemoteClient;
pub use http::HttpRemoteClient;
pub use memory::MemoryRemoteClient;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::secrets::{Result, SecretsError};

/// One entry of a remote listing. Sync only looks at `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSecret {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl RemoteSecret {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// Name/value access to the remote store.
#[async_trait]
pub trait RemoteSecretClient: Send + Sync {
    /// Display name for logging.
    fn name(&self) -> &str;

    /// Every secret the store holds.
    async fn list(&self) -> Result<Vec<RemoteSecret>>;

    /// The value of `name`, or `None` when the store has no such secret.
    async fn get(&self, name: &str) -> Result<Option<String>>;

    /// Create or overwrite `name`.
    async fn put(&self, name: &str, value: &str) -> Result<()>;

    /// Remove `name`. Removing a missing secret succeeds.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Bound a remote call by `limit`; elapsing counts as the store being
/// unavailable.
pub async fn with_timeout<T>(
    limit: Duration,
    operation: &'static str,
    name: Option<&str>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(SecretsError::remote(
            operation,
            name,
            format!("timed out after {}ms", limit.as_millis()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::ErrorKind;

    #[tokio::test]
    async fn timeout_maps_to_remote_unavailable() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, SecretsError>(())
        };
        let err = with_timeout(Duration::from_millis(10), "list", None, slow)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let value = with_timeout(Duration::from_secs(1), "get", Some("A"), async {
            Ok::<_, SecretsError>(Some("v".to_string()))
        })
        .await
        .unwrap();
        assert_eq!(value.as_deref(), Some("v"));
    }
}
