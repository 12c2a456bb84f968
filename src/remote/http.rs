//! JSON-over-HTTP remote store client.
//!
//! Endpoints, relative to the configured base URL:
//! - `GET    secrets`        → `[{"name", "value"?}]` or `{"secrets": [...]}`
//! - `GET    secrets/{name}` → `{"name", "value"}`, 404 when absent
//! - `PUT    secrets/{name}` ← `{"value"}`
//! - `DELETE secrets/{name}` (404 counts as already deleted)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{RemoteSecret, RemoteSecretClient};
use crate::secrets::{Result, SecretsError};

pub struct HttpRemoteClient {
    base_url: Url,
    token: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<RemoteSecret>),
    Wrapped { secrets: Vec<RemoteSecret> },
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    value: &'a str,
}

impl HttpRemoteClient {
    /// Build a client; every request is bounded by `timeout`.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SecretsError::remote("connect", None, format!("invalid base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SecretsError::remote(
                "connect",
                None,
                format!("base URL '{base_url}' cannot carry a path"),
            ));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SecretsError::remote("connect", None, e))?;
        Ok(Self {
            base_url,
            token,
            client,
        })
    }

    fn url(&self, name: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("secrets");
            if let Some(name) = name {
                segments.push(name);
            }
        }
        url
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(
        &self,
        operation: &'static str,
        name: Option<&str>,
        req: RequestBuilder,
    ) -> Result<reqwest::Response> {
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| SecretsError::remote(operation, name, e))?;
        debug!(operation, name, status = %resp.status(), "remote secret store responded");
        Ok(resp)
    }
}

async fn status_error(
    operation: &'static str,
    name: Option<&str>,
    resp: reqwest::Response,
) -> SecretsError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    SecretsError::remote(operation, name, format!("HTTP {status}: {}", text.trim()))
}

#[async_trait]
impl RemoteSecretClient for HttpRemoteClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn list(&self) -> Result<Vec<RemoteSecret>> {
        let resp = self
            .send("list", None, self.client.get(self.url(None)))
            .await?;
        if !resp.status().is_success() {
            return Err(status_error("list", None, resp).await);
        }
        let body: ListResponse = resp
            .json()
            .await
            .map_err(|e| SecretsError::remote("list", None, e))?;
        Ok(match body {
            ListResponse::Bare(secrets) | ListResponse::Wrapped { secrets } => secrets,
        })
    }

    async fn get(&self, name: &str) -> Result<Option<String>> {
        let resp = self
            .send("get", Some(name), self.client.get(self.url(Some(name))))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(status_error("get", Some(name), resp).await);
        }
        let body: GetResponse = resp
            .json()
            .await
            .map_err(|e| SecretsError::remote("get", Some(name), e))?;
        Ok(body.value)
    }

    async fn put(&self, name: &str, value: &str) -> Result<()> {
        let req = self
            .client
            .put(self.url(Some(name)))
            .json(&PutRequest { value });
        let resp = self.send("put", Some(name), req).await?;
        if !resp.status().is_success() {
            return Err(status_error("put", Some(name), resp).await);
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let resp = self
            .send("delete", Some(name), self.client.delete(self.url(Some(name))))
            .await?;
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(status_error("delete", Some(name), resp).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpRemoteClient {
        HttpRemoteClient::new(base, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn builds_collection_and_item_urls() {
        let c = client("https://vault.example.com/api/v1/");
        assert_eq!(
            c.url(None).as_str(),
            "https://vault.example.com/api/v1/secrets"
        );
        assert_eq!(
            c.url(Some("API_KEY")).as_str(),
            "https://vault.example.com/api/v1/secrets/API_KEY"
        );

        let c = client("https://vault.example.com");
        assert_eq!(c.url(None).as_str(), "https://vault.example.com/secrets");
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(HttpRemoteClient::new("not a url", None, Duration::from_secs(1)).is_err());
        assert!(HttpRemoteClient::new("mailto:ops@example.com", None, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn list_response_accepts_both_shapes() {
        let bare: ListResponse = serde_json::from_str(r#"[{"name":"A"}]"#).unwrap();
        let wrapped: ListResponse =
            serde_json::from_str(r#"{"secrets":[{"name":"A","value":"1"}]}"#).unwrap();
        assert!(matches!(bare, ListResponse::Bare(ref v) if v[0].name == "A"));
        assert!(matches!(wrapped, ListResponse::Wrapped { ref secrets } if secrets[0].value.as_deref() == Some("1")));
    }
}
