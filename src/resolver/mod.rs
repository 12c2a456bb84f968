//! Materializes secret records as named runtime bindings.
//!
//! For a requested load context, every active record with its binding enabled
//! is resolved against the remote store and bound under its constant name.
//! Fetch failures skip the record; a conflicting redefinition stops the run.

mod bindings;
mod loader;

pub use bindings::{shell_quote, BindingTable, Definition};
pub use loader::{LoaderArtifact, LOADER_FILE_NAME};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::remote::{with_timeout, RemoteSecretClient};
use crate::secrets::{LoadContext, Result, SecretsError};
use crate::store::RecordStore;

/// A record that could not be bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedBinding {
    pub name: String,
    pub reason: String,
}

/// Summary of one `define_constants` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveReport {
    /// Binding names newly defined by this call.
    pub defined: Vec<String>,
    /// Binding names that already held the same value.
    pub unchanged: Vec<String>,
    pub skipped: Vec<SkippedBinding>,
}

pub struct ConstantResolver {
    store: Arc<dyn RecordStore>,
    remote: Arc<dyn RemoteSecretClient>,
    environment: String,
    remote_timeout: Duration,
    bindings: BindingTable,
    loader: Option<LoaderArtifact>,
}

impl ConstantResolver {
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
            bindings: BindingTable::new(),
            loader: None,
        }
    }

    /// Where and how [`Self::generate_loader_artifact`] writes its script.
    pub fn with_loader(mut self, loader: LoaderArtifact) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn into_bindings(self) -> BindingTable {
        self.bindings
    }

    /// Define bindings for `context` (`manual`, `early_bootstrap`,
    /// `deferred_bootstrap`, or a legacy alias).
    ///
    /// An unknown context fails before anything is defined. A
    /// `BindingCollision` aborts the run; bindings defined before it stay.
    pub async fn define_constants(&mut self, context: &str) -> Result<ResolveReport> {
        let context: LoadContext = context.parse()?;
        self.define_for(context).await
    }

    pub async fn define_for(&mut self, context: LoadContext) -> Result<ResolveReport> {
        let records = self.store.list_by_environment(&self.environment)?;
        let candidates: Vec<_> = records
            .into_iter()
            .filter(|r| r.is_bindable_in(context))
            .collect();

        debug!(
            environment = %self.environment,
            %context,
            candidates = candidates.len(),
            "resolving bindings"
        );

        let mut report = ResolveReport::default();

        for record in candidates {
            let fetched = with_timeout(
                self.remote_timeout,
                "get",
                Some(&record.name),
                self.remote.get(&record.name),
            )
            .await;

            let value = match fetched {
                Ok(Some(value)) => value,
                Ok(None) => {
                    warn!(name = %record.name, "secret has no value in remote store, skipping binding");
                    report.skipped.push(SkippedBinding {
                        name: record.name.clone(),
                        reason: "absent from remote store".to_string(),
                    });
                    continue;
                }
                Err(err) => {
                    warn!(name = %record.name, "skipping binding: {err}");
                    report.skipped.push(SkippedBinding {
                        name: record.name.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let binding = record.binding_name();
            match self.bindings.define(binding, &value) {
                Ok(Definition::Defined) => report.defined.push(binding.to_string()),
                Ok(Definition::Unchanged) => report.unchanged.push(binding.to_string()),
                Err(err @ SecretsError::BindingCollision { .. }) => {
                    warn!(binding, name = %record.name, "binding collision, stopping");
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            environment = %self.environment,
            %context,
            defined = report.defined.len(),
            unchanged = report.unchanged.len(),
            skipped = report.skipped.len(),
            "bindings resolved"
        );
        Ok(report)
    }

    /// Write the early-bootstrap loader script. `false` when no loader is
    /// configured or the file cannot be written.
    pub fn generate_loader_artifact(&self) -> bool {
        match self.loader {
            Some(ref loader) => loader.write(),
            None => {
                warn!("no loader location configured");
                false
            }
        }
    }
}
