//! Core types for tracked secret records.

use super::error::{Result, SecretsError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Load Context
// ============================================================================

/// When during process bootstrap a binding should be materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadContext {
    /// Only materialized on explicit request.
    #[default]
    Manual,
    /// Materialized before the main process initializes (via the loader).
    EarlyBootstrap,
    /// Materialized during normal process startup.
    DeferredBootstrap,
}

impl LoadContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadContext::Manual => "manual",
            LoadContext::EarlyBootstrap => "early_bootstrap",
            LoadContext::DeferredBootstrap => "deferred_bootstrap",
        }
    }
}

impl std::fmt::Display for LoadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoadContext {
    type Err = SecretsError;

    /// Accepts the canonical names plus the legacy `mu_plugin` / `plugin`
    /// aliases.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "manual" => Ok(Self::Manual),
            "early_bootstrap" | "mu_plugin" => Ok(Self::EarlyBootstrap),
            "deferred_bootstrap" | "plugin" => Ok(Self::DeferredBootstrap),
            other => Err(SecretsError::InvalidContext(other.to_string())),
        }
    }
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(format!("invalid record status: {s}")),
        }
    }
}

// ============================================================================
// Secret Record
// ============================================================================

/// Local metadata for one tracked secret. The value itself lives only in the
/// remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SecretRecord {
    /// Storage handle, assigned by the record store on insert.
    pub id: Option<i64>,
    /// Remote secret name; identity within an environment.
    pub name: String,
    pub label: String,
    /// Binding name; empty or `None` means "use `name`".
    pub constant_name: Option<String>,
    pub constant_enabled: bool,
    pub load_context: LoadContext,
    pub environment: String,
    /// `true` when created through this system, `false` when discovered by sync.
    pub owned_by_system: bool,
    /// Reserved soft-delete flag. Sync performs hard deletes and ignores it.
    pub deleted_locally: bool,
    pub status: RecordStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Store-managed.
    pub created_at: Option<DateTime<Utc>>,
    /// Store-managed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl SecretRecord {
    /// A blank, unsaved record with safe defaults: binding disabled, manual
    /// context, active.
    pub fn new(name: impl Into<String>, environment: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: None,
            label: name.clone(),
            constant_name: None,
            name,
            constant_enabled: false,
            load_context: LoadContext::Manual,
            environment: environment.into(),
            owned_by_system: false,
            deleted_locally: false,
            status: RecordStatus::Active,
            last_synced_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// A record for a name first seen in the remote store.
    pub fn discovered(
        name: impl Into<String>,
        environment: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut record = Self::new(name, environment);
        record.constant_name = Some(record.name.clone());
        record.last_synced_at = Some(now);
        record
    }

    /// The binding name this record materializes under.
    pub fn binding_name(&self) -> &str {
        match self.constant_name.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => &self.name,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }

    /// Whether this record should be materialized for `context`.
    pub fn is_bindable_in(&self, context: LoadContext) -> bool {
        self.is_active() && self.constant_enabled && self.load_context == context
    }
}

/// Redact a secret value for display (show first 2 and last 2 chars).
pub fn redact_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}…{tail}")
}

// ============================================================================
// Tests
// ============================================================================
