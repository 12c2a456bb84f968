use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::DEFAULT_REMOTE_TIMEOUT_MS;

// ============================================================================
// Database
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// SQLite file. Defaults to `<state_dir>/secrets.db`.
    pub path: Option<PathBuf>,
}

// ============================================================================
// Remote store
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    /// JSON REST API.
    Http,
    /// Local JSON file of `{name: value}`.
    #[default]
    File,
}

impl std::str::FromStr for RemoteKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" | "https" => Ok(Self::Http),
            "file" => Ok(Self::File),
            other => Err(format!("unknown remote kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(default)]
    pub kind: RemoteKind,
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Backing file for `kind = file`. Defaults to
    /// `<state_dir>/remote-secrets.json`.
    pub path: Option<PathBuf>,
    #[serde(default = "default_remote_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: RemoteKind::default(),
            base_url: None,
            token: None,
            path: None,
            timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// Loader
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Where the early-bootstrap script is written.
    pub path: Option<PathBuf>,
    /// Executable the script invokes. Defaults to the running binary.
    pub program: Option<String>,
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Silent,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    /// The `tracing` filter level name.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LoggingLevel::Silent => "off",
            LoggingLevel::Error => "error",
            LoggingLevel::Warn => "warn",
            LoggingLevel::Info => "info",
            LoggingLevel::Debug => "debug",
            LoggingLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LoggingLevel,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_remote_timeout_ms() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_MS
}
