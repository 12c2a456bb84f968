use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of a [`SecretsError`], stable enough for CLI output
/// and sync reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    RemoteUnavailable,
    NotFound,
    DuplicateKey,
    Persistence,
    BindingCollision,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::RemoteUnavailable => "remote_unavailable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::DuplicateKey => "duplicate_key",
            ErrorKind::Persistence => "persistence",
            ErrorKind::BindingCollision => "binding_collision",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Invalid {field} '{value}': only uppercase letters, digits and underscores are allowed")]
    InvalidName { field: &'static str, value: String },

    #[error("Invalid load context '{0}': must be one of manual, early_bootstrap, deferred_bootstrap")]
    InvalidContext(String),

    #[error("Remote secret store unavailable during {operation}{}: {message}", fmt_target(.name))]
    RemoteUnavailable {
        operation: &'static str,
        name: Option<String>,
        message: String,
    },

    #[error("Secret record not found: {0}")]
    NotFound(String),

    #[error("Secret '{name}' already exists in environment '{environment}'")]
    DuplicateKey { name: String, environment: String },

    #[error("Persistence failure for '{name}': {message}")]
    Persistence { name: String, message: String },

    #[error("Binding '{name}' is already defined with a different value")]
    BindingCollision { name: String },
}

fn fmt_target(name: &Option<String>) -> String {
    name.as_ref().map(|n| format!(" of '{n}'")).unwrap_or_default()
}

impl SecretsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SecretsError::InvalidName { .. } | SecretsError::InvalidContext(_) => {
                ErrorKind::Validation
            }
            SecretsError::RemoteUnavailable { .. } => ErrorKind::RemoteUnavailable,
            SecretsError::NotFound(_) => ErrorKind::NotFound,
            SecretsError::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            SecretsError::Persistence { .. } => ErrorKind::Persistence,
            SecretsError::BindingCollision { .. } => ErrorKind::BindingCollision,
        }
    }

    /// The offending identifier (secret name, binding name, or context value).
    pub fn identifier(&self) -> Option<&str> {
        match self {
            SecretsError::InvalidName { value, .. } => Some(value),
            SecretsError::InvalidContext(value) => Some(value),
            SecretsError::RemoteUnavailable { name, .. } => name.as_deref(),
            SecretsError::NotFound(name) => Some(name),
            SecretsError::DuplicateKey { name, .. } => Some(name),
            SecretsError::Persistence { name, .. } => Some(name),
            SecretsError::BindingCollision { name } => Some(name),
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, SecretsError::DuplicateKey { .. })
    }

    pub(crate) fn remote(
        operation: &'static str,
        name: Option<&str>,
        message: impl std::fmt::Display,
    ) -> Self {
        SecretsError::RemoteUnavailable {
            operation,
            name: name.map(String::from),
            message: message.to_string(),
        }
    }

    pub(crate) fn persistence(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SecretsError::Persistence {
            name: name.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SecretsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_identifiers() {
        let err = SecretsError::InvalidName {
            field: "name",
            value: "my-secret".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.identifier(), Some("my-secret"));

        let err = SecretsError::remote("list", None, "connection refused");
        assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
        assert!(err.identifier().is_none());
        assert_eq!(
            err.to_string(),
            "Remote secret store unavailable during list: connection refused"
        );

        let err = SecretsError::remote("get", Some("API_KEY"), "timed out");
        assert_eq!(
            err.to_string(),
            "Remote secret store unavailable during get of 'API_KEY': timed out"
        );
    }

    #[test]
    fn duplicate_key_detection() {
        let err = SecretsError::DuplicateKey {
            name: "API_KEY".into(),
            environment: "dev".into(),
        };
        assert!(err.is_duplicate_key());
        assert!(!SecretsError::NotFound("X".into()).is_duplicate_key());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::BindingCollision).unwrap();
        assert_eq!(json, "\"binding_collision\"");
        assert_eq!(ErrorKind::RemoteUnavailable.to_string(), "remote_unavailable");
    }
}
