use super::{Config, RemoteKind};
use anyhow::Result;
use tracing::warn;

/// Validation errors for configuration.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn error(path: &str, message: impl Into<String>) -> ConfigValidationError {
    ConfigValidationError {
        path: path.to_string(),
        message: message.into(),
    }
}

/// Validate a configuration object.
pub fn validate_config(config: &Config) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    if config.environment.trim().is_empty() {
        errors.push(error("environment", "Environment must not be empty"));
    } else if config.environment.chars().any(char::is_whitespace) {
        errors.push(error("environment", "Environment must not contain whitespace"));
    }

    if config.remote.timeout_ms == 0 {
        errors.push(error("remote.timeoutMs", "Timeout must be greater than 0"));
    }

    match config.remote.kind {
        RemoteKind::Http => match config.remote.base_url.as_deref() {
            None | Some("") => {
                errors.push(error("remote.baseUrl", "HTTP remote requires a base URL"));
            }
            Some(base) => {
                if let Err(e) = url::Url::parse(base) {
                    errors.push(error("remote.baseUrl", format!("Invalid URL: {e}")));
                }
            }
        },
        RemoteKind::File => {
            if config.remote.token.is_some() {
                warn!("remote.token is set but the file remote ignores it");
            }
        }
    }

    errors
}

/// Validate configuration and return Result.
pub fn validate_config_object(config: &Config) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Configuration validation failed:\n{}", messages.join("\n"));
    }
}
