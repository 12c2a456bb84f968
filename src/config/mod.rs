mod defaults;
mod io;
mod types;
mod validation;

pub use defaults::*;
pub use io::*;
pub use types::*;
pub use validation::*;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Top-level secretsync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Environment partition every command operates on.
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    /// State directory for persistent data.
    #[serde(skip)]
    pub state_dir: PathBuf,

    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file, environment, and defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(find_config_file);

        let mut config = match config_path {
            Some(ref p) if p.exists() => {
                debug!("Loading config from {}", p.display());
                let mut config = load_config_file(p)?;
                config.source = Some(p.clone());
                config
            }
            Some(ref p) if path.is_some() => {
                anyhow::bail!("Config file '{}' does not exist", p.display());
            }
            _ => {
                debug!("No config file found, using defaults");
                Config::default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.state_dir = resolve_state_dir(std::env::var("SECRETSYNC_STATE_DIR").ok());

        Ok(config)
    }

    /// Write default configuration to a file.
    pub fn write_default(path: &Path) -> Result<()> {
        write_config_file(path, &Config::default())
    }

    /// Apply `SECRETSYNC_*` overrides read through `var`.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(env) = var("SECRETSYNC_ENVIRONMENT").filter(|v| !v.is_empty()) {
            self.environment = env;
        }

        if let Some(db) = var("SECRETSYNC_DATABASE").filter(|v| !v.is_empty()) {
            self.database.path = Some(PathBuf::from(db));
        }

        if let Some(url) = var("SECRETSYNC_REMOTE_URL").filter(|v| !v.is_empty()) {
            self.remote.base_url = Some(url);
            self.remote.kind = RemoteKind::Http;
        }

        if let Some(token) = var("SECRETSYNC_REMOTE_TOKEN").filter(|v| !v.is_empty()) {
            self.remote.token = Some(token);
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| self.state_dir.join(DATABASE_FILE_NAME))
    }

    pub fn remote_file_path(&self) -> PathBuf {
        self.remote
            .path
            .clone()
            .unwrap_or_else(|| self.state_dir.join(REMOTE_FILE_NAME))
    }

    pub fn loader_path(&self) -> PathBuf {
        self.loader.path.clone().unwrap_or_else(|| {
            self.state_dir
                .join(LOADER_DIR_NAME)
                .join(crate::resolver::LOADER_FILE_NAME)
        })
    }

    /// Executable the loader script invokes.
    pub fn loader_program(&self) -> String {
        if let Some(ref program) = self.loader.program {
            return program.clone();
        }
        std::env::current_exe()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| DEFAULT_PROGRAM.to_string())
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            database: DatabaseConfig::default(),
            remote: RemoteConfig::default(),
            loader: LoaderConfig::default(),
            logging: LoggingConfig::default(),
            state_dir: resolve_state_dir(None),
            source: None,
        }
    }
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

/// Find the configuration file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILE_CANDIDATES {
        let path = PathBuf::from(name);
        if path.exists() {
            return Some(path);
        }
    }

    let home_config = dirs::home_dir()?.join(STATE_DIR_NAME).join("config.json");
    home_config.exists().then_some(home_config)
}

/// Resolve the state directory for persistent data.
fn resolve_state_dir(override_dir: Option<String>) -> PathBuf {
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }

    dirs::home_dir()
        .map(|h| h.join(STATE_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(STATE_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.environment, "dev");
        assert_eq!(config.remote.kind, RemoteKind::File);
        assert_eq!(config.remote_timeout(), Duration::from_secs(10));
        assert!(config.database_path().ends_with(DATABASE_FILE_NAME));
        assert!(config
            .loader_path()
            .ends_with(Path::new("bootstrap").join("secretsync-loader.sh")));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        config.apply_env_overrides(vars(&[
            ("SECRETSYNC_ENVIRONMENT", "live"),
            ("SECRETSYNC_DATABASE", "/var/lib/secretsync/db.sqlite"),
            ("SECRETSYNC_REMOTE_URL", "https://vault.example.com"),
            ("SECRETSYNC_REMOTE_TOKEN", "t0ken"),
        ]));

        assert_eq!(config.environment, "live");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/secretsync/db.sqlite")
        );
        assert_eq!(config.remote.kind, RemoteKind::Http);
        assert_eq!(config.remote.token.as_deref(), Some("t0ken"));
    }

    #[test]
    fn empty_env_values_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(vars(&[("SECRETSYNC_ENVIRONMENT", "")]));
        assert_eq!(config.environment, "dev");
    }

    #[test]
    fn state_dir_override() {
        assert_eq!(
            resolve_state_dir(Some("/tmp/ss".into())),
            PathBuf::from("/tmp/ss")
        );
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(Config::load(missing.to_str()).is_err());
    }

    #[test]
    fn token_not_serialized_when_absent() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json["remote"].get("token").is_none());
        assert_eq!(json["remote"]["timeoutMs"], 10_000);
    }
}
