use anyhow::{bail, Context, Result};
use std::path::Path;

use super::Config;

/// Maximum size for a config file (1 MB).
pub const MAX_CONFIG_FILE_BYTES: u64 = 1024 * 1024;

/// Parse a JSON5 configuration string.
pub fn parse_config_json5(content: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = json5::from_str(content)?;
    Ok(value)
}

/// Parse config text according to the file extension (`yaml`/`yml`, `toml`,
/// anything else as JSON5).
pub fn parse_config_str(content: &str, ext: &str) -> Result<serde_json::Value> {
    match ext {
        "yaml" | "yml" => Ok(serde_yaml::from_str(content)?),
        "toml" => Ok(toml::from_str(content)?),
        _ => parse_config_json5(content),
    }
}

/// Read a configuration file into a JSON value.
///
/// The config may carry a remote API token, so the file is checked first:
/// - size guardrail (`MAX_CONFIG_FILE_BYTES`)
/// - a symlink as the final component is rejected
/// - a hardlinked file is rejected
pub fn read_config_file_snapshot(path: &Path) -> Result<serde_json::Value> {
    let metadata = std::fs::symlink_metadata(path)
        .with_context(|| format!("Cannot stat config file '{}'", path.display()))?;

    #[cfg(unix)]
    if metadata.file_type().is_symlink() {
        bail!(
            "Config file '{}' is a symlink, refusing to follow it",
            path.display()
        );
    }

    if metadata.len() > MAX_CONFIG_FILE_BYTES {
        bail!(
            "Config file '{}' is {} bytes, exceeds limit of {} bytes",
            path.display(),
            metadata.len(),
            MAX_CONFIG_FILE_BYTES,
        );
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if metadata.is_file() && metadata.nlink() > 1 {
            bail!(
                "Config file '{}' has {} hard links, refusing to read it",
                path.display(),
                metadata.nlink(),
            );
        }
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    parse_config_str(&content, ext)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Read and deserialize a config file. Missing sections take defaults.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let value = read_config_file_snapshot(path)?;
    let config: Config = serde_json::from_value(value)
        .with_context(|| format!("Invalid configuration in '{}'", path.display()))?;
    Ok(config)
}

/// Write configuration to a file, in the format its extension names.
pub fn write_config_file(path: &Path, config: &Config) -> Result<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::to_string(config)?,
        Some("toml") => toml::to_string_pretty(config)?,
        _ => serde_json::to_string_pretty(config)?,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file '{}'", path.display()))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn read_json5_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("secretsync.json");
        fs::write(
            &file,
            "{\n  // staging box\n  environment: 'staging',\n  remote: { timeoutMs: 2500 },\n}\n",
        )
        .unwrap();

        let config = load_config_file(&file).unwrap();
        assert_eq!(config.environment, "staging");
        assert_eq!(config.remote.timeout_ms, 2500);
        assert_eq!(config.remote.kind, RemoteKind::File);
    }

    #[test]
    fn read_yaml_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("secretsync.yaml");
        fs::write(
            &file,
            "environment: live\nremote:\n  kind: http\n  baseUrl: https://vault.internal/api\n",
        )
        .unwrap();

        let config = load_config_file(&file).unwrap();
        assert_eq!(config.environment, "live");
        assert_eq!(config.remote.kind, RemoteKind::Http);
        assert_eq!(
            config.remote.base_url.as_deref(),
            Some("https://vault.internal/api")
        );
    }

    #[test]
    fn read_toml_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("secretsync.toml");
        fs::write(&file, "environment = \"qa\"\n\n[logging]\njson = true\n").unwrap();

        let config = load_config_file(&file).unwrap();
        assert_eq!(config.environment, "qa");
        assert!(config.logging.json);
    }

    #[test]
    fn reject_oversized_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("huge.json");
        let content = "x".repeat((MAX_CONFIG_FILE_BYTES + 1) as usize);
        fs::write(&file, content).unwrap();

        let result = read_config_file_snapshot(&file);
        assert!(result.unwrap_err().to_string().contains("exceeds limit"));
    }

    #[cfg(unix)]
    #[test]
    fn reject_hardlinked_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("secretsync.json");
        let link = dir.path().join("alias.json");
        fs::write(&file, "{}").unwrap();
        fs::hard_link(&file, &link).unwrap();

        let result = read_config_file_snapshot(&file);
        assert!(result.unwrap_err().to_string().contains("hard links"));
    }

    #[cfg(unix)]
    #[test]
    fn reject_symlinked_config() {
        let dir = TempDir::new().unwrap();
        let real_file = dir.path().join("real.json");
        let symlink = dir.path().join("link.json");
        fs::write(&real_file, "{}").unwrap();
        std::os::unix::fs::symlink(&real_file, &symlink).unwrap();

        let result = read_config_file_snapshot(&symlink);
        assert!(result.unwrap_err().to_string().contains("symlink"));
    }

    #[test]
    fn written_config_reads_back() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("nested").join("secretsync.yaml");
        let mut config = Config::default();
        config.environment = "live".into();

        write_config_file(&file, &config).unwrap();
        let loaded = load_config_file(&file).unwrap();
        assert_eq!(loaded.environment, "live");
        assert_eq!(loaded.remote.timeout_ms, config.remote.timeout_ms);
    }
}
