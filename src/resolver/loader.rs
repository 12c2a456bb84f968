//! Static loader script for early-bootstrap bindings.
//!
//! The script is sourced before the main process starts, so that
//! `early_bootstrap` bindings already exist in its environment.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::bindings::shell_quote;
use crate::secrets::LoadContext;

/// File name of the generated loader.
pub const LOADER_FILE_NAME: &str = "secretsync-loader.sh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderArtifact {
    /// Where the script is written.
    pub path: PathBuf,
    /// Executable invoked by the script.
    pub program: String,
    pub environment: String,
    pub config_path: Option<PathBuf>,
}

impl LoaderArtifact {
    pub fn render(&self) -> String {
        let mut command = shell_quote(&self.program);
        if let Some(ref config) = self.config_path {
            command.push_str(" --config ");
            command.push_str(&shell_quote(&config.display().to_string()));
        }
        command.push_str(" --environment ");
        command.push_str(&shell_quote(&self.environment));
        command.push_str(&format!(
            " define-constants {} --export",
            LoadContext::EarlyBootstrap
        ));

        format!(
            "#!/bin/sh\n\
             # Generated by secretsync. Source this file before starting the\n\
             # application to define early-bootstrap bindings.\n\
             eval \"$({command})\"\n"
        )
    }

    /// Write the script, creating parent directories. Reports failure as
    /// `false` and never errors.
    pub fn write(&self) -> bool {
        match self.try_write() {
            Ok(()) => {
                info!(path = %self.path.display(), "loader artifact written");
                true
            }
            Err(e) => {
                warn!(path = %self.path.display(), "failed to write loader artifact: {e}");
                false
            }
        }
    }

    fn try_write(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, self.render())?;
        make_executable(&self.path)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(path: PathBuf) -> LoaderArtifact {
        LoaderArtifact {
            path,
            program: "/usr/local/bin/secretsync".into(),
            environment: "live".into(),
            config_path: Some(PathBuf::from("/etc/secretsync.toml")),
        }
    }

    #[test]
    fn render_invokes_early_bootstrap() {
        let script = artifact(PathBuf::from("loader.sh")).render();
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains(
            "eval \"$('/usr/local/bin/secretsync' --config '/etc/secretsync.toml' \
             --environment 'live' define-constants early_bootstrap --export)\""
        ));
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bootstrap").join(LOADER_FILE_NAME);
        assert!(artifact(path.clone()).write());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("define-constants early_bootstrap"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn write_failure_returns_false() {
        let dir = TempDir::new().unwrap();
        // A regular file where a directory is needed.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        assert!(!artifact(blocker.join(LOADER_FILE_NAME)).write());
    }
}
