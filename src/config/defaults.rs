//! Default configuration constants used across the system.

/// Default environment partition.
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// Default remote call timeout (10 seconds).
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 10_000;

/// State directory name under the home directory.
pub const STATE_DIR_NAME: &str = ".secretsync";

/// SQLite file name inside the state directory.
pub const DATABASE_FILE_NAME: &str = "secrets.db";

/// File-backed remote store inside the state directory.
pub const REMOTE_FILE_NAME: &str = "remote-secrets.json";

/// Subdirectory of the state directory holding the loader script.
pub const LOADER_DIR_NAME: &str = "bootstrap";

/// Program name the loader falls back to.
pub const DEFAULT_PROGRAM: &str = "secretsync";

/// Config file names searched in the working directory, in order.
pub const CONFIG_FILE_CANDIDATES: [&str; 4] = [
    "secretsync.json",
    "secretsync.yaml",
    "secretsync.yml",
    "secretsync.toml",
];
