mod commands;

pub use commands::{execute, AppContext};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::secrets::LoadContext;

#[derive(Parser)]
#[command(
    name = "secretsync",
    version,
    about = "Mirror remote secret metadata locally and materialize secrets as bindings"
)]
pub struct Cli {
    /// Config file (JSON5, YAML or TOML).
    #[arg(short, long, global = true, env = "SECRETSYNC_CONFIG")]
    pub config: Option<String>,

    /// Environment partition; overrides the configured one.
    #[arg(short, long, global = true)]
    pub environment: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tracked secrets of the environment.
    List(ListOpts),
    /// Show one tracked secret.
    Get(GetOpts),
    /// Store a new secret remotely and track it.
    Create(CreateOpts),
    /// Edit a tracked secret.
    Update(UpdateOpts),
    /// Stop tracking a secret.
    Delete(DeleteOpts),
    /// Reconcile local records with the remote store.
    Sync(SyncOpts),
    /// Resolve bindings for a load context.
    DefineConstants(DefineOpts),
    /// Resolve bindings and run a command with them in its environment.
    Run(RunOpts),
    /// Write the early-bootstrap loader script.
    GenerateLoader,
    Config(ConfigOpts),
    Version,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Args)]
pub struct ListOpts {
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct GetOpts {
    pub name: String,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// Also print the remote value, redacted.
    #[arg(long)]
    pub show_value: bool,
}

#[derive(Args)]
pub struct CreateOpts {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub label: Option<String>,
    #[arg(long, env = "SECRETSYNC_VALUE", hide_env_values = true)]
    pub value: String,
    /// Binding name; defaults to the secret name.
    #[arg(long = "constant")]
    pub constant_name: Option<String>,
    #[arg(long, value_parser = parse_load_context, default_value = "manual")]
    pub load_context: LoadContext,
    #[arg(long)]
    pub enable_constant: bool,
}

#[derive(Args)]
pub struct UpdateOpts {
    pub name: String,
    #[arg(long)]
    pub label: Option<String>,
    #[arg(long, env = "SECRETSYNC_VALUE", hide_env_values = true)]
    pub value: Option<String>,
    #[arg(long = "constant")]
    pub constant_name: Option<String>,
    #[arg(long, value_parser = parse_load_context)]
    pub load_context: Option<LoadContext>,
    #[arg(long, conflicts_with = "disable_constant")]
    pub enable_constant: bool,
    #[arg(long)]
    pub disable_constant: bool,
}

impl UpdateOpts {
    pub fn constant_enabled(&self) -> Option<bool> {
        match (self.enable_constant, self.disable_constant) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args)]
pub struct DeleteOpts {
    pub name: String,
    /// Also delete the secret from the remote store.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct SyncOpts {
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct DefineOpts {
    #[arg(value_parser = parse_load_context)]
    pub context: LoadContext,
    /// Print `export NAME='value'` lines for `eval`.
    #[arg(long)]
    pub export: bool,
}

#[derive(Args)]
pub struct RunOpts {
    #[arg(value_parser = parse_load_context)]
    pub context: LoadContext,
    #[arg(last = true, required = true, num_args = 1..)]
    pub command: Vec<String>,
}

#[derive(Args)]
pub struct ConfigOpts {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
    /// Write a default config file (to `--config` or `secretsync.json`).
    Init,
}

fn parse_load_context(s: &str) -> Result<LoadContext, String> {
    s.parse().map_err(|e: crate::secrets::SecretsError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["secretsync", "sync", "--environment", "live"]).unwrap();
        assert_eq!(cli.environment.as_deref(), Some("live"));
        assert!(matches!(cli.command, Commands::Sync(_)));
    }

    #[test]
    fn define_constants_accepts_alias() {
        let cli =
            Cli::try_parse_from(["secretsync", "define-constants", "mu_plugin", "--export"]).unwrap();
        match cli.command {
            Commands::DefineConstants(opts) => {
                assert_eq!(opts.context, LoadContext::EarlyBootstrap);
                assert!(opts.export);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn define_constants_rejects_unknown_context() {
        assert!(Cli::try_parse_from(["secretsync", "define-constants", "startup"]).is_err());
    }

    #[test]
    fn run_collects_trailing_command() {
        let cli = Cli::try_parse_from([
            "secretsync",
            "run",
            "deferred_bootstrap",
            "--",
            "app",
            "--port",
            "8080",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(opts) => {
                assert_eq!(opts.context, LoadContext::DeferredBootstrap);
                assert_eq!(opts.command, vec!["app", "--port", "8080"]);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn update_enable_and_disable_conflict() {
        assert!(Cli::try_parse_from([
            "secretsync",
            "update",
            "API_KEY",
            "--enable-constant",
            "--disable-constant",
        ])
        .is_err());
    }
}
