//! Subcommand handlers. Each one builds its collaborators from the loaded
//! [`Config`] and prints to stdout; diagnostics go through `tracing`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{
    Cli, Commands, ConfigAction, CreateOpts, DefineOpts, DeleteOpts, GetOpts, ListOpts,
    OutputFormat, RunOpts, SyncOpts, UpdateOpts,
};
use crate::config::{validate_config_object, Config, RemoteKind};
use crate::remote::{FileRemoteClient, HttpRemoteClient, RemoteSecretClient};
use crate::resolver::{ConstantResolver, LoaderArtifact};
use crate::secrets::{
    redact_secret, NewSecret, SecretRecord, SecretUpdate, SecretsError, SecretsService,
};
use crate::store::{RecordStore, SqliteRecordStore};
use crate::sync::SyncEngine;

/// Collaborators shared by every subcommand.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub remote: Arc<dyn RemoteSecretClient>,
}

impl AppContext {
    pub fn from_config(config: Config) -> Result<Self> {
        validate_config_object(&config)?;

        let db_path = config.database_path();
        let store = SqliteRecordStore::open(&db_path)
            .with_context(|| format!("Failed to open record store at {}", db_path.display()))?;

        let remote: Arc<dyn RemoteSecretClient> = match config.remote.kind {
            RemoteKind::Http => {
                let base = config
                    .remote
                    .base_url
                    .as_deref()
                    .context("remote.baseUrl is required for the http remote")?;
                Arc::new(HttpRemoteClient::new(
                    base,
                    config.remote.token.clone(),
                    config.remote_timeout(),
                )?)
            }
            RemoteKind::File => Arc::new(FileRemoteClient::new(config.remote_file_path())),
        };

        Ok(Self {
            config,
            store: Arc::new(store),
            remote,
        })
    }

    pub fn service(&self) -> SecretsService {
        SecretsService::new(
            self.store.clone(),
            self.remote.clone(),
            &self.config.environment,
            self.config.remote_timeout(),
        )
    }

    pub fn sync_engine(&self) -> SyncEngine {
        SyncEngine::new(
            self.store.clone(),
            self.remote.clone(),
            self.config.remote_timeout(),
        )
    }

    pub fn resolver(&self) -> ConstantResolver {
        ConstantResolver::new(
            self.store.clone(),
            self.remote.clone(),
            &self.config.environment,
            self.config.remote_timeout(),
        )
        .with_loader(self.loader_artifact())
    }

    pub fn loader_artifact(&self) -> LoaderArtifact {
        LoaderArtifact {
            path: self.config.loader_path(),
            program: self.config.loader_program(),
            environment: self.config.environment.clone(),
            config_path: self
                .config
                .source
                .as_ref()
                .map(|p| std::fs::canonicalize(p).unwrap_or_else(|_| p.clone())),
        }
    }
}

/// Run the parsed command line. Returns the process exit code.
pub async fn execute(cli: Cli) -> Result<i32> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(env) = cli.environment {
        config.environment = env;
    }
    crate::logging::init(&config.logging);

    match cli.command {
        Commands::Version => {
            println!("secretsync {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        Commands::Config(opts) => {
            config_command(&config, cli.config.as_deref(), opts.action)?;
            Ok(0)
        }
        command => {
            let app = AppContext::from_config(config)?;
            dispatch(&app, command).await
        }
    }
}

async fn dispatch(app: &AppContext, command: Commands) -> Result<i32> {
    match command {
        Commands::List(opts) => list(app, opts)?,
        Commands::Get(opts) => get(app, opts).await?,
        Commands::Create(opts) => create(app, opts).await?,
        Commands::Update(opts) => update(app, opts).await?,
        Commands::Delete(opts) => delete(app, opts).await?,
        Commands::Sync(opts) => return sync(app, opts).await,
        Commands::DefineConstants(opts) => return define_constants(app, opts).await,
        Commands::Run(opts) => return run(app, opts).await,
        Commands::GenerateLoader => {
            let resolver = app.resolver();
            if !resolver.generate_loader_artifact() {
                return Ok(1);
            }
            println!("{}", app.config.loader_path().display());
        }
        Commands::Config(_) | Commands::Version => {}
    }
    Ok(0)
}

fn list(app: &AppContext, opts: ListOpts) -> Result<()> {
    let records = app.service().list()?;
    match opts.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Table => print!("{}", render_table(&records)),
    }
    Ok(())
}

async fn get(app: &AppContext, opts: GetOpts) -> Result<()> {
    let service = app.service();
    let record = service.get(&opts.name)?;
    let value = if opts.show_value {
        service.fetch_value(&opts.name).await?
    } else {
        None
    };

    match opts.format {
        OutputFormat::Json => {
            let mut json = serde_json::to_value(&record)?;
            if let Some(ref v) = value {
                json["value"] = serde_json::Value::String(redact_secret(v));
            }
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table => {
            print!("{}", render_table(std::slice::from_ref(&record)));
            if let Some(ref v) = value {
                println!("value: {}", redact_secret(v));
            }
        }
    }
    Ok(())
}

async fn create(app: &AppContext, opts: CreateOpts) -> Result<()> {
    let record = app
        .service()
        .create(NewSecret {
            name: opts.name,
            label: opts.label,
            value: opts.value,
            constant_name: opts.constant_name,
            load_context: opts.load_context,
            constant_enabled: opts.enable_constant,
        })
        .await?;
    println!("created {} (id {})", record.name, record.id.unwrap_or_default());
    Ok(())
}

async fn update(app: &AppContext, opts: UpdateOpts) -> Result<()> {
    let constant_enabled = opts.constant_enabled();
    let changes = SecretUpdate {
        label: opts.label,
        value: opts.value,
        constant_name: opts.constant_name,
        load_context: opts.load_context,
        constant_enabled,
    };
    if changes.is_empty() {
        warn!(name = %opts.name, "nothing to update");
    }
    let record = app.service().update(&opts.name, changes).await?;
    println!("updated {}", record.name);
    Ok(())
}

async fn delete(app: &AppContext, opts: DeleteOpts) -> Result<()> {
    app.service().delete(&opts.name, opts.force).await?;
    println!("deleted {}", opts.name);
    Ok(())
}

async fn sync(app: &AppContext, opts: SyncOpts) -> Result<i32> {
    let report = app.sync_engine().sync(&app.config.environment).await?;
    match opts.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => {
            println!(
                "created: {}  updated: {}  deleted: {}",
                report.created, report.updated, report.deleted
            );
            for failure in &report.failures {
                println!("failed: {} ({}): {}", failure.name, failure.kind, failure.message);
            }
        }
    }
    Ok(if report.is_clean() { 0 } else { 2 })
}

async fn define_constants(app: &AppContext, opts: DefineOpts) -> Result<i32> {
    let (output, code) = render_definitions(app, opts).await?;
    print!("{output}");
    Ok(code)
}

/// Stdout text and exit code for `define-constants`. A binding collision
/// stops resolution, but with `--export` the bindings defined before it are
/// still printed so an `eval` of the output keeps them.
async fn render_definitions(app: &AppContext, opts: DefineOpts) -> Result<(String, i32)> {
    let mut resolver = app.resolver();
    let (report, code) = match resolver.define_for(opts.context).await {
        Ok(report) => (Some(report), 0),
        Err(err @ SecretsError::BindingCollision { .. }) if opts.export => {
            eprintln!("error: {err}");
            (None, 1)
        }
        Err(err) => return Err(err.into()),
    };

    if opts.export {
        return Ok((resolver.bindings().to_shell_exports(), code));
    }

    let mut out = String::new();
    if let Some(report) = report {
        for name in &report.defined {
            out.push_str(&format!("defined {name}\n"));
        }
        for skipped in &report.skipped {
            out.push_str(&format!("skipped {}: {}\n", skipped.name, skipped.reason));
        }
    }
    Ok((out, code))
}

async fn run(app: &AppContext, opts: RunOpts) -> Result<i32> {
    let mut resolver = app.resolver();
    resolver.define_for(opts.context).await?;
    let bindings = resolver.into_bindings();

    let Some((program, args)) = opts.command.split_first() else {
        anyhow::bail!("no command given");
    };
    info!(program = %program, bindings = bindings.len(), "starting child process");

    let status = tokio::process::Command::new(program)
        .args(args)
        .envs(bindings.iter())
        .status()
        .await
        .with_context(|| format!("Failed to start '{program}'"))?;

    Ok(status.code().unwrap_or(1))
}

fn config_command(config: &Config, path: Option<&str>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut shown = config.clone();
            if let Some(ref token) = shown.remote.token {
                shown.remote.token = Some(redact_secret(token));
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        ConfigAction::Validate => {
            validate_config_object(config)?;
            println!("Configuration is valid");
        }
        ConfigAction::Init => {
            let target = PathBuf::from(path.unwrap_or("secretsync.json"));
            if target.exists() {
                anyhow::bail!("Config file '{}' already exists", target.display());
            }
            Config::write_default(&target)?;
            println!("Configuration file created at {}", target.display());
        }
    }
    Ok(())
}

fn render_table(records: &[SecretRecord]) -> String {
    let header = ["NAME", "CONSTANT", "ENABLED", "CONTEXT", "STATUS", "OWNED", "LABEL"];
    let rows: Vec<[String; 7]> = records
        .iter()
        .map(|r| {
            [
                r.name.clone(),
                r.binding_name().to_string(),
                yes_no(r.constant_enabled).to_string(),
                r.load_context.to_string(),
                r.status.to_string(),
                yes_no(r.owned_by_system).to_string(),
                r.label.clone(),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_row = |cells: &[&str]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };
    push_row(&header);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        push_row(&cells);
    }
    out
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
