//! archive-migrate CLI - migrate legacy dbt archive tables to snapshots.

use archive_migrate::config::default_profiles_dir;
use archive_migrate::{
    drivers, Backend, LocalFiles, MigrateError, MigrationPlanBuilder, Orchestrator,
    ProfilesConfig, ProjectConfig, RunContext, RunFlags,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "archive-migrate")]
#[command(about = "Migrate dbt archive tables to the snapshot column layout")]
#[command(version)]
struct Cli {
    /// Profile to connect with [default: `profile:` in dbt_project.yml]
    #[arg(long)]
    profile: Option<String>,

    /// Output within the profile [default: the profile's `target:`]
    #[arg(long)]
    target: Option<String>,

    /// Directory containing profiles.yml [default: ~/.dbt]
    #[arg(long, env = "DBT_PROFILES_DIR")]
    profiles_dir: Option<PathBuf>,

    /// Directory containing dbt_project.yml
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Log format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Do not write snapshot definition files
    #[arg(long)]
    no_files: bool,

    /// Do not back up or rename anything in the warehouse
    #[arg(long)]
    no_database_operations: bool,

    /// Rename without taking a backup first
    #[arg(long)]
    no_backups: bool,

    /// Output the JSON report to stdout
    #[arg(long)]
    output_json: bool,
}

impl Cli {
    fn flags(&self) -> RunFlags {
        RunFlags {
            migrate_database: !self.no_database_operations,
            write_files: !self.no_files,
            backup: !self.no_backups,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(cli.debug, cli.log_format);

    let project = ProjectConfig::load(&cli.project_dir)?;
    info!(
        "Loaded project from {} ({} archive groups)",
        cli.project_dir.display(),
        project.archive.len()
    );

    let profile_name = cli
        .profile
        .clone()
        .or_else(|| project.profile.clone())
        .ok_or_else(|| {
            MigrateError::Config("no profile given; pass --profile or set `profile:`".into())
        })?;
    let profiles_dir = cli.profiles_dir.clone().unwrap_or_else(default_profiles_dir);
    let resolved = ProfilesConfig::load(&profiles_dir)?.resolve(&profile_name, cli.target.as_deref())?;
    let backend: Backend = resolved.output.backend()?;
    let capability = backend.capability();
    info!(
        "Using profile '{}' target '{}' ({})",
        resolved.profile, resolved.target, backend
    );

    let default_database = resolved.output.default_database()?.to_string();
    let plan = MigrationPlanBuilder::new(&project, default_database, capability);

    let cancel_token = setup_signal_handler();
    let orchestrator = Orchestrator::new(capability, project.snapshot_dir(&cli.project_dir)?)
        .with_cancellation(cancel_token);

    let flags = cli.flags();
    let mut files = LocalFiles::new();

    let mut session = if flags.migrate_database {
        Some(drivers::connect(&resolved.output, "migration").await?)
    } else {
        None
    };

    let mut ctx = RunContext::new(backend, &mut files, flags);
    if let Some(ref mut session) = session {
        ctx = ctx.with_session(&mut **session);
    }
    let outcome = orchestrator.run_plan(&mut ctx, &plan).await;
    let report = ctx.into_report();

    if cli.output_json {
        println!("{}", report.to_json()?);
    }

    outcome
}

fn setup_logging(debug: bool, format: LogFormat) {
    let level = if debug { Level::DEBUG } else { Level::INFO };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM. The run stops before the next
/// table once the returned token is cancelled.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Stopping after the current table...", name);
                    token.cancel();
                }
                Err(e) => tracing::warn!("Could not install {} handler: {}", name, e),
            }
        });
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Stopping after the current table...");
                token.cancel();
            }
            Err(e) => tracing::warn!("Could not install Ctrl-C handler: {}", e),
        }
    });

    cancel_token
}
