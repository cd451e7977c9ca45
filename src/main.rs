//! Audit Vault - tamper-evident audit trail, integrity-checked backups and compliance reports.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use audit_vault::audit::{AuditError, AuditFilter, AuditInput, Category, Severity};
use audit_vault::backup::{BackupError, BackupType};
use audit_vault::clock::SystemClock;
use audit_vault::config::{ConfigError, ConfigLoader};
use audit_vault::display;
use audit_vault::export::{ExportError, ExportFormat};
use audit_vault::scheduler::SchedulerError;
use audit_vault::store::{default_store_path, SqliteStore, StoreError};
use audit_vault::AuditVault;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackupTypeArg {
    Full,
    Incremental,
    Differential,
}

impl From<BackupTypeArg> for BackupType {
    fn from(arg: BackupTypeArg) -> Self {
        match arg {
            BackupTypeArg::Full => BackupType::Full,
            BackupTypeArg::Incremental => BackupType::Incremental,
            BackupTypeArg::Differential => BackupType::Differential,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SeverityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Low => Severity::Low,
            SeverityArg::Medium => Severity::Medium,
            SeverityArg::High => Severity::High,
            SeverityArg::Critical => Severity::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    Authentication,
    Data,
    System,
    Security,
    Admin,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Authentication => Category::Authentication,
            CategoryArg::Data => Category::Data,
            CategoryArg::System => Category::System,
            CategoryArg::Security => Category::Security,
            CategoryArg::Admin => Category::Admin,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "audit-vault",
    about = "Tamper-evident audit trail, integrity-checked backups and compliance reports",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the vault database.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, restore and manage backups.
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Inspect and maintain the audit log.
    #[command(subcommand)]
    Audit(AuditCommand),
    /// Generate a compliance report for a time window.
    Report {
        /// Window start (RFC 3339 or YYYY-MM-DD).
        #[arg(long, value_parser = parse_start)]
        from: DateTime<Utc>,
        /// Window end, inclusive (RFC 3339 or YYYY-MM-DD).
        #[arg(long, value_parser = parse_end)]
        to: DateTime<Utc>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Export audit entries to CSV or JSON.
    Export {
        #[arg(short, long, value_enum, default_value_t = FormatArg::Csv)]
        format: FormatArg,
        #[arg(long, value_enum)]
        severity: Option<SeverityArg>,
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
        /// Only entries by this actor id.
        #[arg(long)]
        actor: Option<String>,
        /// Only entries whose action contains this text.
        #[arg(long)]
        action: Option<String>,
        /// Output file, `-` for stdout. Defaults to the generated filename.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Run the daily backup scheduler until Ctrl-C.
    Schedule,
}

#[derive(Subcommand)]
enum BackupCommand {
    /// Snapshot the tracked keys.
    Create {
        #[arg(short = 't', long = "type", value_enum, default_value_t = BackupTypeArg::Full)]
        backup_type: BackupTypeArg,
        #[arg(short, long, default_value = "Manual backup")]
        description: String,
    },
    /// List unexpired backups, newest first.
    List,
    /// Restore a backup after verifying its checksum.
    Restore { id: String },
    /// Check a backup's checksum without restoring.
    Verify { id: String },
    /// Delete a backup.
    Delete { id: String },
    /// Remove backups past their retention window.
    Cleanup,
}

#[derive(Subcommand)]
enum AuditCommand {
    /// Record an entry.
    Record {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        resource: String,
        #[arg(long)]
        resource_id: Option<String>,
        #[arg(long, value_enum, default_value_t = SeverityArg::Low)]
        severity: SeverityArg,
        #[arg(long, value_enum, default_value_t = CategoryArg::System)]
        category: CategoryArg,
        /// Mark the action as failed with this message.
        #[arg(long)]
        failed: Option<String>,
    },
    /// Show log statistics.
    Stats,
    /// Delete entries older than the given number of days.
    Purge {
        #[arg(long, default_value_t = 90)]
        days: u32,
    },
    /// Show recent high and critical entries.
    Critical {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error(transparent)]
    Backup(#[from] BackupError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to wait for Ctrl-C: {0}")]
    Signal(std::io::Error),
    #[error("Backup {0} failed verification")]
    VerifyFailed(String),
}

fn parse_time(s: &str, end_of_day: bool) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("expected RFC 3339 or YYYY-MM-DD: {e}"))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .ok_or_else(|| format!("invalid date {s}"))
}

fn parse_start(s: &str) -> Result<DateTime<Utc>, String> {
    parse_time(s, false)
}

fn parse_end(s: &str) -> Result<DateTime<Utc>, String> {
    parse_time(s, true)
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn open_vault(cli: &Cli) -> Result<AuditVault, CliError> {
    let loader = cli
        .config
        .clone()
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = loader.load()?;

    let db = cli.db.clone().unwrap_or_else(default_store_path);
    let store = SqliteStore::open(&db).await?;
    tracing::info!(db = %db.display(), "Opened vault");

    Ok(AuditVault::new(config, Arc::new(store), Arc::new(SystemClock)))
}

async fn run_backup(vault: &AuditVault, command: BackupCommand) -> Result<(), CliError> {
    let engine = vault.engine();
    match command {
        BackupCommand::Create {
            backup_type,
            description,
        } => {
            let snapshot = engine
                .create_backup(backup_type.into(), &description)
                .await?;
            display::print_backup(&snapshot);
        }
        BackupCommand::List => display::print_backup_list(&engine.list_backups().await?),
        BackupCommand::Restore { id } => display::print_restore(&engine.restore_backup(&id).await?),
        BackupCommand::Verify { id } => {
            let valid = engine.verify_backup(&id).await?;
            display::print_verify(&id, valid);
            if !valid {
                return Err(CliError::VerifyFailed(id));
            }
        }
        BackupCommand::Delete { id } => {
            engine.delete_backup(&id).await?;
            println!("{} {}", "[DELETED]".yellow().bold(), id);
        }
        BackupCommand::Cleanup => {
            let removed = engine.cleanup_expired_backups().await?;
            println!("{} removed {removed} expired backups", "[CLEANUP]".blue().bold());
        }
    }
    Ok(())
}

async fn run_audit(vault: &AuditVault, command: AuditCommand) -> Result<(), CliError> {
    let recorder = vault.recorder();
    match command {
        AuditCommand::Record {
            actor,
            email,
            action,
            resource,
            resource_id,
            severity,
            category,
            failed,
        } => {
            let mut input = AuditInput::builder(actor, email, action, resource)
                .severity(severity.into())
                .category(category.into());
            if let Some(id) = resource_id {
                input = input.resource_id(id);
            }
            if let Some(msg) = failed {
                input = input.failed(msg);
            }
            let entry = recorder.record(input.build()).await?;
            display::print_entry(&entry);
        }
        AuditCommand::Stats => display::print_stats(&vault.analyzer().audit_stats().await?),
        AuditCommand::Purge { days } => {
            let removed = recorder.cleanup_older_than(days).await?;
            println!(
                "{} removed {removed} entries older than {days} days",
                "[PURGE]".blue().bold()
            );
        }
        AuditCommand::Critical { limit } => {
            for entry in recorder.critical_events().await?.iter().take(limit) {
                display::print_entry(entry);
            }
        }
    }
    Ok(())
}

async fn run_export(
    vault: &AuditVault,
    format: ExportFormat,
    filter: AuditFilter,
    out: Option<PathBuf>,
) -> Result<(), CliError> {
    let file = vault.exporter().export_audit_logs(format, &filter).await?;
    match out {
        Some(path) if path.as_os_str() == "-" => print!("{}", file.content),
        out => {
            let path = out.unwrap_or_else(|| PathBuf::from(&file.filename));
            tokio::fs::write(&path, file.content.as_bytes())
                .await
                .map_err(|source| CliError::Write {
                    path: path.clone(),
                    source,
                })?;
            println!(
                "{} {} entries -> {}",
                "[EXPORT]".green().bold(),
                file.entry_count,
                path.display()
            );
        }
    }
    Ok(())
}

async fn run_schedule(vault: &mut AuditVault) -> Result<(), CliError> {
    if !vault.start_scheduler()? {
        println!("{}", "Backup schedule is disabled in config".yellow());
        return Ok(());
    }
    if let Some(scheduler) = vault.scheduler() {
        display::print_schedule(&scheduler.status());
    }

    tokio::signal::ctrl_c().await.map_err(CliError::Signal)?;
    tracing::info!("Received Ctrl-C, shutting down");
    if let Some(scheduler) = vault.scheduler() {
        display::print_schedule(&scheduler.status());
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut vault = open_vault(&cli).await?;

    let result = match cli.command {
        Commands::Backup(command) => run_backup(&vault, command).await,
        Commands::Audit(command) => run_audit(&vault, command).await,
        Commands::Report { from, to, json } => {
            let report = vault.analyzer().generate_report(from, to).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                display::print_report(&report);
            }
            Ok(())
        }
        Commands::Export {
            format,
            severity,
            category,
            actor,
            action,
            out,
        } => {
            let mut filter = AuditFilter::new();
            if let Some(severity) = severity {
                filter = filter.with_severity(severity.into());
            }
            if let Some(category) = category {
                filter = filter.with_category(category.into());
            }
            if let Some(actor) = actor {
                filter = filter.with_actor(actor);
            }
            if let Some(action) = action {
                filter = filter.with_action(action);
            }
            run_export(&vault, format.into(), filter, out).await
        }
        Commands::Schedule => run_schedule(&mut vault).await,
    };

    vault.shutdown().await?;
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {e}", "[ERROR]".red().bold());
        std::process::exit(1);
    }
}
