//! `dude` command-line entry point.
//!
//! # Responsibility
//! - Resolve settings, start logging and open the tracking database.
//! - Render typed results from `dude_core`; no business logic lives here.

use anyhow::Context;
use clap::{Parser, Subcommand};
use dude_core::db::open_db;
use dude_core::{
    default_log_level, init_logging, ArtifactRegenerator, Project, ProjectService,
    ReconcileReport, SaveOutcome, SqlitePersistence,
};
use log::debug;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "dude",
    version,
    about = "Keep project descriptors and their tracking record in sync"
)]
struct Cli {
    /// Tracking database file.
    #[arg(long, env = "DUDE_DB", default_value = "dude.sqlite3")]
    db: PathBuf,
    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, env = "DUDE_LOG_DIR")]
    log_dir: Option<String>,
    /// trace|debug|info|warn|error
    #[arg(long, env = "DUDE_LOG_LEVEL")]
    log_level: Option<String>,
    /// Project directory.
    #[arg(long, short = 'p', default_value = ".")]
    project: PathBuf,
    /// Display name used when the descriptor does not set one.
    #[arg(long)]
    name: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the project as discovered from its descriptor.
    Show,
    /// Create or reconcile the tracking record.
    Save,
    /// Reconcile variables and report whether scripts are stale.
    Status,
    /// Set a variable in the descriptor.
    Set { name: String, value: String },
    /// Mark a variable for deletion.
    Unset { name: String },
    /// Print the core version.
    Version,
}

/// Reports stale scripts on stdout; regeneration itself is external.
struct StdoutRegenerator;

impl ArtifactRegenerator for StdoutRegenerator {
    fn regenerate(&mut self, project: &Project, report: &ReconcileReport) {
        println!(
            "scripts for {} need to be updated (changed: {})",
            project.name(),
            report.updated.join(", ")
        );
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).context("failed to initialize logging")?;
    }

    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open database {}", cli.db.display()))?;
    let db = SqlitePersistence::new(&conn);
    let mut project = match cli.name {
        Some(name) => Project::load_with_db(name, &cli.project, &db),
        None => {
            let bare = Project::from_path(&cli.project);
            Project::load_with_db(bare.name(), &cli.project, &db)
        }
    };
    debug!(
        "event=cli_start module=cli status=ok initialized={} persisted={}",
        project.is_initialized(),
        project.id().is_some()
    );

    let service = ProjectService::new(&db);
    match cli.command {
        Command::Show => print!("{project}"),
        Command::Save => match service.save(&mut project)? {
            SaveOutcome::Created { id, variables } => {
                println!("created project #{id} with {variables} variable(s)");
            }
            SaveOutcome::Reconciled(report) => {
                println!(
                    "reconciled: {} updated, {} deleted",
                    report.updated.len(),
                    report.deleted.len()
                );
            }
        },
        Command::Status => {
            let status = service.check_status(&project, &mut StdoutRegenerator)?;
            if !status.regeneration_requested {
                println!("up to date");
            }
        }
        Command::Set { name, value } => project.add_variable(name, value)?,
        Command::Unset { name } => project.remove_variable(name)?,
        Command::Version => println!("dude_core {}", dude_core::core_version()),
    }
    Ok(())
}
