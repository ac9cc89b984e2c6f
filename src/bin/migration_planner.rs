//! # migration-planner: static migration report
//!
//! Scans a source tree for legacy-SDK usage and prints a phased migration
//! plan or the recommendations derived from it.
//!
//! ## Usage
//!
//! ```bash
//! # Phased plan as text
//! migration-planner analyze ./src
//!
//! # JSON plan written to a file, with custom patterns
//! migration-planner --config migrator.toml analyze ./src --format json --output plan.json
//!
//! # Recommendations only
//! migration-planner insights ./src
//!
//! # JSON schema of the configuration file
//! migration-planner schema
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use backend_migrator::config::{self, loader, MigratorConfig};
use backend_migrator::planner::{self, MigrationPlanner};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

#[derive(Parser)]
#[command(name = "migration-planner")]
#[command(about = "Score source files for legacy-SDK to REST migration", long_about = None)]
struct Cli {
    /// Config TOML file (reads the [planner] section)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a phased migration plan for a directory
    Analyze {
        /// Source root
        dir: PathBuf,

        /// Report format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List recommendations for a directory
    Insights {
        /// Source root
        dir: PathBuf,
    },
    /// Print the configuration JSON schema
    Schema,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => loader::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MigratorConfig::default(),
    };
    // Logging is optional for a CLI; ignore a subscriber set elsewhere.
    let _ = backend_migrator::init_tracing_with(&config.observability);

    match cli.command {
        Command::Analyze {
            dir,
            format,
            output,
        } => {
            let plan = planner_for(&config)?
                .plan_dir(&dir)
                .with_context(|| format!("analysing {}", dir.display()))?;
            let report = match format {
                Format::Json => planner::render_json(&plan).context("serialising plan")?,
                Format::Text => planner::render_text(&plan),
            };
            emit(&report, output.as_deref())?;
            info!(
                components = plan.summary.total_components,
                effort_hours = plan.summary.total_effort_hours,
                "plan written"
            );
        }
        Command::Insights { dir } => {
            let plan = planner_for(&config)?
                .plan_dir(&dir)
                .with_context(|| format!("analysing {}", dir.display()))?;
            let notes = planner::insights(&plan);
            if notes.is_empty() {
                println!("No recommendations.");
            }
            for note in notes {
                println!("- {}", note.message);
            }
        }
        Command::Schema => {
            println!("{}", config::export_schema().context("generating schema")?);
        }
    }
    Ok(())
}

fn planner_for(config: &MigratorConfig) -> anyhow::Result<MigrationPlanner> {
    MigrationPlanner::from_config(&config.planner).context("compiling planner patterns")
}

fn emit(report: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => std::fs::write(path, report)
            .with_context(|| format!("writing {}", path.display())),
        None => {
            println!("{report}");
            Ok(())
        }
    }
}
