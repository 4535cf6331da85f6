//! Argument parsing and command dispatch.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use stasis_config::{ConfigLoader, StasisConfig};
use stasis_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, init_logging};
use uuid::Uuid;

use crate::commands::{catalog, config, snapshots};
use crate::error::{CliError, CliResult};

#[derive(Parser)]
#[command(name = "stasis", about = "Inspect Stasis field catalogs and resume snapshots")]
pub(crate) struct Cli {
    /// JSON configuration file.
    #[arg(long, global = true, env = "STASIS_CONFIG")]
    config: Option<PathBuf>,
    /// Resume directory; overrides the configured one.
    #[arg(long, global = true)]
    resume_dir: Option<PathBuf>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print field catalogs with bit positions, keys, and value kinds.
    Catalog(CatalogArgs),
    /// List torrent ids that have a stored snapshot.
    List,
    /// Decode one stored snapshot.
    Inspect(InspectArgs),
    /// Load every stored snapshot and report how each would restore.
    Check,
    /// Print the resolved configuration.
    Config,
}

#[derive(Args)]
pub(crate) struct CatalogArgs {
    /// Which catalog to print.
    #[arg(long, value_enum, default_value_t = CatalogChoice::All)]
    pub(crate) catalog: CatalogChoice,
}

#[derive(Args)]
pub(crate) struct InspectArgs {
    /// Torrent identifier.
    pub(crate) id: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum CatalogChoice {
    Persisted,
    Synced,
    All,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
#[must_use]
pub fn run() -> i32 {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

fn execute(cli: Cli) -> CliResult<()> {
    let settings = resolve_config(&cli)?;
    init_logging(&LoggingConfig {
        level: &settings.log_level,
        format: LogFormat::from_name(&settings.log_format),
        ..LoggingConfig::default()
    })
    .context("failed to install logging")
    .map_err(CliError::failure)?;
    let _context = GlobalContextGuard::new("cli");
    tracing::debug!(command = command_label(&cli.command), "dispatching");

    let text = match cli.command {
        Command::Catalog(args) => catalog::render(args.catalog, cli.output)?,
        Command::List => snapshots::list(&settings.resume_dir, cli.output)?,
        Command::Inspect(args) => {
            let id = parse_id(&args.id)?;
            snapshots::inspect(&settings.resume_dir, id, cli.output)?
        }
        Command::Check => snapshots::check(&settings.resume_dir, cli.output)?,
        Command::Config => config::render(&settings, cli.output)?,
    };
    println!("{text}");
    Ok(())
}

fn resolve_config(cli: &Cli) -> CliResult<StasisConfig> {
    let mut loader = ConfigLoader::from_process_env();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let mut settings = loader
        .load()
        .context("failed to load configuration")
        .map_err(CliError::failure)?;
    if let Some(dir) = &cli.resume_dir {
        settings.resume_dir.clone_from(dir);
    }
    Ok(settings)
}

pub(crate) fn parse_id(raw: &str) -> CliResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| CliError::validation(format!("'{raw}' is not a torrent id")))
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Catalog(_) => "catalog",
        Command::List => "list",
        Command::Inspect(_) => "inspect",
        Command::Check => "check",
        Command::Config => "config",
    }
}
