//! `label_sync` entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse flags** with `clap` and load the label taxonomy
//!    (`labels.yaml`), validating it before anything touches the network.
//! 2. **Wire observability**: `tracing-subscriber` with a text or JSON layer
//!    and, when `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an OpenTelemetry OTLP
//!    exporter. Every span and event from every crate flows through it.
//! 3. **Construct infrastructure**: the live [`github::GitHubClient`], wrapped
//!    in a [`github::DryRunClient`] unless `--confirm` is given, injected into
//!    an [`engine::Engine`].
//! 4. **Dispatch** to `sync` or `docs` and exit non-zero on any failure,
//!    including partial ones.

mod docs;
mod sync;
mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use labels::{Configuration, SyncRunId};
use tracing::{error, info_span, Instrument};

use crate::sync::SyncArgs;
use crate::telemetry::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "label_sync")]
#[command(about = "Keep GitHub labels in line with a declared taxonomy")]
#[command(version)]
struct Cli {
    /// Log at debug level, overriding RUST_LOG.
    #[arg(long, global = true)]
    debug: bool,

    /// Log line format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Path to the label taxonomy.
    #[arg(long, env = "LABEL_SYNC_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile repository labels with the taxonomy.
    Sync(SyncArgs),
    /// Render label documentation from a template.
    Docs(DocsArgs),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Sync(_) => "sync",
            Self::Docs(_) => "docs",
        }
    }
}

#[derive(Debug, Args)]
struct DocsArgs {
    /// Handlebars template for the docs.
    #[arg(long)]
    template: PathBuf,

    /// File to write; created or truncated.
    #[arg(long)]
    output: PathBuf,
}

/// Reads and validates the taxonomy file.
fn load_taxonomy(path: &Path) -> Result<Configuration> {
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    Configuration::from_yaml_str(&document)
        .with_context(|| format!("failed to load config {}", path.display()))
}

async fn run(cli: Cli) -> Result<()> {
    let taxonomy = load_taxonomy(&cli.config)?;
    match &cli.command {
        Command::Sync(args) => sync::run(args, &taxonomy).await,
        Command::Docs(args) => docs::write(&args.template, &args.output, &taxonomy),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let telemetry = match telemetry::init(cli.debug, cli.log_format) {
        Ok(telemetry) => telemetry,
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::FAILURE;
        }
    };

    let run_id = SyncRunId::new_random();
    let span = info_span!("label_sync", run_id = %run_id, command = cli.command.name());
    let result = run(cli).instrument(span.clone()).await;
    if let Err(err) = &result {
        span.in_scope(|| error!(error = %format!("{err:#}"), "label_sync failed"));
    }

    drop(span);
    telemetry.shutdown();
    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
