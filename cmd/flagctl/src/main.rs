//! # flagctl
//!
//! Operator CLI for flagged tiles: list, delete, and interactive review.

mod console;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use configs::{Settings, StoreBackend};
use domains::{Clock, FlagTable, SystemClock};
use services::{BatchDeleter, FlagLister, FlagStore, ReviewConsole, ReviewOutcome, ReviewSession};
use storage_adapters::{DesktopTiles, MemoryFlagTable};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::console::TerminalConsole;

#[derive(Parser, Debug)]
#[command(name = "flagctl", version, about = "Manage flagged tiles")]
struct Cli {
    /// Deployment environment; names the default tables.
    #[arg(short, long, global = true)]
    environment: Option<String>,

    /// Store region.
    #[arg(short, long, global = true)]
    region: Option<String>,

    /// Configuration file; missing files are skipped.
    #[arg(short, long, global = true, default_value = configs::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List flagged tiles one page at a time.
    List {
        /// Items the store evaluates for this page (max 1000).
        #[arg(short, long, default_value_t = services::DEFAULT_LIST_LIMIT)]
        limit: u32,

        /// Continuation token printed by a previous page.
        #[arg(short, long)]
        next_key: Option<String>,

        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// Walk flagged tiles and act on each one.
    Review {
        #[arg(short, long, default_value_t = 50)]
        batch_size: u32,
    },

    /// Delete flags by tile hash.
    Delete {
        #[arg(required = true)]
        tile_hashes: Vec<String>,

        /// Skip the confirmation prompt.
        #[arg(short = 'y', long)]
        confirm: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Json,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .compact()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
}

async fn open_flag_table(settings: &Settings) -> Result<Arc<dyn FlagTable>> {
    let store = &settings.store;
    match store.backend {
        StoreBackend::Memory => {
            warn!("store.backend is \"memory\"; this process starts with an empty table");
            Ok(Arc::new(MemoryFlagTable::new()))
        }
        #[cfg(feature = "dynamodb")]
        StoreBackend::Dynamodb => {
            use storage_adapters::dynamodb::{client_for_region, DynamoFlagTable};

            let client = client_for_region(&store.region).await;
            Ok(Arc::new(DynamoFlagTable::new(client, store.flags_table())))
        }
        #[cfg(not(feature = "dynamodb"))]
        StoreBackend::Dynamodb => {
            anyhow::bail!("store.backend = \"dynamodb\" needs a build with the `dynamodb` feature")
        }
    }
}

async fn list(lister: &FlagLister, limit: u32, next_key: Option<&str>, format: Format) -> Result<()> {
    let listing = lister.list(Some(limit), next_key).await?;
    if let Some(warning) = &listing.cursor_warning {
        eprintln!("Warning: {warning}");
    }
    match format {
        Format::Json => {
            let text = serde_json::to_string_pretty(&listing.body())
                .context("failed to serialise listing")?;
            println!("{text}");
        }
        Format::Table => print!("{}", output::render_listing(&listing)),
    }
    Ok(())
}

async fn delete(store: FlagStore, tile_hashes: &[String], confirmed: bool) -> Result<ExitCode> {
    if !confirmed {
        println!("{}", output::render_delete_preview(tile_hashes));
        let mut console = TerminalConsole::new();
        if console.confirm("\nAre you sure you want to proceed?").await != Some(true) {
            println!("Operation cancelled.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let report = BatchDeleter::new(store).delete_flags(tile_hashes).await;
    print!("{}", output::render_delete_report(&report));
    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Completes on the first Ctrl-C. The handler is installed on first poll,
/// which the session does before fetching anything.
async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => println!(),
        Err(err) => {
            warn!(error = %err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

async fn review(lister: FlagLister, store: FlagStore, batch_size: u32) -> Result<ExitCode> {
    println!("{}", output::review_banner());
    let session = ReviewSession::new(
        lister,
        store,
        Arc::new(DesktopTiles::new()),
        TerminalConsole::new(),
        batch_size,
    );
    let report = session.run_until(interrupted()).await;
    Ok(match report.outcome {
        ReviewOutcome::Aborted(_) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let settings = Settings::load_file(&cli.config)
        .context("failed to load configuration")?
        .with_store_overrides(cli.environment, cli.region);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = FlagStore::new(open_flag_table(&settings).await?, clock.clone());
    let lister = FlagLister::new(store.clone(), clock);

    match cli.command {
        Command::List {
            limit,
            next_key,
            format,
        } => {
            list(&lister, limit, next_key.as_deref(), format).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Review { batch_size } => review(lister, store, batch_size).await,
        Command::Delete {
            tile_hashes,
            confirm,
        } => delete(store, &tile_hashes, confirm).await,
    }
}
