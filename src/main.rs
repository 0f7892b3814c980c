//! # Bidsheet CLI (`bids`)
//!
//! The `bids` binary is the interface to Bidsheet. It provides commands for
//! database initialization, catalog import, a stored-data overview, and
//! receipt-fragment export.
//!
//! ## Usage
//!
//! ```bash
//! bids --config ./config/bids.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bids init` | Create the SQLite database and run schema migrations |
//! | `bids import <file>` | Reconcile a catalog export against the store |
//! | `bids stats` | Show item, line-item, and cache counts |
//! | `bids export` | Write one HTML content fragment per line item |

mod cache;
mod config;
mod db;
mod enrich;
mod export;
mod extraction;
mod markup;
mod migrate;
mod models;
mod normalize;
mod reconcile;
mod rows;
mod stats;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bidsheet — auction catalog import and receipt-content preparation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file with database, column-mapping, extraction, and export settings.
#[derive(Parser)]
#[command(
    name = "bids",
    about = "Bidsheet — auction catalog import and receipt-content preparation",
    version,
    long_about = "Bidsheet ingests the spreadsheet export of an auction campaign, reconciles it \
    against a local SQLite store using content hashing, enriches descriptions through a cached \
    external text-extraction service, and prepares block-structured markup for receipt rendering."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bids.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (items,
    /// line_items, extraction_cache). Idempotent — running it multiple
    /// times is safe.
    Init,

    /// Reconcile a catalog export against the store.
    ///
    /// Filters placeholder rows, groups the rest by catalog number, and
    /// creates, updates, skips, or prunes line items by content hash.
    /// New and changed descriptions pass through extraction, normalization,
    /// and markup formatting before persistence. Prints a run report.
    Import {
        /// Path to the CSV catalog export.
        file: PathBuf,

        /// Parse and classify rows without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Skip the external text-extraction step for this run.
        #[arg(long)]
        skip_extraction: bool,
    },

    /// Show item, line-item, and extraction-cache counts.
    Stats,

    /// Write one HTML content fragment per line item.
    ///
    /// Files are named `<catalog#>-<position>-<slug>.html` and written to
    /// the configured export directory.
    Export {
        /// Output directory (overrides `export.out_dir` from config).
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bidsheet=info,bids=info".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized.");
        }
        Commands::Import {
            file,
            dry_run,
            skip_extraction,
        } => {
            reconcile::run_import(&cfg, &file, dry_run, skip_extraction).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Export { out } => {
            export::run_export(&cfg, out.as_deref()).await?;
        }
    }

    Ok(())
}
