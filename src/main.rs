//! # PPP Harness CLI (`ppp`)
//!
//! ## Usage
//!
//! ```bash
//! ppp --config ./config/ppp.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ppp init` | Create the SQLite database and run schema migrations |
//! | `ppp ingest` | Run one ingestion pass (fetch → reconcile → clean → store) |
//! | `ppp search "<name>"` | Search borrowers by name, state, and city |
//! | `ppp get <loan_number>` | Print one stored loan |
//! | `ppp stats` | Record, duplicate, and batch counts |
//! | `ppp serve` | Start the HTTP query server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ppp_harness::logging::{self, LogFormat};
use ppp_harness::search::SearchQuery;
use ppp_harness::{config, get, ingest, migrate, search, server, stats};

/// PPP Harness: ingest and query the SBA PPP loan-disclosure dataset.
#[derive(Parser)]
#[command(
    name = "ppp",
    about = "PPP Harness — ingest and query the SBA PPP loan-disclosure dataset",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ppp.toml")]
    config: PathBuf,

    /// Log output format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Run one ingestion pass.
    ///
    /// Fetches the dataset and dictionary, checks the dataset header
    /// against the dictionary, cleans every row, and stores the batch in a
    /// single transaction. Either the whole batch is stored or nothing is.
    Ingest,

    /// Search stored loans by borrower name.
    Search {
        /// Full or partial borrower name (case-insensitive).
        name: String,

        /// Exact borrower state (e.g. `TX`).
        #[arg(long)]
        state: Option<String>,

        /// Exact borrower city.
        #[arg(long)]
        city: Option<String>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,

        /// Print matches as a JSON array.
        #[arg(long)]
        json: bool,
    },

    /// Print a stored loan by its loan number.
    Get {
        /// Loan number (published as `tin` by the HTTP API).
        loan_number: String,

        /// Print the record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show record, duplicate, and batch counts.
    Stats,

    /// Start the HTTP query server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest => {
            ingest::run_ingest_cli(&cfg).await?;
        }
        Commands::Search {
            name,
            state,
            city,
            limit,
            json,
        } => {
            let query = SearchQuery {
                name,
                state,
                city,
                limit,
            };
            search::run_search(&cfg, &query, json).await?;
        }
        Commands::Get { loan_number, json } => {
            get::run_get(&cfg, &loan_number, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
