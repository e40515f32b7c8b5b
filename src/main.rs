//! # Price Desk CLI (`pdesk`)
//!
//! Counter-side price checks from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! pdesk --config ./config/desk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdesk lookup "<query>"` | Resolve one product, show prices and competitor links |
//! | `pdesk search "<sentence>"` | Natural-language filter search |
//! | `pdesk memory harvest` | Ask the LLM for attributes of products without memory |
//! | `pdesk memory show <sku>` | Print remembered attributes for a SKU |
//! | `pdesk models` | List LLM models that support `generateContent` |
//! | `pdesk serve` | Start the HTTP API |
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use price_desk::{commands, config, server};

/// Price Desk: product lookup, margin pricing and competitor links.
#[derive(Parser)]
#[command(name = "pdesk", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/desk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the product a query refers to.
    ///
    /// Tries SKU, then description, then asks the LLM to pick from a
    /// shortlist. A miss prints "No product found".
    Lookup {
        query: String,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search with a sentence, e.g. "ตู้เย็น 2 ประตู ไม่เกิน 15000".
    Search {
        sentence: String,

        /// Maximum rows to print.
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage the AI memory table.
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// List models available to the configured API key.
    Models,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Extract brand/type/spec/tags for products that have no memory yet.
    Harvest {
        /// Only consider this many pending products.
        #[arg(long)]
        limit: Option<usize>,

        /// Count pending products without calling the LLM.
        #[arg(long)]
        dry_run: bool,
    },
    /// Show remembered attributes for one SKU.
    Show { sku: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Lookup { query, json } => {
            commands::run_lookup(&cfg, &query, json).await?;
        }
        Commands::Search {
            sentence,
            limit,
            json,
        } => {
            commands::run_search(&cfg, &sentence, limit, json).await?;
        }
        Commands::Memory { action } => match action {
            MemoryAction::Harvest { limit, dry_run } => {
                commands::run_harvest(&cfg, limit, dry_run).await?;
            }
            MemoryAction::Show { sku } => {
                commands::run_memory_show(&cfg, &sku).await?;
            }
        },
        Commands::Models => {
            commands::run_models(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
