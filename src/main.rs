use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Recall context from recorded AI conversation exchanges", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search stored exchanges by phrase, or conjunctively by 2-5 concepts
    Search {
        /// Query phrase; pass 2-5 phrases for a concept search
        #[arg(required = true)]
        query: Vec<String>,

        /// Search mode: vector, text, or both (single-phrase queries only)
        #[arg(long, default_value = "both")]
        mode: String,

        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Only exchanges dated on or after this day (YYYY-MM-DD)
        #[arg(long)]
        after: Option<String>,

        /// Only exchanges dated on or before this day (YYYY-MM-DD)
        #[arg(long)]
        before: Option<String>,

        /// Include archive summaries when a sidecar file exists
        #[arg(long)]
        summaries: bool,
    },

    /// Import exchange records from a JSONL file
    Import {
        /// Path to a JSONL file, one exchange record per line
        file: PathBuf,
    },

    /// Show store statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search {
            query,
            mode,
            limit,
            after,
            before,
            summaries,
        } => commands::search::execute(query, &mode, limit, after, before, summaries),
        Commands::Import { file } => commands::import::execute(&file),
        Commands::Stats => commands::stats::execute(),
    }
}
