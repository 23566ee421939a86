//! TextGraph CLI entry point

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use textgraph::{FilterOptions, GraphStore, StoreConfig};
use textgraph_cli::commands;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "textgraph")]
#[command(about = "Store annotated text as a graph and filter it by tags")]
#[command(version)]
struct Args {
    /// Database directory
    #[arg(long, default_value = ".textgraph")]
    db: PathBuf,

    /// Skip the memtable flush after each write
    #[arg(long)]
    no_flush: bool,

    /// Treat document ids as numbers
    #[arg(long)]
    numeric_id: bool,

    /// Trim whitespace around filter terms
    #[arg(long)]
    trim: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a JSON document read from a file, or stdin with `-`
    Store { input: PathBuf },
    /// Print a stored document as JSON
    Load { id: String },
    /// Evaluate a filter query against one stored document
    Filter { id: String, query: String },
    /// List stored documents matching a filter query
    Search { query: String },
    /// Print node and edge counts
    Stats,
}

fn run(args: Args) -> anyhow::Result<String> {
    let config = StoreConfig::new(&args.db).flush_on_write(!args.no_flush);
    let graph = GraphStore::open(config)
        .with_context(|| format!("Failed to open store at {}", args.db.display()))?;

    let options = FilterOptions {
        trim_whitespace: args.trim,
    };

    match args.command {
        Command::Store { input } => {
            let document = commands::read_document(&input)?;
            commands::store(&graph, &document)
        }
        Command::Load { id } => {
            let id = commands::parse_id(&id, args.numeric_id)?;
            commands::load(&graph, &id)
        }
        Command::Filter { id, query } => {
            let id = commands::parse_id(&id, args.numeric_id)?;
            commands::filter(&graph, &id, &query, options)
        }
        Command::Search { query } => commands::search(&graph, &query, options),
        Command::Stats => commands::stats(&graph),
    }
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "textgraph=info,textgraph_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(args) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
