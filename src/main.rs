use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sego::{api, Config, Engine, LoadPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

// CLI Arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "TF-IDF search over a tree of HTML documents",
    long_about = None
)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true, env = "SEGO_CONFIG")]
    config: Option<PathBuf>,

    /// Snapshot file (.json or .bin, optionally .gz)
    #[arg(short, long, global = true, env = "SEGO_STATE_PATH")]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index a document tree and save a snapshot
    Index {
        /// Root of the extracted documentation
        #[arg(short, long, env = "SEGO_DOCS_DIR")]
        docs_dir: Option<PathBuf>,
        /// Abort on the first document that cannot be indexed
        #[arg(long)]
        strict: bool,
        /// Loader threads
        #[arg(short, long, env = "SEGO_WORKERS")]
        workers: Option<usize>,
    },
    /// Search a saved snapshot
    Search {
        query: String,
        /// Number of results
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Print the score next to each document
        #[arg(long)]
        scores: bool,
    },
    /// Serve the search API over HTTP
    Serve {
        #[arg(short, long, env = "SEGO_PORT")]
        port: Option<u16>,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sego=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(state) = args.state {
        config.state_path = state;
    }

    match args.command {
        Command::Index {
            docs_dir,
            strict,
            workers,
        } => {
            if let Some(docs_dir) = docs_dir {
                config.docs_dir = docs_dir;
            }
            if strict {
                config.policy = LoadPolicy::Strict;
            }
            if workers.is_some() {
                config.workers = workers;
            }
            index(&config)
        }
        Command::Search {
            query,
            count,
            scores,
        } => search(&config, &query, count.unwrap_or(config.default_result_count), scores),
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(&config)
        }
    }
}

fn index(config: &Config) -> Result<()> {
    let start = Instant::now();

    let mut engine = Engine::new();
    let report = engine
        .load(&config.docs_dir, &config.load_options())
        .with_context(|| format!("Failed to index {}", config.docs_dir.display()))?;

    for failure in &report.failures {
        eprintln!("skipped {}: {}", failure.path.display(), failure.error);
    }

    engine
        .save_state(&config.state_path)
        .context("Failed to save engine state")?;

    println!(
        "Indexed {} documents ({} skipped) into {}",
        report.indexed,
        report.failures.len(),
        config.state_path.display()
    );
    println!("Time elapsed: {:?}", start.elapsed());
    Ok(())
}

fn search(config: &Config, query: &str, count: usize, scores: bool) -> Result<()> {
    let engine = load_engine(config)?;

    let start = Instant::now();
    let results = engine.search_scored(query, count);
    let duration = start.elapsed();

    println!(
        "Search for \"{}\" ranked {} documents in {:?}",
        query,
        engine.document_count(),
        duration
    );
    println!();
    for doc in results {
        if scores {
            println!("{:.12}\t{}", doc.score, doc.path);
        } else {
            println!("- {}", doc.path);
        }
    }
    Ok(())
}

fn serve(config: &Config) -> Result<()> {
    let engine = Arc::new(load_engine(config)?);
    let router = api::create_router(engine, config.default_result_count);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(api::serve(router, config.port))
}

fn load_engine(config: &Config) -> Result<Engine> {
    let path = &config.state_path;
    Engine::from_snapshot(path)
        .with_context(|| format!("Failed to load engine state from {}", path.display()))
}
