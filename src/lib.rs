pub mod catalog;
pub mod config;
pub mod evaluation;
pub mod intent;
pub mod model;
pub mod search;
pub mod server;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use crate::catalog::{catalog_path, ingest};
use crate::intent::{IntentExtractor, OpenAiIntentExtractor};
use crate::search::embedder::get_embedder;
use crate::search::service::{DEFAULT_TOP_K, SearchService};
use crate::search::vector_index::index_path;

fn long_version() -> String {
    format!(
        "{} (built {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    )
}

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "misearch",
    version = long_version(),
    about = "Intent-augmented semantic search over a media title catalog"
)]
pub struct Cli {
    /// Override data dir holding the catalog and index artifacts
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Embedder backend: "minilm" (semantic) or "hash" (deterministic lexical)
    #[arg(long, global = true)]
    pub embedder: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the catalog and vector index from preprocessed JSONL titles
    Build {
        /// Input file, one raw title record per line
        #[arg(long)]
        input: PathBuf,
    },
    /// Run one query through the pipeline and print the results
    Search {
        /// Natural-language query
        query: String,

        /// Number of results
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        /// Emit the full outcome as JSON instead of text lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Score the pipeline against a fixture query set
    Evaluate {
        /// JSON file of fixtures; omit to use the built-in set
        #[arg(long)]
        queries: Option<PathBuf>,

        /// Number of results judged per query
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        /// Write the full report as JSON to this path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Serve the JSON search API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 5000)]
        port: u16,

        /// Number of results per request
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man page to stdout
    Man,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(config::default_data_dir);
    let embedder_name = cli.embedder.as_deref();

    match cli.command {
        Commands::Build { input } => run_build(&data_dir, embedder_name, &input),
        Commands::Search { query, top_k, json } => {
            run_search(&data_dir, embedder_name, &query, top_k, json)
        }
        Commands::Evaluate {
            queries,
            top_k,
            output,
        } => run_evaluate(&data_dir, embedder_name, queries.as_deref(), top_k, output.as_deref()),
        Commands::Serve { host, port, top_k } => {
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("invalid bind address {host}:{port}"))?;
            // Artifact loads and a possible first-run model download are
            // blocking work; keep them off the runtime threads.
            let embedder_name = embedder_name.map(str::to_string);
            let dir = data_dir.clone();
            let service =
                tokio::task::spawn_blocking(move || open_service(&dir, embedder_name.as_deref()))
                    .await
                    .context("open search service")??;
            server::serve(Arc::new(service), top_k, addr).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "misearch", &mut std::io::stdout());
            Ok(())
        }
        Commands::Man => {
            let man = clap_mangen::Man::new(Cli::command());
            man.render(&mut std::io::stdout())?;
            Ok(())
        }
    }
}

fn run_build(data_dir: &Path, embedder_name: Option<&str>, input: &Path) -> Result<()> {
    let embedder = get_embedder(embedder_name)?;
    let raw = ingest::read_jsonl(input)?;
    tracing::info!(titles = raw.len(), ?input, "ingested raw titles");
    let titles = ingest::clean_titles(raw);
    let (store, index) = ingest::build_artifacts(&embedder, titles)?;

    store.save(&catalog_path(data_dir, embedder.id()))?;
    index.save(&index_path(data_dir, embedder.id()))?;
    println!(
        "Indexed {} titles with embedder {} into {}",
        store.len(),
        embedder.id(),
        data_dir.display()
    );
    Ok(())
}

fn run_search(
    data_dir: &Path,
    embedder_name: Option<&str>,
    query: &str,
    top_k: usize,
    json: bool,
) -> Result<()> {
    let service = open_service(data_dir, embedder_name)?;
    let outcome = service.search(query, top_k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    if outcome.movies.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (rank, movie) in outcome.movies.iter().enumerate() {
        let year = movie
            .release_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{}. {} ({}, {}) [{}] {}",
            rank + 1,
            movie.title,
            movie.kind,
            year,
            movie.duration,
            movie.listed_in
        );
    }
    Ok(())
}

fn run_evaluate(
    data_dir: &Path,
    embedder_name: Option<&str>,
    queries: Option<&Path>,
    top_k: usize,
    output: Option<&Path>,
) -> Result<()> {
    let service = open_service(data_dir, embedder_name)?;
    let fixtures = match queries {
        Some(path) => evaluation::load_queries(path)?,
        None => evaluation::default_queries(),
    };
    let reports = evaluation::evaluate(&service, &fixtures, top_k)?;

    for report in &reports {
        println!("Query: {}", report.query);
        for (rank, result) in report.results.iter().enumerate() {
            let mark = if result.hit { "R" } else { "W" };
            println!("  {mark} {}. {}", rank + 1, result.title);
        }
        println!(
            "  hit rate: {:.2} ({}/{top_k})",
            report.hit_rate, report.hit_count
        );
    }
    println!(
        "Mean hit rate over {} queries: {:.2}",
        reports.len(),
        evaluation::mean_hit_rate(&reports)
    );

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&reports)?;
        std::fs::write(path, json).with_context(|| format!("write evaluation report {path:?}"))?;
        println!("Wrote report to {}", path.display());
    }
    Ok(())
}

fn open_service(data_dir: &Path, embedder_name: Option<&str>) -> Result<SearchService> {
    let embedder = get_embedder(embedder_name)?;
    let extractor: Option<Box<dyn IntentExtractor>> =
        OpenAiIntentExtractor::from_env().map(|e| Box::new(e) as Box<dyn IntentExtractor>);
    SearchService::open(data_dir, embedder, extractor)
}
