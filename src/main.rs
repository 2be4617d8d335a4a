//! holdscan - NFT holdings scanner
//!
//! A CLI tool that enumerates the tokens an address holds across a set of
//! ERC-721 collections, resolves each token's metadata, and writes a report
//! grouped by collection.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, RPC, or a scan that stopped early)

mod aggregator;
mod analysis;
mod chain;
mod cli;
mod config;
mod metadata;
mod models;
mod report;

use aggregator::{AggregatorConfig, Collection, HoldingsAggregator};
use anyhow::{Context, Result};
use chain::{CollectionReader, Erc721Reader, RpcClient};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use metadata::HttpMetadataFetcher;
use models::{ReportMetadata, RunSummary};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("holdscan v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_scan(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .holdscan.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the network, collections, and batch size.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete scan workflow. Returns the exit code.
async fn run_scan(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    if let Err(e) = config.validate() {
        anyhow::bail!("Invalid configuration: {}", e);
    }

    let owner = args.owner().to_string();

    // Step 1: Connect to the chain
    let rpc = Arc::new(
        RpcClient::new(config.network.rpc_url.clone(), config.request_timeout())
            .context("Failed to create RPC client")?,
    );
    check_chain_id(&rpc, &config).await;

    let collections = build_collections(&rpc, &config)?;

    // Handle --dry-run: read counts and exit
    if args.dry_run {
        return handle_dry_run(&collections, &owner).await;
    }

    // Step 2: Aggregate holdings
    let fetcher = Arc::new(
        HttpMetadataFetcher::new(config.request_timeout(), config.network.ipfs_gateway.clone())
            .context("Failed to create metadata client")?,
    );
    let aggregator = Arc::new(HoldingsAggregator::new(
        AggregatorConfig::from(&config.aggregator),
        collections,
        fetcher,
    ));

    if !args.quiet {
        eprintln!("🔍 Scanning holdings of {}", owner);
        eprintln!("   Network: {} ({})", config.network.chain_name, config.network.rpc_url);
        eprintln!(
            "   Collections: {}",
            config
                .collections
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        eprintln!("   Batch size: {}\n", config.aggregator.batch_size);
    }

    let run = aggregator.restart(owner.clone());
    let outcome = track_progress(&aggregator, run, args.quiet).await?;

    let view = aggregator.view();
    let (summary, run_error) = match outcome {
        Ok(summary) => (summary, None),
        Err(e) => {
            warn!("Scan stopped early: {}", e);
            (e.summary().clone(), Some(e.to_string()))
        }
    };

    // Step 3: Build the report
    let metadata = ReportMetadata {
        owner: owner.clone(),
        network: config.network.chain_name.clone(),
        chain_id: config.network.chain_id,
        generated_at: Utc::now(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
        summary: summary.clone(),
        error: run_error.clone(),
    };
    let report = report::build_report(metadata, &config.collections, &view.results);

    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(&report, config.network.ipfs_gateway.as_deref())
        }
    };

    match config.general.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path))?;
            if !args.quiet {
                eprintln!("\n✅ Report saved to: {}", path);
            }
        }
        None => println!("{}", output),
    }

    // Print summary
    if !args.quiet {
        let counts = analysis::collection_counts(&view.results);
        eprintln!("\n📊 Scan Summary:");
        for collection in &config.collections {
            eprintln!(
                "   {}: {}",
                collection.name,
                counts.get(&collection.name).copied().unwrap_or(0)
            );
        }
        eprintln!("   Total holdings: {}", view.resolved_count);
        if summary.failed > 0 {
            eprintln!("   Failed lookups: {}", summary.failed);
        }
        eprintln!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    }

    if let Some(e) = run_error {
        eprintln!("\n⛔ Scan incomplete: {}", e);
        return Ok(1);
    }

    Ok(0)
}

/// Wait for a run while showing how many holdings have been resolved.
async fn track_progress(
    aggregator: &HoldingsAggregator,
    mut run: tokio::task::JoinHandle<Result<RunSummary, aggregator::AggregateError>>,
    quiet: bool,
) -> Result<Result<RunSummary, aggregator::AggregateError>> {
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(120));
    let outcome = loop {
        tokio::select! {
            joined = &mut run => break joined.context("Aggregation task failed")?,
            _ = ticker.tick() => {
                spinner.set_message(format!("Loaded {} holdings...", aggregator.view().resolved_count));
                spinner.tick();
            }
        }
    };

    spinner.finish_and_clear();
    Ok(outcome)
}

/// Warn when the endpoint serves a different chain than configured.
async fn check_chain_id(rpc: &RpcClient, config: &Config) {
    match rpc.chain_id().await {
        Ok(chain_id) if chain_id == config.network.chain_id => {
            debug!("Connected to chain {} at {}", chain_id, rpc.url());
        }
        Ok(chain_id) => warn!(
            "{} serves chain id {}, expected {} ({})",
            rpc.url(),
            chain_id,
            config.network.chain_id,
            config.network.chain_name
        ),
        Err(e) => warn!("Could not read chain id from {}: {}", rpc.url(), e),
    }
}

/// Create a reader for every configured collection.
fn build_collections(rpc: &Arc<RpcClient>, config: &Config) -> Result<Vec<Collection>> {
    config
        .collections
        .iter()
        .map(|c| {
            let reader = Erc721Reader::new(Arc::clone(rpc), &c.address)
                .with_context(|| format!("Invalid collection {}", c.name))?;
            Ok(Collection::new(c.name.clone(), c.address.clone(), Arc::new(reader)))
        })
        .collect()
}

/// Handle --dry-run: print holding counts per collection, exit.
async fn handle_dry_run(collections: &[Collection], owner: &str) -> Result<i32> {
    println!("\n🔍 Dry run: reading holding counts (no metadata fetched)...\n");

    let mut total = 0u64;
    for collection in collections {
        let count = collection
            .reader
            .balance_of(owner)
            .await
            .with_context(|| format!("Failed to read holding count for {}", collection.name))?;
        println!("   {} ({}): {}", collection.name, collection.address, count);
        total += count;
    }

    println!("\n   Total: {} holdings", total);
    println!("\n✅ Dry run complete. No metadata was fetched.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
