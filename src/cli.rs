//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::CollectionConfig;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// holdscan - enumerate the NFTs an address holds
///
/// Reads every configured ERC-721 collection for the owner's tokens,
/// fetches each token's metadata, and writes a Markdown or JSON report
/// grouped by collection.
///
/// Examples:
///   holdscan --owner 0xAbC...123
///   holdscan --owner 0xAbC...123 --format json --output holdings.json
///   holdscan --owner 0xAbC...123 --collection Punks=0x5FbD...0aa3 --batch-size 8
///   holdscan --owner 0xAbC...123 --dry-run
///   holdscan --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Owner address whose holdings are scanned
    #[arg(
        long,
        value_name = "ADDRESS",
        env = "HOLDSCAN_OWNER",
        required_unless_present = "init_config"
    )]
    pub owner: Option<String>,

    /// JSON-RPC endpoint URL
    ///
    /// Overrides `network.rpc_url` from .holdscan.toml.
    #[arg(long, value_name = "URL", env = "HOLDSCAN_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Expected chain id (a warning is logged on mismatch)
    #[arg(long, value_name = "ID")]
    pub chain_id: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .holdscan.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Collection to scan, as NAME=ADDRESS (repeatable)
    ///
    /// Replaces the configured collection list when given.
    #[arg(long = "collection", value_name = "NAME=ADDRESS", value_parser = parse_collection)]
    pub collections: Vec<CollectionConfig>,

    /// Number of holdings resolved concurrently
    #[arg(long, value_name = "NUM")]
    pub batch_size: Option<usize>,

    /// Timeout for each RPC and metadata request, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Upper bound for each step of a single holding, in seconds
    #[arg(long, value_name = "SECS")]
    pub task_timeout: Option<u64>,

    /// HTTP gateway for ipfs:// URIs
    #[arg(long, value_name = "URL")]
    pub ipfs_gateway: Option<String>,

    /// Output file path for the report (stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: read holding counts only, without fetching metadata
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .holdscan.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Parse a `NAME=ADDRESS` collection argument.
fn parse_collection(raw: &str) -> Result<CollectionConfig, String> {
    let (name, address) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=ADDRESS, got '{}'", raw))?;

    let name = name.trim();
    if name.is_empty() {
        return Err("collection name must not be empty".to_string());
    }

    let address = address.trim();
    crate::chain::abi::parse_address(address).map_err(|e| e.to_string())?;

    Ok(CollectionConfig::new(name, address))
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The owner address, empty if not set.
    pub fn owner(&self) -> &str {
        self.owner.as_deref().map(str::trim).unwrap_or("")
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if crate::chain::abi::parse_address(self.owner()).is_err() {
            return Err(format!(
                "Owner must be a 0x-prefixed 20-byte hex address, got '{}'",
                self.owner()
            ));
        }

        if let Some(ref rpc_url) = self.rpc_url {
            if !rpc_url.starts_with("http://") && !rpc_url.starts_with("https://") {
                return Err("RPC URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.batch_size == Some(0) {
            return Err("Batch size must be at least 1".to_string());
        }

        if self.timeout == Some(0) || self.task_timeout == Some(0) {
            return Err("Timeouts must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
