//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.holdscan.toml` files.

use crate::aggregator::{AggregatorConfig, DEFAULT_BATCH_SIZE};
use crate::cli::OutputFormat;
use crate::models::CollectionConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".holdscan.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Network settings.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Aggregator settings.
    #[serde(default)]
    pub aggregator: AggregatorSettings,

    /// Collections to scan, in order.
    #[serde(default = "default_collections")]
    pub collections: Vec<CollectionConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            network: NetworkConfig::default(),
            aggregator: AggregatorSettings::default(),
            collections: default_collections(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path. Printed to stdout when unset.
    #[serde(default)]
    pub output: Option<String>,

    /// Default report format.
    #[serde(default)]
    pub format: OutputFormat,
}

/// Chain and HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Expected chain id.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Human-readable network name.
    #[serde(default = "default_chain_name")]
    pub chain_name: String,

    /// Timeout for each RPC and metadata request, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Gateway used for `ipfs://` URIs.
    #[serde(default = "default_ipfs_gateway")]
    pub ipfs_gateway: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            chain_name: default_chain_name(),
            timeout_seconds: default_timeout(),
            ipfs_gateway: default_ipfs_gateway(),
        }
    }
}

fn default_rpc_url() -> String {
    "https://rpc.jnsdao.com:8503".to_string()
}

fn default_chain_id() -> u64 {
    0xe52 // Jouleverse
}

fn default_chain_name() -> String {
    "Jouleverse".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_ipfs_gateway() -> Option<String> {
    Some("https://ipfs.io".to_string())
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorSettings {
    /// Holdings resolved concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound for each remote step of a holding, in seconds.
    #[serde(default)]
    pub task_timeout_seconds: Option<u64>,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            task_timeout_seconds: None,
        }
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl From<&AggregatorSettings> for AggregatorConfig {
    fn from(settings: &AggregatorSettings) -> Self {
        Self {
            batch_size: settings.batch_size,
            task_timeout: settings.task_timeout_seconds.map(Duration::from_secs),
        }
    }
}

fn default_collections() -> Vec<CollectionConfig> {
    vec![
        CollectionConfig::new("CryptoJunks", "0x1b1d15726d64c5027b627138f2bf051cc1EF2680"),
        CollectionConfig::new("BoredApes", "0x6753a24b107Bc92af00a1F9995A6A6fbA6b12B73"),
    ]
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.holdscan.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref rpc_url) = args.rpc_url {
            self.network.rpc_url = rpc_url.clone();
        }
        if let Some(chain_id) = args.chain_id {
            self.network.chain_id = chain_id;
        }
        if let Some(timeout) = args.timeout {
            self.network.timeout_seconds = timeout;
        }
        if let Some(ref gateway) = args.ipfs_gateway {
            self.network.ipfs_gateway = Some(gateway.clone());
        }

        if let Some(batch_size) = args.batch_size {
            self.aggregator.batch_size = batch_size;
        }
        if let Some(task_timeout) = args.task_timeout {
            self.aggregator.task_timeout_seconds = Some(task_timeout);
        }

        if !args.collections.is_empty() {
            self.collections = args.collections.clone();
        }

        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
    }

    /// Check settings that would make a scan meaningless.
    pub fn validate(&self) -> Result<(), String> {
        if self.collections.is_empty() {
            return Err("At least one collection must be configured".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for collection in &self.collections {
            if !seen.insert(collection.name.as_str()) {
                return Err(format!("Duplicate collection name: {}", collection.name));
            }
            if crate::chain::abi::parse_address(&collection.address).is_err() {
                return Err(format!(
                    "Invalid address for collection {}: {}",
                    collection.name, collection.address
                ));
            }
        }

        if self.aggregator.batch_size == 0 {
            return Err("Batch size must be at least 1".to_string());
        }

        Ok(())
    }

    /// Timeout applied to each RPC and metadata request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_seconds.max(1))
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
