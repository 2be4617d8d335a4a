//! Data models for the holdings scanner.
//!
//! This module contains the core data structures shared by the aggregator,
//! the chain and metadata readers, and the report generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Decimal rendering of an on-chain `uint256` token id.
pub type TokenId = String;

/// A collection as it appears in configuration: a name and a contract address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Display name, unique within a run.
    pub name: String,
    /// Contract address (0x-prefixed hex).
    pub address: String,
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Unique identity of one holding: (collection name, token id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HoldingKey {
    pub collection: String,
    pub token_id: TokenId,
}

impl HoldingKey {
    pub fn new(collection: impl Into<String>, token_id: impl Into<TokenId>) -> Self {
        Self {
            collection: collection.into(),
            token_id: token_id.into(),
        }
    }
}

impl fmt::Display for HoldingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.collection, self.token_id)
    }
}

/// Token metadata document as served from a token URI.
///
/// Only string-valued `name`, `description` and `image` are interpreted.
/// Every other field, including those three when they hold a non-string
/// value, is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct TokenMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for TokenMetadata {
    fn from(mut fields: Map<String, Value>) -> Self {
        let name = take_string(&mut fields, "name");
        let description = take_string(&mut fields, "description");
        let image = take_string(&mut fields, "image");
        Self {
            name,
            description,
            image,
            extra: fields,
        }
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    if !fields.get(key).is_some_and(Value::is_string) {
        return None;
    }
    match fields.remove(key) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    }
}

/// One resolved holding. Created once per [`HoldingKey`], never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRecord {
    /// Name of the collection the token belongs to.
    pub collection: String,
    /// Token id within the collection.
    pub token_id: TokenId,
    /// URI returned by `tokenURI`.
    pub metadata_uri: String,
    /// Parsed metadata document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TokenMetadata>,
}

impl HoldingRecord {
    pub fn key(&self) -> HoldingKey {
        HoldingKey::new(self.collection.clone(), self.token_id.clone())
    }

    /// Display name from metadata, falling back to `#<token id>`.
    pub fn display_name(&self) -> String {
        self.metadata
            .as_ref()
            .and_then(|m| m.name.clone())
            .unwrap_or_else(|| format!("#{}", self.token_id))
    }

    /// Image reference from metadata, if any.
    pub fn image(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.image.as_deref())
    }
}

/// Read snapshot of one aggregation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HoldingsView {
    /// Run that produced this view.
    pub generation: u64,
    /// Whether the run is still in flight.
    pub loading: bool,
    /// Number of records appended so far.
    pub resolved_count: usize,
    /// Records in arrival order.
    pub results: Vec<HoldingRecord>,
}

/// Statistics of one finished aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub generation: u64,
    /// Collections whose holding count was read.
    pub collections_scanned: usize,
    /// Sum of reported holding counts.
    pub discovered: u64,
    /// Records appended by this run.
    pub resolved: usize,
    /// Tasks abandoned because their key was already claimed.
    pub duplicates: usize,
    /// Tasks that failed (id lookup, uri lookup, fetch, or timeout).
    pub failed: usize,
}

impl RunSummary {
    /// Summary of a run that had no owner and did no work.
    pub fn idle(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }
}

/// Metadata about a holdings report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Owner address that was scanned.
    pub owner: String,
    /// Network name.
    pub network: String,
    /// Chain id the collections live on.
    pub chain_id: u64,
    /// Date and time of the scan.
    pub generated_at: DateTime<Utc>,
    /// Duration of the scan in seconds.
    pub duration_seconds: f64,
    /// Run statistics.
    pub summary: RunSummary,
    /// Run-level error, if the scan stopped early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Holdings of one collection, in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionHoldings {
    pub name: String,
    pub address: String,
    pub holdings: Vec<HoldingRecord>,
}

/// The complete holdings report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingsReport {
    pub metadata: ReportMetadata,
    pub collections: Vec<CollectionHoldings>,
}

impl HoldingsReport {
    /// Total number of holdings across all collections.
    pub fn total_holdings(&self) -> usize {
        self.collections.iter().map(|c| c.holdings.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(metadata: Option<TokenMetadata>) -> HoldingRecord {
        HoldingRecord {
            collection: "CryptoJunks".to_string(),
            token_id: "10".to_string(),
            metadata_uri: "https://example.com/10.json".to_string(),
            metadata,
        }
    }

    #[test]
    fn test_holding_key_display() {
        let key = HoldingKey::new("BoredApes", "42");
        assert_eq!(key.to_string(), "BoredApes-42");
    }

    #[test]
    fn test_metadata_keeps_unknown_fields() {
        let json = r#"{"name":"Junk #10","image":"ipfs://abc/10.png","attributes":[{"trait_type":"Hat","value":"Cap"}]}"#;
        let metadata: TokenMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.name.as_deref(), Some("Junk #10"));
        assert_eq!(metadata.description, None);
        assert!(metadata.extra.contains_key("attributes"));

        let back = serde_json::to_value(&metadata).unwrap();
        assert!(back.get("attributes").is_some());
        assert!(back.get("description").is_none());
    }

    #[test]
    fn test_metadata_tolerates_non_string_fields() {
        let json = r#"{"name":5,"description":null,"image":{"url":"https://img/7.png"}}"#;
        let metadata: TokenMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.name, None);
        assert_eq!(metadata.description, None);
        assert_eq!(metadata.image, None);
        assert_eq!(metadata.extra.get("name"), Some(&Value::from(5)));
        assert!(metadata.extra.contains_key("image"));

        let back = serde_json::to_value(&metadata).unwrap();
        assert_eq!(back["name"], 5);
    }

    #[test]
    fn test_record_display_name() {
        let named = record(Some(TokenMetadata {
            name: Some("Junk #10".to_string()),
            ..TokenMetadata::default()
        }));
        assert_eq!(named.display_name(), "Junk #10");
        assert_eq!(record(None).display_name(), "#10");
        assert_eq!(record(None).key(), HoldingKey::new("CryptoJunks", "10"));
    }
}
