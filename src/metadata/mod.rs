//! Token metadata fetching.
//!
//! [`MetadataFetcher`] is the HTTP fetch capability used by the aggregator.
//! [`HttpMetadataFetcher`] implements it with `reqwest`, rewriting `ipfs://`
//! URIs onto a configurable HTTP gateway.

use crate::models::TokenMetadata;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from fetching or parsing a metadata document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("metadata request failed: {0}")]
    Transport(String),

    #[error("metadata host returned status {0}")]
    Status(u16),

    #[error("metadata is not a valid JSON document: {0}")]
    Decode(String),
}

/// Fetches and parses the metadata document behind a token URI.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<TokenMetadata, FetchError>;
}

/// HTTP implementation of [`MetadataFetcher`].
#[derive(Debug, Clone)]
pub struct HttpMetadataFetcher {
    http_client: Client,
    ipfs_gateway: Option<String>,
}

impl HttpMetadataFetcher {
    pub fn new(timeout: Duration, ipfs_gateway: Option<String>) -> Result<Self, FetchError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            ipfs_gateway,
        })
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, uri: &str) -> Result<TokenMetadata, FetchError> {
        let url = resolve_uri(uri, self.ipfs_gateway.as_deref());
        debug!("Fetching metadata from {}", url);

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Transport(format!("request to {url} timed out"))
            } else if e.is_connect() {
                FetchError::Transport(format!("cannot connect to {url}"))
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        parse_metadata(&body)
    }
}

/// Parse a metadata body. Any JSON object is accepted.
pub fn parse_metadata(body: &[u8]) -> Result<TokenMetadata, FetchError> {
    serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Rewrite `ipfs://` URIs onto an HTTP gateway. Other URIs pass through.
pub fn resolve_uri(uri: &str, gateway: Option<&str>) -> String {
    let Some(gateway) = gateway else {
        return uri.to_string();
    };

    match uri.strip_prefix("ipfs://") {
        Some(path) => {
            let path = path.strip_prefix("ipfs/").unwrap_or(path);
            format!("{}/ipfs/{}", gateway.trim_end_matches('/'), path)
        }
        None => uri.to_string(),
    }
}
