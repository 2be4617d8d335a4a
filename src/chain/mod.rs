//! Read-only access to ERC-721 collections.
//!
//! [`CollectionReader`] is the capability the aggregator consumes;
//! [`Erc721Reader`] implements it over JSON-RPC `eth_call`.

pub mod abi;
pub mod rpc;

pub use rpc::RpcClient;

use crate::models::TokenId;
use abi::Word;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors from the read-only contract-call capability.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc endpoint returned status {0}")]
    Status(u16),

    #[error("rpc returned error for {method}: {message}")]
    Rpc { method: String, message: String },

    #[error("{0} result was missing")]
    MissingResult(String),

    #[error("invalid return data: {0}")]
    Decode(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// The three read-only operations of one collection.
#[async_trait]
pub trait CollectionReader: Send + Sync {
    /// Number of tokens `owner` holds.
    async fn balance_of(&self, owner: &str) -> Result<u64, ChainError>;

    /// Token id at `index` in `owner`'s enumeration.
    async fn token_of_owner_by_index(&self, owner: &str, index: u64)
        -> Result<TokenId, ChainError>;

    /// Metadata URI of a token.
    async fn token_uri(&self, token_id: &str) -> Result<String, ChainError>;
}

/// [`CollectionReader`] for an ERC-721 Enumerable contract.
#[derive(Debug, Clone)]
pub struct Erc721Reader {
    rpc: Arc<RpcClient>,
    contract: Address,
}

impl Erc721Reader {
    pub fn new(rpc: Arc<RpcClient>, contract: &str) -> Result<Self, ChainError> {
        Ok(Self {
            rpc,
            contract: abi::parse_address(contract)?,
        })
    }

    async fn call(&self, signature: &str, args: &[Word]) -> Result<Vec<u8>, ChainError> {
        let calldata = abi::to_hex(&abi::encode_call(signature, args));
        let raw = self
            .rpc
            .eth_call(&self.contract.to_string(), &calldata)
            .await?;
        abi::from_hex(&raw)
    }
}

#[async_trait]
impl CollectionReader for Erc721Reader {
    async fn balance_of(&self, owner: &str) -> Result<u64, ChainError> {
        let owner = abi::parse_address(owner)?;
        let data = self.call(abi::BALANCE_OF, &[Word::Address(owner)]).await?;
        abi::word_to_u64(abi::decode_uint(&data)?)
    }

    async fn token_of_owner_by_index(
        &self,
        owner: &str,
        index: u64,
    ) -> Result<TokenId, ChainError> {
        let owner = abi::parse_address(owner)?;
        let data = self
            .call(
                abi::TOKEN_OF_OWNER_BY_INDEX,
                &[Word::Address(owner), Word::Uint(U256::from(index))],
            )
            .await?;
        Ok(abi::decode_uint(&data)?.to_string())
    }

    async fn token_uri(&self, token_id: &str) -> Result<String, ChainError> {
        let id = U256::from_str_radix(token_id, 10)
            .map_err(|e| ChainError::Decode(format!("invalid token id {token_id}: {e}")))?;
        let data = self.call(abi::TOKEN_URI, &[Word::Uint(id)]).await?;
        abi::decode_string(&data)
    }
}
