//! Minimal Solidity ABI encoding for the ERC-721 read calls.
//!
//! Only what the scanner needs: static call encoding with `address` and
//! `uint256` arguments, and decoding of `uint256` and `string` return values.

use super::ChainError;
use alloy_primitives::{keccak256, Address, U256};

pub const BALANCE_OF: &str = "balanceOf(address)";
pub const TOKEN_OF_OWNER_BY_INDEX: &str = "tokenOfOwnerByIndex(address,uint256)";
pub const TOKEN_URI: &str = "tokenURI(uint256)";

const WORD: usize = 32;

/// A single static argument word.
#[derive(Debug, Clone, Copy)]
pub enum Word {
    Address(Address),
    Uint(U256),
}

impl Word {
    fn to_bytes(self) -> [u8; WORD] {
        match self {
            Word::Address(address) => address.into_word().0,
            Word::Uint(value) => value.to_be_bytes::<WORD>(),
        }
    }
}

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// Encode a call as `selector ++ words`.
pub fn encode_call(signature: &str, args: &[Word]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD * args.len());
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&arg.to_bytes());
    }
    data
}

/// `0x`-prefixed hex rendering used in JSON-RPC payloads.
pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Parse `0x`-prefixed hex returned by the node.
pub fn from_hex(raw: &str) -> Result<Vec<u8>, ChainError> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(digits).map_err(|e| ChainError::Decode(format!("invalid hex: {e}")))
}

/// Parse a 20-byte hex address.
pub fn parse_address(raw: &str) -> Result<Address, ChainError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|_| ChainError::InvalidAddress(raw.to_string()))
}

/// Decode the first return word as `uint256`.
pub fn decode_uint(data: &[u8]) -> Result<U256, ChainError> {
    word_at(data, 0)
}

/// Decode a single dynamic `string` return value.
pub fn decode_string(data: &[u8]) -> Result<String, ChainError> {
    let offset = word_to_usize(word_at(data, 0)?)?;
    let len = word_to_usize(word_at(data, offset)?)?;
    let start = offset
        .checked_add(WORD)
        .ok_or_else(|| ChainError::Decode("string offset overflow".to_string()))?;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| {
            ChainError::Decode(format!(
                "string of length {len} exceeds return data of {} bytes",
                data.len()
            ))
        })?;

    String::from_utf8(data[start..end].to_vec())
        .map_err(|e| ChainError::Decode(format!("string is not utf-8: {e}")))
}

fn word_at(data: &[u8], offset: usize) -> Result<U256, ChainError> {
    let end = offset
        .checked_add(WORD)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| {
            ChainError::Decode(format!(
                "expected a word at offset {offset}, return data has {} bytes",
                data.len()
            ))
        })?;
    Ok(U256::from_be_slice(&data[offset..end]))
}

/// Narrow a word to `u64`, rejecting values that do not fit.
pub fn word_to_u64(value: U256) -> Result<u64, ChainError> {
    if value.bit_len() > 64 {
        return Err(ChainError::Decode(format!("{value} does not fit in 64 bits")));
    }
    Ok(value.as_limbs()[0])
}

fn word_to_usize(value: U256) -> Result<usize, ChainError> {
    let narrow = word_to_u64(value)?;
    usize::try_from(narrow).map_err(|_| ChainError::Decode(format!("{narrow} overflows usize")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abi_string(s: &str) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&U256::from(32u64).to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(s.len() as u64).to_be_bytes::<32>());
        let mut body = s.as_bytes().to_vec();
        body.resize(s.len().div_ceil(32) * 32, 0);
        data.extend_from_slice(&body);
        data
    }

    #[test]
    fn test_erc721_selectors() {
        assert_eq!(hex::encode(selector(BALANCE_OF)), "70a08231");
        assert_eq!(hex::encode(selector(TOKEN_OF_OWNER_BY_INDEX)), "2f745c59");
        assert_eq!(hex::encode(selector(TOKEN_URI)), "c87b56dd");
    }

    #[test]
    fn test_encode_token_of_owner_by_index() {
        let owner = parse_address("0x1b1d15726d64c5027b627138f2bf051cc1EF2680").unwrap();
        let data = encode_call(
            TOKEN_OF_OWNER_BY_INDEX,
            &[Word::Address(owner), Word::Uint(U256::from(3u64))],
        );

        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(&data[16..36], owner.as_slice());
        assert_eq!(data[67], 3);
        assert!(to_hex(&data).starts_with("0x2f745c59"));
    }

    #[test]
    fn test_decode_uint() {
        let data = U256::from(1234u64).to_be_bytes::<32>();
        assert_eq!(decode_uint(&data).unwrap(), U256::from(1234u64));
        assert!(decode_uint(&data[..31]).is_err());
    }

    #[test]
    fn test_word_to_u64_rejects_wide_values() {
        assert_eq!(word_to_u64(U256::from(7u64)).unwrap(), 7);
        assert!(word_to_u64(U256::MAX).is_err());
    }

    #[test]
    fn test_decode_string() {
        let uri = "https://meta.example.org/junks/10.json";
        assert_eq!(decode_string(&abi_string(uri)).unwrap(), uri);
        assert_eq!(decode_string(&abi_string("")).unwrap(), "");
    }

    #[test]
    fn test_decode_string_truncated() {
        let mut data = abi_string("ipfs://bafy/1");
        data.truncate(70);
        assert!(matches!(decode_string(&data), Err(ChainError::Decode(_))));
    }

    #[test]
    fn test_from_hex() {
        assert_eq!(from_hex("0x0102").unwrap(), vec![1, 2]);
        assert!(from_hex("0xzz").is_err());
        assert!(parse_address("not-an-address").is_err());
    }
}
