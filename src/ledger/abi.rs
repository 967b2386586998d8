//! Minimal Ethereum ABI encoding for the SmartBank contract surface.
//!
//! The contract interface only uses static types (address, uint256, bool),
//! so call data is a 4-byte keccak selector followed by 32-byte words and
//! return data is a flat word sequence. No dynamic types, no tuples-of-
//! dynamic, which keeps this module small and auditable.

use sha3::{Digest, Keccak256};

use crate::error::Web3Error;
use crate::units::Wei;

const WORD_BYTES: usize = 32;

/// Argument value for a contract call.
#[derive(Debug, Clone)]
pub enum AbiValue {
    Address(String),
    Uint(Wei),
}

/// First four bytes of keccak-256 over the canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Hex-encode a full calldata payload: selector + one word per argument.
pub fn encode_call(signature: &str, args: &[AbiValue]) -> Result<String, Web3Error> {
    let mut data = Vec::with_capacity(4 + args.len() * WORD_BYTES);
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&encode_word(arg)?);
    }
    Ok(format!("0x{}", hex::encode(data)))
}

fn encode_word(value: &AbiValue) -> Result<[u8; WORD_BYTES], Web3Error> {
    let mut word = [0u8; WORD_BYTES];
    match value {
        AbiValue::Address(address) => {
            let digits = address
                .strip_prefix("0x")
                .or_else(|| address.strip_prefix("0X"))
                .ok_or_else(|| Web3Error::Validation(format!("address missing 0x prefix: {}", address)))?;
            let bytes = hex::decode(digits)
                .map_err(|e| Web3Error::Validation(format!("bad address {}: {}", address, e)))?;
            if bytes.len() != 20 {
                return Err(Web3Error::Validation(format!(
                    "address must be 20 bytes, got {}: {}",
                    bytes.len(),
                    address
                )));
            }
            word[WORD_BYTES - 20..].copy_from_slice(&bytes);
        }
        AbiValue::Uint(value) => {
            word[WORD_BYTES - 16..].copy_from_slice(&value.to_be_bytes());
        }
    }
    Ok(word)
}

/// Split hex return data into 32-byte words.
pub fn decode_words(data: &str) -> Result<Vec<[u8; WORD_BYTES]>, Web3Error> {
    let digits = data
        .strip_prefix("0x")
        .or_else(|| data.strip_prefix("0X"))
        .ok_or_else(|| Web3Error::Network(format!("return data missing 0x prefix: {}", data)))?;
    let bytes = hex::decode(digits)
        .map_err(|e| Web3Error::Network(format!("bad return data: {}", e)))?;
    if bytes.len() % WORD_BYTES != 0 {
        return Err(Web3Error::Network(format!(
            "return data length {} is not word aligned",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(WORD_BYTES)
        .map(|chunk| {
            let mut word = [0u8; WORD_BYTES];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

/// Read a word as an unsigned amount; rejects values above u128 range.
pub fn word_to_wei(word: &[u8; WORD_BYTES]) -> Result<Wei, Web3Error> {
    if word[..WORD_BYTES - 16].iter().any(|b| *b != 0) {
        return Err(Web3Error::Network("uint256 exceeds supported range".to_string()));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[WORD_BYTES - 16..]);
    Ok(Wei::from_be_bytes(low))
}

/// Read a word as a u64 (counts, block numbers, timestamps).
pub fn word_to_u64(word: &[u8; WORD_BYTES]) -> Result<u64, Web3Error> {
    let value = word_to_wei(word)?;
    u64::try_from(value).map_err(|_| Web3Error::Network("uint256 exceeds u64 range".to_string()))
}

/// Read a word as a bool (0 or 1).
pub fn word_to_bool(word: &[u8; WORD_BYTES]) -> Result<bool, Web3Error> {
    match word_to_wei(word)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Web3Error::Network(format!("bool word holds {}", other))),
    }
}
