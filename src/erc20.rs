//! ERC20 ABI plumbing
//!
//! Transfer event recognition, view-call data encoding, and return-value
//! decoding. Everything here is pure byte/hex manipulation; the actual
//! calls go through the RPC client.

use crate::types::Log;
use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: [u8; 32] = [
    0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b, 0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d,
    0xaa, 0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16, 0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23,
    0xb3, 0xef,
];

/// Transfer topic as a 0x-prefixed hex string, for eth_getLogs filters.
pub const TRANSFER_TOPIC_HEX: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// Function selector for symbol()
const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];

/// Function selector for decimals()
const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

/// Function selector for balanceOf(address)
const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Build call data for symbol().
pub fn symbol_calldata() -> Vec<u8> {
    SYMBOL_SELECTOR.to_vec()
}

/// Build call data for decimals().
pub fn decimals_calldata() -> Vec<u8> {
    DECIMALS_SELECTOR.to_vec()
}

/// Build call data for balanceOf(owner): selector + address left-padded to 32 bytes.
pub fn balance_of_calldata(owner: Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(owner.as_slice());
    data
}

/// Check whether a log is an ERC20 Transfer event: exactly three topics
/// (signature + indexed from/to) with topic0 equal to the Transfer signature hash.
pub fn is_transfer_log(log: &Log) -> bool {
    if log.topics.len() != 3 {
        return false;
    }
    let topic0 = log.topics[0].as_str();
    let topic0 = topic0.strip_prefix("0x").unwrap_or(topic0);
    if topic0.len() != 64 {
        return false;
    }
    match hex::decode(topic0) {
        Ok(bytes) => bytes.as_slice() == TRANSFER_TOPIC,
        Err(_) => false,
    }
}

/// Parse from, to, value from a Transfer log.
/// topics[1] = from (indexed, padded to 32 bytes), topics[2] = to, data = value
pub fn parse_transfer_log(log: &Log) -> Result<(Address, Address, U256)> {
    if log.topics.len() < 3 {
        anyhow::bail!("Transfer log has insufficient topics");
    }
    let from = parse_address_from_topic(&log.topics[1])?;
    let to = parse_address_from_topic(&log.topics[2])?;
    let value = decode_uint(&log.data)?;
    Ok((from, to, value))
}

/// Decode a single 32-byte big-endian unsigned word (uint256 return value
/// or Transfer event payload).
pub fn decode_uint(data: &[u8]) -> Result<U256> {
    if data.len() < 32 {
        anyhow::bail!("Expected a 32-byte word, got {} bytes", data.len());
    }
    Ok(U256::from_be_slice(&data[0..32]))
}

/// Decode a uint8-range word (decimals() return value).
pub fn decode_u8(data: &[u8]) -> Result<u8> {
    let value = decode_uint(data)?;
    if value > U256::from(u8::MAX) {
        anyhow::bail!("Value {} out of uint8 range", value);
    }
    Ok(value.to::<u8>())
}

/// Decode an ABI-encoded string return value (symbol()).
///
/// Standard encoding is offset word + length word + padded bytes. A few old
/// tokens return a fixed bytes32 instead; that case is handled by trimming
/// trailing NULs.
pub fn decode_string(data: &[u8]) -> Result<String> {
    if data.len() == 32 {
        // bytes32-style symbol
        let trimmed: Vec<u8> = data.iter().copied().take_while(|&b| b != 0).collect();
        return String::from_utf8(trimmed).context("bytes32 symbol is not valid UTF-8");
    }
    if data.len() < 64 {
        anyhow::bail!("String return too short: {} bytes", data.len());
    }
    let offset: usize = decode_uint(&data[0..32])?
        .try_into()
        .map_err(|_| anyhow::anyhow!("String offset out of range"))?;
    if offset > data.len().saturating_sub(32) {
        anyhow::bail!("String offset {} past end of data", offset);
    }
    let len: usize = decode_uint(&data[offset..offset + 32])?
        .try_into()
        .map_err(|_| anyhow::anyhow!("String length out of range"))?;
    let start = offset + 32;
    if len > data.len().saturating_sub(start) {
        anyhow::bail!("String length {} past end of data", len);
    }
    String::from_utf8(data[start..start + len].to_vec()).context("Symbol is not valid UTF-8")
}

/// Parse a 32-byte hex topic into an Address (last 20 bytes).
pub fn parse_address_from_topic(topic: &str) -> Result<Address> {
    let s = topic.strip_prefix("0x").unwrap_or(topic);
    let s = if s.len() % 2 == 1 {
        format!("0{}", s)
    } else {
        s.to_string()
    };
    let bytes = hex::decode(&s).context("Invalid hex in topic")?;
    if bytes.len() < 20 {
        anyhow::bail!("Topic too short for address");
    }
    let start = bytes.len().saturating_sub(20);
    Ok(Address::from_slice(&bytes[start..]))
}
