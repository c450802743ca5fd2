use std::fmt;
use std::fs::File;
use std::io::{BufRead, Write};
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

use crate::error::{WhitelistError, WhitelistResult};

/// A 32-byte Keccak256 output.
pub type Hash = [u8; 32];

/// A 20-byte Ethereum address.
///
/// Parsing is case-insensitive, so `0xAbC...` and `0xabc...` are the same
/// value. Display is always `0x` followed by lowercase hex.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Borrow the raw big-endian bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }
}

impl FromStr for Address {
    type Err = WhitelistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_address(&s).map_err(de::Error::custom)
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parses an Ethereum address from a hex string.
///
/// # Arguments
/// * `addr_str` - The address string, with or without "0x" prefix, any case
///
/// # Returns
/// The 20-byte address
///
/// # Errors
/// Returns `InvalidAddressFormat` if the input is not 40 hex chars.
pub fn parse_address(addr_str: &str) -> WhitelistResult<Address> {
    let invalid = |reason: String| WhitelistError::InvalidAddressFormat {
        input: addr_str.to_string(),
        reason,
    };

    let cleaned = strip_hex_prefix(addr_str.trim());
    if cleaned.len() != 40 {
        return Err(invalid(format!(
            "expected 40 hex chars, got {}",
            cleaned.len()
        )));
    }
    let mut address = [0u8; 20];
    hex::decode_to_slice(cleaned, &mut address)
        .map_err(|e| invalid(format!("invalid hex encoding: {}", e)))?;
    Ok(Address(address))
}

/// Parses a 32-byte hash from a hex string.
///
/// # Arguments
/// * `hash_str` - 64 hex chars, with or without "0x" prefix
///
/// # Errors
/// Returns `InvalidHash` if the input is not 64 hex chars
pub fn parse_hash(hash_str: &str) -> WhitelistResult<Hash> {
    let invalid = |reason: String| WhitelistError::InvalidHash {
        input: hash_str.to_string(),
        reason,
    };

    let cleaned = strip_hex_prefix(hash_str.trim());
    if cleaned.len() != 64 {
        return Err(invalid(format!(
            "expected 64 hex chars, got {}",
            cleaned.len()
        )));
    }
    let mut hash = [0u8; 32];
    hex::decode_to_slice(cleaned, &mut hash)
        .map_err(|e| invalid(format!("invalid hex encoding: {}", e)))?;
    Ok(hash)
}

/// Renders bytes as `0x`-prefixed lowercase hex.
pub fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Computes the Keccak256 hash of arbitrary bytes.
///
/// # Returns
/// 32-byte hash result
pub fn keccak256(data: &[u8]) -> Hash {
    Keccak256::digest(data).into()
}

/// Hashes two nodes after ordering them ascending by byte value.
///
/// This is the pairing rule of sorted-pair verifiers such as OpenZeppelin's
/// `MerkleProof`, so the argument order never affects the result.
///
/// # Arguments
/// * `a` - First 32-byte node
/// * `b` - Second 32-byte node
///
/// # Returns
/// `keccak256(min(a, b) || max(a, b))`
pub fn hash_sorted_pair(a: &Hash, b: &Hash) -> Hash {
    let (left, right) = if a <= b { (a, b) } else { (b, a) };
    Keccak256::new()
        .chain_update(left)
        .chain_update(right)
        .finalize()
        .into()
}

/// Computes the Merkle leaf for an address.
///
/// The leaf is `keccak256` of the packed 20-byte address, matching
/// `keccak256(abi.encodePacked(address))` on-chain.
///
/// # Arguments
/// * `address` - 20-byte Ethereum address
///
/// # Returns
/// 32-byte Merkle leaf
pub fn encode_leaf(address: &Address) -> Hash {
    keccak256(address.as_bytes())
}

/// Reads an address list, one address per line.
///
/// Blank lines and lines starting with `#` are skipped.
///
/// # Errors
/// Returns an error naming the line number of the first entry that does not
/// parse, or if reading fails
pub fn read_address_list<R: BufRead>(reader: R) -> anyhow::Result<Vec<Address>> {
    let mut addresses = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let address = parse_address(trimmed)
            .with_context(|| format!("Invalid address at line {}", line_num + 1))?;
        addresses.push(address);
    }

    Ok(addresses)
}

/// Writes `contents` to a sibling temp file and renames it over `path`.
///
/// # Errors
/// Returns an error if the temp file cannot be written or renamed
pub fn write_file_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path).context("Failed to create temp file")?;
    file.write_all(contents.as_bytes())
        .context("Failed to write to temp file")?;
    file.flush().context("Failed to flush temp file")?;
    std::fs::rename(&temp_path, path).context("Failed to move temp file to output")?;
    Ok(())
}
