//! Double SHA-256 and block-hash byte-order helpers.

use sha2::{Digest, Sha256};

/// Double SHA256: SHA256(SHA256(data)).
///
/// This is the block header digest.
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// Reverse the byte order of a 32-byte array.
///
/// Hashes are displayed in reverse byte order (most significant first).
#[inline]
pub fn reverse_bytes(bytes: &[u8; 32]) -> [u8; 32] {
    let mut reversed = *bytes;
    reversed.reverse();
    reversed
}

/// Convert a hash to its display format (reversed hex).
pub fn hash_to_display_hex(hash: &[u8; 32]) -> alloc::string::String {
    hex::encode(reverse_bytes(hash))
}

/// Error parsing a display-order hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashParseError {
    /// Not valid hex.
    InvalidHex,
    /// Decoded to the wrong number of bytes.
    WrongLength(usize),
}

impl core::fmt::Display for HashParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HashParseError::InvalidHex => write!(f, "Invalid hash hex"),
            HashParseError::WrongLength(n) => write!(f, "Hash must be 32 bytes, got {}", n),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HashParseError {}

/// Parse a hash given in display order into internal byte order.
pub fn parse_display_hash(s: &str) -> Result<[u8; 32], HashParseError> {
    let bytes = hex::decode(s.trim()).map_err(|_| HashParseError::InvalidHex)?;
    if bytes.len() != 32 {
        return Err(HashParseError::WrongLength(bytes.len()));
    }

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    hash.reverse();
    Ok(hash)
}
