//! Proof-of-work validity check.

use crate::block::BlockHeader;
use crate::difficulty::Target;

/// Check whether `header` satisfies `target`.
///
/// The header is serialized, double-SHA256 hashed, and the digest read as a
/// little-endian 256-bit integer. Valid iff that integer is `<= target`.
#[inline]
pub fn validate(header: &BlockHeader, target: &Target) -> bool {
    hash_meets_target(&header.hash(), target)
}

/// Check if a digest (internal byte order) meets the target.
///
/// Equality counts as meeting the target.
#[inline]
pub fn hash_meets_target(hash: &[u8; 32], target: &Target) -> bool {
    Target::from_le_bytes(*hash) <= *target
}
