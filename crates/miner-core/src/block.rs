//! Block header template and its canonical serialization.

use crate::difficulty::Target;
use crate::hash::double_sha256;
use crate::network::{BLOCK_HEADER_SIZE, BLOCK_VERSION};

/// A block header (80 bytes when serialized).
///
/// During a search this is the template: every field is fixed except
/// `nonce`, which the searcher sweeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block version.
    pub version: i32,
    /// Hash of the previous block (internal byte order).
    pub prev_block_hash: [u8; 32],
    /// Merkle root of all transactions (internal byte order).
    pub merkle_root: [u8; 32],
    /// Block timestamp (Unix seconds).
    pub time: u32,
    /// Difficulty target in compact "bits" format.
    pub bits: u32,
    /// Nonce for proof of work.
    pub nonce: u32,
}

impl BlockHeader {
    /// Create a new block header with nonce 0.
    pub fn new(prev_block_hash: [u8; 32], merkle_root: [u8; 32], time: u32, bits: u32) -> Self {
        BlockHeader {
            version: BLOCK_VERSION,
            prev_block_hash,
            merkle_root,
            time,
            bits,
            nonce: 0,
        }
    }

    /// Serialize the block header to 80 bytes.
    pub fn serialize(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut header = [0u8; BLOCK_HEADER_SIZE];
        header[..76].copy_from_slice(&self.serialize_without_nonce());

        // Nonce (4 bytes, little-endian)
        header[76..80].copy_from_slice(&self.nonce.to_le_bytes());

        header
    }

    /// Serialize the header without the nonce (76 bytes).
    /// Used for efficient mining where we only change the nonce.
    pub fn serialize_without_nonce(&self) -> [u8; 76] {
        let mut header = [0u8; 76];

        // Version (4 bytes, little-endian)
        header[0..4].copy_from_slice(&self.version.to_le_bytes());

        // Previous block hash (32 bytes, internal byte order)
        header[4..36].copy_from_slice(&self.prev_block_hash);

        // Merkle root (32 bytes)
        header[36..68].copy_from_slice(&self.merkle_root);

        // Time (4 bytes, little-endian)
        header[68..72].copy_from_slice(&self.time.to_le_bytes());

        // Bits (4 bytes, little-endian)
        header[72..76].copy_from_slice(&self.bits.to_le_bytes());

        header
    }

    /// Compute the block hash (double SHA256).
    pub fn hash(&self) -> [u8; 32] {
        double_sha256(&self.serialize())
    }

    /// The target decoded from this header's `bits`.
    pub fn target(&self) -> Target {
        Target::from_compact(self.bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_to_display_hex;

    #[test]
    fn test_block_header_serialization() {
        let prev_hash = [0x12u8; 32];
        let merkle_root = [0x34u8; 32];

        let mut header = BlockHeader::new(prev_hash, merkle_root, 1700000000, 0x17034219);
        header.nonce = 0xDEADBEEF;

        let serialized = header.serialize();

        // Version (0x20000000 in little-endian)
        assert_eq!(&serialized[0..4], &[0x00, 0x00, 0x00, 0x20]);
        assert_eq!(&serialized[4..36], &prev_hash[..]);
        assert_eq!(&serialized[36..68], &merkle_root[..]);
        assert_eq!(&serialized[68..72], &1700000000u32.to_le_bytes());
        assert_eq!(&serialized[72..76], &[0x19, 0x42, 0x03, 0x17]);
        // Nonce (0xDEADBEEF in little-endian)
        assert_eq!(&serialized[76..80], &[0xEF, 0xBE, 0xAD, 0xDE]);

        assert_eq!(&serialized[..76], &header.serialize_without_nonce()[..]);
    }

    #[test]
    fn test_bitcoin_genesis_hash() {
        // Bitcoin's genesis header is a well-known digest vector
        let merkle_root = crate::hash::parse_display_hash(
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
        )
        .unwrap();
        let mut header = BlockHeader::new([0u8; 32], merkle_root, 1231006505, 0x1d00ffff);
        header.version = 1;
        header.nonce = 2083236893;

        assert_eq!(
            hash_to_display_hex(&header.hash()),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
        assert_eq!(header.target(), Target::from_compact(0x1d00ffff));
    }
}
