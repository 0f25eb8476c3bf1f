//! Network definitions and chain constants.

use crate::block::BlockHeader;
use crate::hash::parse_display_hash;

/// Network type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// Production network
    #[default]
    Mainnet,
    /// Public test network
    Testnet,
    /// Local regression-test network with a trivial target
    Regtest,
}

impl Network {
    /// Get the default RPC port for this network.
    pub fn default_rpc_port(&self) -> u16 {
        match self {
            Network::Mainnet => 12347,
            Network::Testnet => 18332,
            Network::Regtest => 18443,
        }
    }

    /// Compact difficulty of the genesis block.
    pub fn genesis_bits(&self) -> u32 {
        match self {
            Network::Mainnet | Network::Testnet => 0x1d00ffff,
            Network::Regtest => 0x207fffff,
        }
    }

    /// Unsolved genesis header template (nonce 0).
    pub fn genesis_template(&self) -> BlockHeader {
        // The constant is valid hex of the right length.
        let merkle_root = parse_display_hash(GENESIS_MERKLE_ROOT).unwrap_or([0u8; 32]);

        let mut header = BlockHeader::new([0u8; 32], merkle_root, GENESIS_TIME, self.genesis_bits());
        header.version = GENESIS_VERSION;
        header
    }

    /// Parse network from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Some(Network::Mainnet),
            "testnet" | "test" => Some(Network::Testnet),
            "regtest" | "reg" => Some(Network::Regtest),
            _ => None,
        }
    }

    /// Get network name as string.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }
}

impl core::fmt::Display for Network {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Block version with BIP9 versionbits signaling.
pub const BLOCK_VERSION: i32 = 0x20000000;

/// Version field of the genesis block.
pub const GENESIS_VERSION: i32 = 1;

/// Timestamp of the genesis block.
pub const GENESIS_TIME: u32 = 1748270717;

/// Merkle root of the genesis coinbase, display byte order.
pub const GENESIS_MERKLE_ROOT: &str =
    "5976614bb121054435ae20ef7100ecc07f176b54a7bf908493272d716f8409b4";

/// Size of a block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 80;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_from_str() {
        assert_eq!(Network::from_str("mainnet"), Some(Network::Mainnet));
        assert_eq!(Network::from_str("MAINNET"), Some(Network::Mainnet));
        assert_eq!(Network::from_str("regtest"), Some(Network::Regtest));
        assert_eq!(Network::from_str("invalid"), None);
    }

    #[test]
    fn test_genesis_template() {
        let header = Network::Mainnet.genesis_template();
        assert_eq!(header.version, 1);
        assert_eq!(header.time, GENESIS_TIME);
        assert_eq!(header.bits, 0x1d00ffff);
        assert_eq!(header.nonce, 0);
        assert_eq!(header.prev_block_hash, [0u8; 32]);
        // Display order is reversed relative to the serialized bytes
        assert_eq!(header.merkle_root[31], 0x59);
        assert_eq!(header.merkle_root[0], 0xb4);

        assert_eq!(Network::Regtest.genesis_template().bits, 0x207fffff);
    }
}
