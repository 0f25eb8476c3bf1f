//! Compact difficulty encoding and 256-bit proof-of-work targets.

use core::fmt;
use core::str::FromStr;

/// Compact bits of the difficulty-1 target.
pub const DIFFICULTY_ONE_BITS: u32 = 0x1d00ffff;

/// Sign bit of the compact mantissa.
const SIGN_BIT: u32 = 0x0080_0000;

/// A 256-bit unsigned proof-of-work threshold.
///
/// Stored as 32 big-endian bytes so the derived ordering is numeric ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Target([u8; 32]);

impl Target {
    /// The unsatisfiable target (only an all-zero digest meets it).
    pub const ZERO: Target = Target([0u8; 32]);
    /// The largest representable target.
    pub const MAX: Target = Target([0xFF; 32]);

    /// Build a target from 32 big-endian bytes.
    pub const fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Target(bytes)
    }

    /// Build a target from 32 little-endian bytes (the byte order of a digest).
    pub fn from_le_bytes(mut bytes: [u8; 32]) -> Self {
        bytes.reverse();
        Target(bytes)
    }

    /// Big-endian byte representation.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Little-endian byte representation.
    pub fn to_le_bytes(&self) -> [u8; 32] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    /// Whether this target is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Number of significant bits (0 for zero).
    pub fn bits(&self) -> u32 {
        for (i, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                return (32 - i as u32) * 8 - byte.leading_zeros();
            }
        }
        0
    }

    /// Decode a compact "bits" value.
    ///
    /// The top byte is the exponent E, the low 23 bits the mantissa M.
    /// For E <= 3 the target is `M >> 8*(3-E)`, otherwise `M << 8*(E-3)`
    /// with anything shifted past bit 255 dropped. A set sign bit yields
    /// [`Target::ZERO`].
    pub fn from_compact(bits: u32) -> Self {
        if bits & SIGN_BIT != 0 {
            return Target::ZERO;
        }

        let exponent = (bits >> 24) as usize;
        let mantissa = bits & 0x007F_FFFF;
        let mut target = [0u8; 32];

        if exponent <= 3 {
            let value = mantissa >> (8 * (3 - exponent));
            target[29..32].copy_from_slice(&value.to_be_bytes()[1..4]);
        } else {
            // Mantissa byte k (0 = least significant) lands at little-endian
            // offset E - 3 + k.
            let mantissa_bytes = mantissa.to_le_bytes();
            for (k, byte) in mantissa_bytes[..3].iter().enumerate() {
                let le_pos = exponent - 3 + k;
                if le_pos < 32 {
                    target[31 - le_pos] = *byte;
                }
            }
        }

        Target(target)
    }

    /// Encode to compact "bits" using the smallest exponent whose mantissa
    /// fits in three bytes without touching the sign bit.
    ///
    /// Bits below the top 23-24 significant bits are lost.
    pub fn to_compact(&self) -> u32 {
        let first_nonzero = match self.0.iter().position(|b| *b != 0) {
            Some(i) => i,
            None => return 0,
        };

        let mut exponent = (32 - first_nonzero) as u32;

        let mut mantissa: u32 = 0;
        for offset in 0..3 {
            let byte = self.0.get(first_nonzero + offset).copied().unwrap_or(0);
            mantissa = (mantissa << 8) | byte as u32;
        }

        if mantissa & SIGN_BIT != 0 {
            mantissa >>= 8;
            exponent += 1;
        }

        (exponent << 24) | mantissa
    }

    /// Approximate value as `f64`.
    pub fn to_f64(&self) -> f64 {
        self.0
            .iter()
            .fold(0.0f64, |acc, byte| acc * 256.0 + *byte as f64)
    }

    /// Difficulty relative to the difficulty-1 target.
    ///
    /// Infinite for a zero target.
    pub fn difficulty(&self) -> f64 {
        let current = self.to_f64();
        if current == 0.0 {
            return f64::INFINITY;
        }
        Target::from_compact(DIFFICULTY_ONE_BITS).to_f64() / current
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({})", self)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Error parsing a target from hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseTargetError {
    /// More than 64 hex digits.
    TooLong(usize),
    /// Not valid hex.
    InvalidHex,
}

impl fmt::Display for ParseTargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseTargetError::TooLong(n) => write!(f, "Target has {} hex digits, max 64", n),
            ParseTargetError::InvalidHex => write!(f, "Invalid target hex"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseTargetError {}

impl FromStr for Target {
    type Err = ParseTargetError;

    /// Parse a big-endian hex number, optionally `0x`-prefixed. Shorter
    /// inputs are zero-extended on the left.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        let digits = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits);

        if digits.len() > 64 {
            return Err(ParseTargetError::TooLong(digits.len()));
        }

        let mut padded = [b'0'; 64];
        padded[64 - digits.len()..].copy_from_slice(digits.as_bytes());

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(padded, &mut bytes).map_err(|_| ParseTargetError::InvalidHex)?;
        Ok(Target(bytes))
    }
}

/// Convert compact "bits" to a target. See [`Target::from_compact`].
pub fn bits_to_target(bits: u32) -> Target {
    Target::from_compact(bits)
}

/// Convert a target back to compact "bits". See [`Target::to_compact`].
pub fn target_to_bits(target: &Target) -> u32 {
    target.to_compact()
}

/// Calculate approximate difficulty from bits.
///
/// Difficulty = difficulty_1_target / current_target.
pub fn bits_to_difficulty(bits: u32) -> f64 {
    Target::from_compact(bits).difficulty()
}

/// Format difficulty for display (e.g., "1.23T" for trillion).
pub fn format_difficulty(difficulty: f64) -> alloc::string::String {
    if difficulty >= 1e15 {
        alloc::format!("{:.2}P", difficulty / 1e15)
    } else if difficulty >= 1e12 {
        alloc::format!("{:.2}T", difficulty / 1e12)
    } else if difficulty >= 1e9 {
        alloc::format!("{:.2}G", difficulty / 1e9)
    } else if difficulty >= 1e6 {
        alloc::format!("{:.2}M", difficulty / 1e6)
    } else if difficulty >= 1e3 {
        alloc::format!("{:.2}K", difficulty / 1e3)
    } else {
        alloc::format!("{:.2}", difficulty)
    }
}

/// Estimate average hashes needed to find a block at given difficulty.
pub fn expected_hashes(difficulty: f64) -> f64 {
    // On average, need difficulty * 2^32 hashes
    difficulty * 4_294_967_296.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_decode_difficulty_one() {
        let target = Target::from_compact(0x1d00ffff);
        let expected: Target =
            "00000000FFFF0000000000000000000000000000000000000000000000000000"
                .parse()
                .unwrap();
        assert_eq!(target, expected);

        let bytes = target.to_be_bytes();
        assert_eq!(&bytes[..6], &[0x00, 0x00, 0x00, 0x00, 0xff, 0xff]);
        for i in 6..32 {
            assert_eq!(bytes[i], 0x00, "byte {} should be 0", i);
        }
    }

    #[test]
    fn test_decode_high_difficulty() {
        // Exponent 0x17 = 23, so the mantissa starts at byte 32 - 23 = 9
        let bytes = Target::from_compact(0x17034219).to_be_bytes();
        for i in 0..9 {
            assert_eq!(bytes[i], 0x00, "byte {} should be 0", i);
        }
        assert_eq!(&bytes[9..12], &[0x03, 0x42, 0x19]);
        assert!(bytes[12..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_decode_small_exponents() {
        assert_eq!(Target::from_compact(0x01123456), "12".parse().unwrap());
        assert_eq!(Target::from_compact(0x02123456), "1234".parse().unwrap());
        assert_eq!(Target::from_compact(0x03123456), "123456".parse().unwrap());
        assert_eq!(Target::from_compact(0x04123456), "12345600".parse().unwrap());
        assert_eq!(Target::from_compact(0x00123456), Target::ZERO);
    }

    #[test]
    fn test_sign_bit_forces_zero() {
        assert_eq!(Target::from_compact(0x04923456), Target::ZERO);
        assert_eq!(Target::from_compact(0x1d800000), Target::ZERO);
        assert_eq!(Target::from_compact(0x01fedcba), Target::ZERO);
    }

    #[test]
    fn test_decode_overflow_drops_high_bytes() {
        // Exponent 34 pushes the two high mantissa bytes past bit 255
        let target = Target::from_compact(0x22123456);
        let bytes = target.to_be_bytes();
        assert_eq!(bytes[0], 0x56);
        assert!(bytes[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_known_values() {
        assert_eq!(Target::ZERO.to_compact(), 0);
        assert_eq!("80".parse::<Target>().unwrap().to_compact(), 0x02008000);
        assert_eq!("12345600".parse::<Target>().unwrap().to_compact(), 0x04123456);
        // Low bits beyond the mantissa are dropped
        assert_eq!(
            "123456789a".parse::<Target>().unwrap().to_compact(),
            0x05123456
        );
    }

    #[test]
    fn test_compact_roundtrip() {
        let cases = [
            0x1d00ffff, // Difficulty 1
            0x17034219, // High difficulty
            0x1b0404cb, // Medium difficulty
            0x207fffff, // Regtest
            0x03123456,
            0x02008000,
            0x01120000,
        ];

        for &bits in &cases {
            let target = Target::from_compact(bits);
            assert_eq!(target.to_compact(), bits, "bits {:08x}", bits);
            assert_eq!(Target::from_compact(target.to_compact()), target);
        }
    }

    #[test]
    fn test_roundtrip_for_canonical_targets() {
        // Any value with at most 23 significant bits below a byte boundary
        // survives encode/decode.
        for shift_bytes in 0..29usize {
            for mantissa in [0x01u32, 0x7f, 0x80, 0xff, 0x1234, 0x7fffff] {
                let mut be = [0u8; 32];
                let m = mantissa.to_be_bytes();
                for (k, byte) in m[1..].iter().rev().enumerate() {
                    be[31 - shift_bytes - k] = *byte;
                }
                let t = Target::from_be_bytes(be);
                assert_eq!(Target::from_compact(t.to_compact()), t, "{}", t);
            }
        }
    }

    #[test]
    fn test_endianness_and_ordering() {
        let mut le = [0u8; 32];
        le[0] = 1;
        let one = Target::from_le_bytes(le);
        assert_eq!(one, "01".parse().unwrap());
        assert_eq!(one.to_le_bytes(), le);
        assert!(one > Target::ZERO);
        assert!(one < Target::MAX);
        assert_eq!(one.bits(), 1);
        assert_eq!(Target::MAX.bits(), 256);
        assert_eq!(Target::ZERO.bits(), 0);
    }

    #[test]
    fn test_parse_errors() {
        let long = "0".repeat(65);
        assert_eq!(long.parse::<Target>(), Err(ParseTargetError::TooLong(65)));
        assert_eq!("zz".parse::<Target>(), Err(ParseTargetError::InvalidHex));
        assert_eq!("0x10".parse::<Target>().unwrap().to_string().len(), 64);
    }

    #[test]
    fn test_difficulty_calculation() {
        let genesis_diff = bits_to_difficulty(0x1d00ffff);
        assert!((genesis_diff - 1.0).abs() < 1e-9);

        // Half the target doubles the difficulty
        let harder = bits_to_difficulty(0x1c7fff80);
        assert!((harder - 2.0).abs() < 1e-3);

        assert!(bits_to_difficulty(0x1d800000).is_infinite());
    }

    #[test]
    fn test_format_difficulty() {
        assert_eq!(format_difficulty(1.0), "1.00");
        assert_eq!(format_difficulty(1_500.0), "1.50K");
        assert_eq!(format_difficulty(83_148_355_189_239.0), "83.15T");
        assert_eq!(expected_hashes(1.0), 4_294_967_296.0);
    }
}
