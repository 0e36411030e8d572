use crate::error::{Result, ShroudError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Hex SHA-256 prefix length used by the checksum transform
const CHECKSUM_LEN: usize = 64;

/// Structural transforms layered over the cipher output on early layers.
/// All three re-encode to base64 so the result is printable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Camouflage {
    /// ROT13 of ASCII letters, then base64
    Rotate,
    /// base64 prefixed with its own hex SHA-256
    Checksum,
    /// XOR against a keyed stream, then base64
    KeyedXor,
}

impl Camouflage {
    /// Transform used on `layer` of `partition`
    pub fn select(layer: usize, partition: usize) -> Self {
        match (layer + partition) % 3 {
            0 => Self::Rotate,
            1 => Self::Checksum,
            _ => Self::KeyedXor,
        }
    }

    /// Whether a layer carries a camouflage pass at all
    pub fn applies_to(layer: usize) -> bool {
        layer % 2 == 0 && layer < 2
    }

    pub fn apply(self, data: &[u8], stream_key: &[u8]) -> Vec<u8> {
        match self {
            Self::Rotate => STANDARD.encode(rot13(data)).into_bytes(),
            Self::Checksum => {
                let encoded = STANDARD.encode(data);
                let digest = hex::encode(Sha256::digest(encoded.as_bytes()));
                let mut out = Vec::with_capacity(CHECKSUM_LEN + encoded.len());
                out.extend_from_slice(digest.as_bytes());
                out.extend_from_slice(encoded.as_bytes());
                out
            }
            Self::KeyedXor => STANDARD.encode(xor_cycle(data, stream_key)).into_bytes(),
        }
    }

    /// Undo `apply`. `layer` only labels the error.
    pub fn reverse(self, data: &[u8], stream_key: &[u8], layer: usize) -> Result<Vec<u8>> {
        match self {
            Self::Rotate => Ok(rot13(&STANDARD.decode(data)?)),
            Self::Checksum => {
                if data.len() < CHECKSUM_LEN {
                    return Err(ShroudError::ChecksumMismatch { layer });
                }
                let (digest, content) = data.split_at(CHECKSUM_LEN);
                let expected = hex::encode(Sha256::digest(content));
                if expected.as_bytes() != digest {
                    return Err(ShroudError::ChecksumMismatch { layer });
                }
                Ok(STANDARD.decode(content)?)
            }
            Self::KeyedXor => Ok(xor_cycle(&STANDARD.decode(data)?, stream_key)),
        }
    }
}

/// ROT13 over ASCII letters; every other byte passes through
pub fn rot13(data: &[u8]) -> Vec<u8> {
    data.iter()
        .map(|&b| match b {
            b'a'..=b'z' => (b - b'a' + 13) % 26 + b'a',
            b'A'..=b'Z' => (b - b'A' + 13) % 26 + b'A',
            _ => b,
        })
        .collect()
}

/// XOR with a key repeated over the data
pub fn xor_cycle(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .zip(key.iter().cycle())
        .map(|(d, k)| d ^ k)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM_KEY: [u8; 64] = [0x5a; 64];

    fn sample() -> Vec<u8> {
        (0u16..300).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[test]
    fn test_selection_cycles_by_layer_and_partition() {
        assert_eq!(Camouflage::select(0, 0), Camouflage::Rotate);
        assert_eq!(Camouflage::select(0, 1), Camouflage::Checksum);
        assert_eq!(Camouflage::select(0, 2), Camouflage::KeyedXor);
        assert_eq!(Camouflage::select(2, 1), Camouflage::Rotate);
    }

    #[test]
    fn test_only_first_even_layer_is_camouflaged() {
        assert!(Camouflage::applies_to(0));
        assert!(!Camouflage::applies_to(1));
        assert!(!Camouflage::applies_to(2));
        assert!(!Camouflage::applies_to(3));
    }

    #[test]
    fn test_all_kinds_reverse() {
        let data = sample();
        for kind in [Camouflage::Rotate, Camouflage::Checksum, Camouflage::KeyedXor] {
            let out = kind.apply(&data, &STREAM_KEY);
            assert!(out.is_ascii());
            assert_eq!(kind.reverse(&out, &STREAM_KEY, 0).unwrap(), data);
        }
    }

    #[test]
    fn test_rot13_is_involution() {
        let text = b"Hello, World! 123 zZ";
        assert_eq!(rot13(text), b"Uryyb, Jbeyq! 123 mM".to_vec());
        assert_eq!(rot13(&rot13(text)), text.to_vec());
    }

    #[test]
    fn test_checksum_detects_tampering() {
        let mut out = Camouflage::Checksum.apply(b"fragment", &STREAM_KEY);
        let last = out.len() - 2;
        out[last] = if out[last] == b'A' { b'B' } else { b'A' };
        assert!(matches!(
            Camouflage::Checksum.reverse(&out, &STREAM_KEY, 0),
            Err(ShroudError::ChecksumMismatch { layer: 0 })
        ));
    }

    #[test]
    fn test_checksum_too_short() {
        assert!(Camouflage::Checksum
            .reverse(b"abc", &STREAM_KEY, 0)
            .is_err());
    }

    #[test]
    fn test_keyed_xor_depends_on_key() {
        let data = sample();
        let a = Camouflage::KeyedXor.apply(&data, &STREAM_KEY);
        let b = Camouflage::KeyedXor.apply(&data, &[0x11; 64]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_base64_is_encoding_error() {
        assert!(matches!(
            Camouflage::Rotate.reverse(b"***", &STREAM_KEY, 0),
            Err(ShroudError::Encoding(_))
        ));
    }

    #[test]
    fn test_xor_cycle_empty_key() {
        assert_eq!(xor_cycle(b"abc", &[]), b"abc".to_vec());
    }
}
