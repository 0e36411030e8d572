//! Bundle container format.
//!
//! ```text
//! "SHR\x01" | header_len (u32 LE) | header JSON | envelope
//! ```
//!
//! The header is plain JSON and carries everything recovery needs to rebuild
//! key material. The envelope wraps the partition table:
//!
//! ```text
//! table JSON → compress → ROT13 → base64 → XOR envelope key → base64
//! ```

use crate::config::{Compression, TagHash};
use crate::error::{Result, ShroudError};
use crate::keys::{KeyMarkers, KeyMaterial, KeySeal};
use crate::pipeline::camouflage::{rot13, xor_cycle};
use crate::pipeline::compress::{compress, decompress};
use crate::pipeline::stack::TransformStack;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Magic bytes for the bundle format
const BUNDLE_MAGIC: &[u8; 4] = b"SHR\x01";

pub const FORMAT_VERSION: u32 = 1;

/// Maximum transform layers a bundle may declare
const MAX_LAYERS: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleHeader {
    pub version: u32,
    pub layers: usize,
    /// Seconds of clock drift under which a tag mismatch is forgiven
    pub tolerance_secs: f64,
    pub compression: Compression,
    pub tag_hash: TagHash,
    /// Fragment count of each partition
    pub fragment_counts: Vec<usize>,
    pub markers: KeyMarkers,
    pub seal: KeySeal,
}

impl BundleHeader {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header: Self = serde_json::from_slice(data)?;
        header.validate()?;
        Ok(header)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != FORMAT_VERSION {
            return Err(ShroudError::InvalidFormat(format!(
                "unsupported bundle version {}",
                self.version
            )));
        }
        if self.layers == 0 || self.layers > MAX_LAYERS {
            return Err(ShroudError::InvalidFormat(format!(
                "invalid layer count {}",
                self.layers
            )));
        }
        if self.fragment_counts.is_empty() {
            return Err(ShroudError::InvalidFormat("no partitions declared".into()));
        }
        Ok(())
    }

    pub fn stack(&self) -> TransformStack {
        TransformStack::new(self.layers, self.tag_hash)
    }

    pub fn partitions(&self) -> usize {
        self.fragment_counts.len()
    }
}

/// One fragment record after every pass of the transform stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedFragment(#[serde(with = "base64_bytes")] pub Vec<u8>);

impl EncryptedFragment {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Encrypted fragments grouped by partition, each list in index order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTable {
    pub partitions: Vec<Vec<EncryptedFragment>>,
}

impl PartitionTable {
    pub fn fragment_count(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }
}

/// A complete bundle: plaintext header plus the sealed envelope
#[derive(Debug, Clone)]
pub struct Bundle {
    pub header: BundleHeader,
    pub envelope: Vec<u8>,
}

impl Bundle {
    /// Seal `table` into the envelope
    pub fn seal(header: BundleHeader, table: &PartitionTable, keys: &KeyMaterial) -> Result<Self> {
        let json = serde_json::to_vec(table)?;
        let compressed = compress(&json, header.compression)?;
        let inner = STANDARD.encode(rot13(&compressed));
        let mixed = xor_cycle(inner.as_bytes(), &keys.envelope_key());
        let envelope = STANDARD.encode(mixed).into_bytes();

        Ok(Self { header, envelope })
    }

    /// Rebuild key material from the header
    pub fn key_material(&self) -> Result<KeyMaterial> {
        KeyMaterial::from_seal(&self.header.seal, &self.header.markers)
    }

    /// Open the envelope back into the partition table
    pub fn open(&self, keys: &KeyMaterial) -> Result<PartitionTable> {
        let mixed = STANDARD.decode(&self.envelope)?;
        let inner = xor_cycle(&mixed, &keys.envelope_key());
        let compressed = rot13(&STANDARD.decode(&inner)?);
        let json = decompress(&compressed, self.header.compression)?;
        Ok(serde_json::from_slice(&json)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header_bytes = self.header.to_bytes()?;
        let header_len = u32::try_from(header_bytes.len())
            .map_err(|_| ShroudError::InvalidFormat("header too large".into()))?;

        let mut out = Vec::with_capacity(8 + header_bytes.len() + self.envelope.len());
        out.extend_from_slice(BUNDLE_MAGIC);
        out.extend_from_slice(&header_len.to_le_bytes());
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&self.envelope);
        Ok(out)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(ShroudError::InvalidFormat("bundle too short".into()));
        }
        if &data[0..4] != BUNDLE_MAGIC {
            return Err(ShroudError::InvalidFormat("invalid bundle magic bytes".into()));
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&data[4..8]);
        let header_len = u32::from_le_bytes(len_bytes) as usize;

        let header_end = 8usize
            .checked_add(header_len)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| ShroudError::InvalidFormat("header length exceeds bundle".into()))?;

        let header = BundleHeader::from_bytes(&data[8..header_end])?;
        let envelope = data[header_end..].to_vec();

        Ok(Self { header, envelope })
    }
}

/// Read a bundle from disk
pub fn read_bundle_file(path: &Path) -> Result<Bundle> {
    let data = std::fs::read(path)?;
    Bundle::from_bytes(&data)
}

/// Write a bundle to disk (creates new file or overwrites), returning the
/// number of bytes written
pub fn write_bundle_file(path: &Path, bundle: &Bundle) -> Result<usize> {
    let bytes = bundle.to_bytes()?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(bytes.len())
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}
