use crate::error::{Result, ShroudError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Envelope compression options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Zstd,
    Lz4,
    None,
}

impl std::str::FromStr for Compression {
    type Err = ShroudError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "zstd" => Ok(Self::Zstd),
            "lz4" => Ok(Self::Lz4),
            "none" => Ok(Self::None),
            _ => Err(ShroudError::UnsupportedAlgorithm(format!(
                "compression: {}",
                s
            ))),
        }
    }
}

/// Hash used for the per-layer authentication tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TagHash {
    #[default]
    Sha3,
    Blake3,
    Sha256,
}

impl std::str::FromStr for TagHash {
    type Err = ShroudError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sha3" => Ok(Self::Sha3),
            "blake3" => Ok(Self::Blake3),
            "sha256" => Ok(Self::Sha256),
            _ => Err(ShroudError::UnsupportedAlgorithm(format!("hash: {}", s))),
        }
    }
}

/// Remote validation settings. Validation only runs when an endpoint is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    /// Number of password-file samples to digest
    pub samples: usize,
    pub min_sample_len: usize,
    pub max_sample_len: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 10,
            samples: 8,
            min_sample_len: 8,
            max_sample_len: 20,
        }
    }
}

/// Protection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShroudConfig {
    /// Passes through the transform stack per fragment
    pub layers: usize,
    /// Number of parallel fragmentation schemes
    pub partitions: usize,
    /// Fragment count of partition 0; halves for every later partition
    pub base_fragments: usize,
    /// Number of slices the payload is cut into before embedding
    pub payload_fragments: usize,
    /// Decoy containers generated per category
    pub containers_per_category: usize,
    /// Random 48-byte salts mixed into subkeys (indexed by partition)
    pub salts: usize,
    /// Seconds of clock drift under which a tag mismatch is forgiven
    pub tolerance_secs: f64,
    pub compression: Compression,
    pub tag_hash: TagHash,
    pub validation: ValidationConfig,
}

impl Default for ShroudConfig {
    fn default() -> Self {
        Self {
            layers: 3,
            partitions: 2,
            base_fragments: 8,
            payload_fragments: 25,
            containers_per_category: 5,
            salts: 3,
            tolerance_secs: 10.0,
            compression: Compression::default(),
            tag_hash: TagHash::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl ShroudConfig {
    /// Load a config from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.layers == 0 || self.layers > 16 {
            return Err(ShroudError::InvalidConfig(format!(
                "layers must be between 1 and 16, got {}",
                self.layers
            )));
        }
        if self.partitions == 0 || self.partitions > 16 {
            return Err(ShroudError::InvalidConfig(format!(
                "partitions must be between 1 and 16, got {}",
                self.partitions
            )));
        }
        if self.base_fragments == 0 {
            return Err(ShroudError::InvalidConfig(
                "base_fragments must be positive".into(),
            ));
        }
        if self.payload_fragments == 0 {
            return Err(ShroudError::InvalidConfig(
                "payload_fragments must be positive".into(),
            ));
        }
        if self.containers_per_category == 0 {
            return Err(ShroudError::InvalidConfig(
                "containers_per_category must be positive".into(),
            ));
        }
        if self.salts == 0 {
            return Err(ShroudError::InvalidConfig("salts must be positive".into()));
        }
        if !self.tolerance_secs.is_finite() || self.tolerance_secs < 0.0 {
            return Err(ShroudError::InvalidConfig(format!(
                "tolerance_secs must be a non-negative number, got {}",
                self.tolerance_secs
            )));
        }
        let v = &self.validation;
        if v.min_sample_len == 0 || v.min_sample_len > v.max_sample_len {
            return Err(ShroudError::InvalidConfig(format!(
                "invalid sample length range {}..={}",
                v.min_sample_len, v.max_sample_len
            )));
        }
        Ok(())
    }

    /// Fragment count for each partition, in partition order
    pub fn fragment_counts(&self) -> Vec<usize> {
        (0..self.partitions)
            .map(|p| (self.base_fragments >> p.min(63)).max(1))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_is_valid() {
        let config = ShroudConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fragment_counts(), vec![8, 4]);
    }

    #[test]
    fn test_fragment_counts_halve_and_floor_at_one() {
        let config = ShroudConfig {
            partitions: 5,
            base_fragments: 8,
            ..Default::default()
        };
        assert_eq!(config.fragment_counts(), vec![8, 4, 2, 1, 1]);
    }

    #[test]
    fn test_invalid_values() {
        let bad_layers = ShroudConfig {
            layers: 0,
            ..Default::default()
        };
        assert!(bad_layers.validate().is_err());

        let bad_tolerance = ShroudConfig {
            tolerance_secs: f64::NAN,
            ..Default::default()
        };
        assert!(bad_tolerance.validate().is_err());

        let mut bad_samples = ShroudConfig::default();
        bad_samples.validation.min_sample_len = 30;
        assert!(bad_samples.validate().is_err());
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("ZSTD".parse::<Compression>().unwrap(), Compression::Zstd);
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert_eq!("blake3".parse::<TagHash>().unwrap(), TagHash::Blake3);
        assert!("brotli".parse::<Compression>().is_err());
        assert!("md5".parse::<TagHash>().is_err());
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shroud.json");
        std::fs::write(&path, br#"{"layers": 4, "compression": "lz4"}"#).unwrap();

        let config = ShroudConfig::from_file(&path).unwrap();
        assert_eq!(config.layers, 4);
        assert_eq!(config.compression, Compression::Lz4);
        assert_eq!(config.partitions, 2);
    }
}
