use crate::error::{Result, ShroudError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha3::{Digest, Sha3_512};

const FIELD_SEPARATOR: char = '|';
const FIELD_COUNT: usize = 5;

/// One addressed slice with its integrity tag.
///
/// Encoded as `partition|index|tag|marker|base64(data)`; none of the fields
/// can contain the separator, so the encoding is self-delimiting.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentRecord {
    pub partition: usize,
    pub index: usize,
    /// Hex SHA3-512 of `marker || partition || index`
    pub tag: String,
    /// Protection-time clock reading in its exact textual form
    pub marker: String,
    pub data: Vec<u8>,
}

impl FragmentRecord {
    /// Create a tagged record stamped with `marker` (seconds)
    pub fn new(partition: usize, index: usize, marker: f64, data: &[u8]) -> Self {
        let marker = format!("{}", marker);
        let tag = compute_tag(&marker, partition, index);
        Self {
            partition,
            index,
            tag,
            marker,
            data: data.to_vec(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}|{}",
            self.partition,
            self.index,
            self.tag,
            self.marker,
            STANDARD.encode(&self.data)
        )
        .into_bytes()
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| ShroudError::MalformedRecord("not valid UTF-8".into()))?;

        let parts: Vec<&str> = text.splitn(FIELD_COUNT, FIELD_SEPARATOR).collect();
        if parts.len() < FIELD_COUNT {
            return Err(ShroudError::MalformedRecord(format!(
                "expected {} fields, found {}",
                FIELD_COUNT,
                parts.len()
            )));
        }

        let partition = parse_field(parts[0], "partition")?;
        let index = parse_field(parts[1], "index")?;
        let marker = parts[3].to_string();
        if marker.parse::<f64>().is_err() {
            return Err(ShroudError::MalformedRecord(format!(
                "invalid marker: {}",
                marker
            )));
        }
        let data = STANDARD.decode(parts[4])?;

        Ok(Self {
            partition,
            index,
            tag: parts[2].to_string(),
            marker,
            data,
        })
    }

    pub fn marker_secs(&self) -> f64 {
        self.marker.parse().unwrap_or(f64::NAN)
    }

    pub fn tag_matches(&self) -> bool {
        compute_tag(&self.marker, self.partition, self.index) == self.tag
    }

    /// Check the tag. A mismatch is forgiven when the marker lies within
    /// `tolerance` seconds of `now`.
    ///
    /// The window makes this a heuristic, not an integrity guarantee: a
    /// freshly forged record with a wrong tag passes.
    pub fn verify(&self, now: f64, tolerance: f64) -> Result<()> {
        if self.tag_matches() {
            return Ok(());
        }

        let drift = (now - self.marker_secs()).abs();
        if drift <= tolerance {
            return Ok(());
        }

        Err(ShroudError::CoherenceViolation {
            partition: self.partition,
            index: self.index,
        })
    }
}

pub fn compute_tag(marker: &str, partition: usize, index: usize) -> String {
    let mut hasher = Sha3_512::new();
    hasher.update(marker.as_bytes());
    hasher.update(partition.to_string().as_bytes());
    hasher.update(index.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn parse_field(field: &str, name: &str) -> Result<usize> {
    field
        .parse()
        .map_err(|_| ShroudError::MalformedRecord(format!("invalid {}: {:?}", name, field)))
}
