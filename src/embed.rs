//! Embedding index: payload slices scattered over decoy containers.
//!
//! The payload is cut into `payload_fragments` slices. Five fixed categories
//! each hold a set of opaquely named containers; every container draws a few
//! random slice keys and lists some decoy members next to them. A final pass
//! guarantees every slice appears somewhere, so the payload is always
//! recoverable from the index alone.

use crate::config::ShroudConfig;
use crate::error::{Result, ShroudError};
use crate::pipeline::fragment::fragment_data;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Decoy categories. Declaration order is the unpack order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Abstracts,
    Interfaces,
    Traits,
    Inheritance,
    Polymorphic,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Abstracts,
        Category::Interfaces,
        Category::Traits,
        Category::Inheritance,
        Category::Polymorphic,
    ];

    /// Slice keys each container of this category draws
    pub fn draw_count(self) -> usize {
        match self {
            Category::Abstracts => 3,
            Category::Interfaces => 2,
            Category::Traits => 4,
            Category::Inheritance => 3,
            Category::Polymorphic => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Abstracts => "abstracts",
            Category::Interfaces => "interfaces",
            Category::Traits => "traits",
            Category::Inheritance => "inheritance",
            Category::Polymorphic => "polymorphic",
        }
    }

    fn name_prefix(self) -> &'static str {
        match self {
            Category::Abstracts => "Abstract",
            Category::Interfaces => "Iface",
            Category::Traits => "Trait",
            Category::Inheritance => "Base",
            Category::Polymorphic => "Poly",
        }
    }
}

/// One payload slice reference inside a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub slot: String,
    pub fragment_key: usize,
    /// Base64 of the payload slice
    pub fragment_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    /// Decoy member names that carry no payload
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub records: Vec<EmbeddingRecord>,
}

/// Category → containers. Serializes as a JSON object keyed by category name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingIndex {
    pub categories: BTreeMap<Category, Vec<Container>>,
}

impl EmbeddingIndex {
    /// Scatter `payload` over freshly generated decoy containers
    pub fn scatter<R: Rng + ?Sized>(payload: &[u8], config: &ShroudConfig, rng: &mut R) -> Self {
        let slices: BTreeMap<usize, String> = fragment_data(payload, config.payload_fragments)
            .into_iter()
            .enumerate()
            .filter(|(_, slice)| !slice.is_empty())
            .map(|(key, slice)| (key, STANDARD.encode(slice)))
            .collect();
        let keys: Vec<usize> = slices.keys().copied().collect();

        let mut index = Self::default();
        let mut drawn = BTreeSet::new();

        for category in Category::ALL {
            let containers = (0..config.containers_per_category)
                .map(|_| {
                    let take = category.draw_count().min(keys.len());
                    let records = keys
                        .choose_multiple(rng, take)
                        .map(|&key| {
                            drawn.insert(key);
                            EmbeddingRecord {
                                slot: opaque_name("s_", rng),
                                fragment_key: key,
                                fragment_data: slices[&key].clone(),
                            }
                        })
                        .collect();
                    let members = (0..rng.gen_range(1..=3))
                        .map(|_| opaque_name("m_", rng))
                        .collect();

                    Container {
                        name: opaque_name(category.name_prefix(), rng),
                        members,
                        records,
                    }
                })
                .collect();
            index.categories.insert(category, containers);
        }

        // Completeness: park every undrawn slice in a random container
        for key in keys.iter().filter(|k| !drawn.contains(*k)) {
            let category = Category::ALL[rng.gen_range(0..Category::ALL.len())];
            if let Some(containers) = index.categories.get_mut(&category) {
                if let Some(container) = containers.choose_mut(rng) {
                    container.records.push(EmbeddingRecord {
                        slot: opaque_name("s_", rng),
                        fragment_key: *key,
                        fragment_data: slices[key].clone(),
                    });
                }
            }
        }

        debug!(
            slices = keys.len(),
            containers = index.container_count(),
            "scattered payload"
        );
        index
    }

    pub fn container_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Strict deserialization
    pub fn parse_primary(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| ShroudError::Structural(format!("json: {}", e)))
    }

    /// Lenient deserialization: tolerates invalid UTF-8 and trailing padding,
    /// and skips any container or record that does not have the expected shape.
    pub fn parse_alternate(bytes: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());

        let value: Value = serde_json::from_str(text)
            .map_err(|e| ShroudError::Structural(format!("lenient json: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| ShroudError::Structural("index is not an object".into()))?;

        let mut index = Self::default();
        for category in Category::ALL {
            let Some(entries) = object.get(category.as_str()).and_then(Value::as_array) else {
                continue;
            };
            let containers = entries.iter().filter_map(lenient_container).collect();
            index.categories.insert(category, containers);
        }
        Ok(index)
    }

    /// Collect every record in category order, key slices by `fragment_key`
    /// and join them in key order.
    pub fn payload(&self) -> Result<Vec<u8>> {
        let mut slices: BTreeMap<usize, Vec<u8>> = BTreeMap::new();

        for category in Category::ALL {
            let Some(containers) = self.categories.get(&category) else {
                continue;
            };
            for record in containers.iter().flat_map(|c| c.records.iter()) {
                match STANDARD.decode(&record.fragment_data) {
                    Ok(data) => {
                        slices.insert(record.fragment_key, data);
                    }
                    Err(e) => debug!(key = record.fragment_key, "skipping record: {}", e),
                }
            }
        }

        let payload: Vec<u8> = slices.into_values().flatten().collect();
        if payload.is_empty() {
            return Err(ShroudError::Structural("index holds no payload".into()));
        }
        Ok(payload)
    }
}

/// Recover the payload from serialized index bytes, trying the strict parser
/// first and the lenient one once.
pub fn unpack(bytes: &[u8]) -> Result<Vec<u8>> {
    match EmbeddingIndex::parse_primary(bytes).and_then(|index| index.payload()) {
        Ok(payload) => Ok(payload),
        Err(primary) => {
            debug!("primary unpack failed ({}), trying lenient parser", primary);
            EmbeddingIndex::parse_alternate(bytes)?.payload()
        }
    }
}

fn lenient_container(value: &Value) -> Option<Container> {
    let object = value.as_object()?;
    let name = object
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let members: Vec<String> = object
        .get("members")
        .and_then(Value::as_array)
        .map(|m| m.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();
    let records: Vec<EmbeddingRecord> = object
        .get("records")
        .and_then(Value::as_array)
        .map(|r| {
            r.iter()
                .filter_map(|rec| serde_json::from_value(rec.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    Some(Container {
        name,
        members,
        records,
    })
}

fn opaque_name<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> String {
    format!("{}{:08x}", prefix, rng.gen::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scatter(payload: &[u8]) -> EmbeddingIndex {
        let mut rng = StdRng::seed_from_u64(7);
        EmbeddingIndex::scatter(payload, &ShroudConfig::default(), &mut rng)
    }

    #[test]
    fn test_scatter_unpack_roundtrip() {
        let payload = b"print('hello from a decoy forest')".repeat(20);
        let index = scatter(&payload);
        let bytes = index.to_bytes().unwrap();
        assert_eq!(unpack(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_five_categories_in_order() {
        let index = scatter(b"hello-world");
        let names: Vec<&str> = index.categories.keys().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            vec!["abstracts", "interfaces", "traits", "inheritance", "polymorphic"]
        );
        assert_eq!(index.container_count(), 25);
    }

    #[test]
    fn test_serialized_keys_are_category_names() {
        let bytes = scatter(b"hello-world").to_bytes().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        for category in Category::ALL {
            assert!(value.get(category.as_str()).is_some());
        }
    }

    #[test]
    fn test_every_slice_is_embedded() {
        // 11 bytes over 25 slices leaves 11 non-empty slices, keys 0..11
        let index = scatter(b"hello-world");
        let keys: BTreeSet<usize> = index
            .categories
            .values()
            .flatten()
            .flat_map(|c| c.records.iter().map(|r| r.fragment_key))
            .collect();
        assert_eq!(keys, (0..11).collect());
    }

    #[test]
    fn test_containers_have_decoy_members() {
        let index = scatter(b"hello-world");
        for container in index.categories.values().flatten() {
            assert!((1..=3).contains(&container.members.len()));
            assert!(container.name.len() > 8);
        }
    }

    #[test]
    fn test_draw_counts_capped_by_available_slices() {
        let index = scatter(b"ab");
        for (category, containers) in &index.categories {
            for container in containers {
                // Completeness may add at most the undrawn keys on top
                assert!(container.records.len() <= category.draw_count().max(2));
            }
        }
        assert_eq!(unpack(&index.to_bytes().unwrap()).unwrap(), b"ab");
    }

    #[test]
    fn test_lenient_parser_trims_trailing_padding() {
        let payload = b"trailing padding survives".to_vec();
        let mut bytes = scatter(&payload).to_bytes().unwrap();
        bytes.extend_from_slice(b"\0\0\n ");

        assert!(EmbeddingIndex::parse_primary(&bytes).is_err());
        assert_eq!(unpack(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_lenient_parser_skips_malformed_records() {
        let raw = r#"{
            "abstracts": [{"name": "A", "members": [], "records": [
                {"slot": "s", "fragment_key": 1, "fragment_data": "d29ybGQ="},
                {"slot": "s", "fragment_key": "oops", "fragment_data": "eA=="}
            ]}],
            "traits": [42, {"name": "T", "records": [
                {"slot": "s", "fragment_key": 0, "fragment_data": "aGVsbG8g"}
            ]}]
        }"#;

        assert!(EmbeddingIndex::parse_primary(raw.as_bytes()).is_err());
        assert_eq!(unpack(raw.as_bytes()).unwrap(), b"hello world");
    }

    #[test]
    fn test_payload_orders_by_key_not_position() {
        let raw = r#"{"polymorphic": [{"name": "P", "records": [
            {"slot": "a", "fragment_key": 10, "fragment_data": "Yw=="},
            {"slot": "b", "fragment_key": 2, "fragment_data": "YQ=="},
            {"slot": "c", "fragment_key": 3, "fragment_data": "Yg=="}
        ]}]}"#;
        assert_eq!(unpack(raw.as_bytes()).unwrap(), b"abc");
    }

    #[test]
    fn test_empty_index_is_structural_error() {
        assert!(matches!(
            unpack(b"{}"),
            Err(ShroudError::Structural(_))
        ));
        assert!(matches!(
            unpack(b"not json at all"),
            Err(ShroudError::Structural(_))
        ));
    }
}
