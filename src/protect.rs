//! Protection: payload + password → bundle.
//!
//! ```text
//! payload → embedding index → JSON
//!         → per partition: fragment → tag record → transform stack
//!         → partition table → envelope
//! ```

use crate::bundle::{Bundle, BundleHeader, EncryptedFragment, PartitionTable, FORMAT_VERSION};
use crate::clock::{Clock, SystemClock};
use crate::config::ShroudConfig;
use crate::embed::EmbeddingIndex;
use crate::error::{Result, ShroudError};
use crate::keys::{KeyMarkers, KeyMaterial};
use crate::pipeline::fragment::fragment_data;
use crate::pipeline::record::FragmentRecord;
use crate::validate::{run_validation, HttpValidator, ValidationRequest, Validator};
use rand::rngs::OsRng;
use tracing::{debug, info};

/// Protect `payload` with the system clock and the configured validator
pub fn protect(payload: &[u8], password: &str, config: &ShroudConfig) -> Result<Bundle> {
    let http = HttpValidator::from_config(&config.validation)?;
    let mut protector = Protector::new(config, &SystemClock);
    if let Some(validator) = http.as_ref() {
        protector = protector.with_validator(validator);
    }
    protector.protect(payload, password)
}

/// Protect `payload` stamping markers from `clock`, without validation
pub fn protect_with_clock(
    payload: &[u8],
    password: &str,
    config: &ShroudConfig,
    clock: &dyn Clock,
) -> Result<Bundle> {
    Protector::new(config, clock).protect(payload, password)
}

/// Request-scoped protection context. Key material lives only for the
/// duration of one `protect` call.
pub struct Protector<'a> {
    config: &'a ShroudConfig,
    clock: &'a dyn Clock,
    validator: Option<&'a dyn Validator>,
}

impl<'a> Protector<'a> {
    pub fn new(config: &'a ShroudConfig, clock: &'a dyn Clock) -> Self {
        Self {
            config,
            clock,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: &'a dyn Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn protect(&self, payload: &[u8], password: &str) -> Result<Bundle> {
        self.config.validate()?;
        if payload.is_empty() {
            return Err(ShroudError::EmptyPayload);
        }

        let markers = KeyMarkers::generate(self.clock, self.config.salts);
        let (keys, seal) = KeyMaterial::derive(password, &markers)?;

        if let Some(validator) = self.validator {
            let request = ValidationRequest::build(
                &seal,
                password,
                self.clock.now(),
                &self.config.validation,
                &mut OsRng,
            );
            run_validation(validator, &request);
        }

        let index = EmbeddingIndex::scatter(payload, self.config, &mut OsRng);
        let serialized = index.to_bytes()?;
        debug!(
            payload = payload.len(),
            index = serialized.len(),
            "built embedding index"
        );

        let header = BundleHeader {
            version: FORMAT_VERSION,
            layers: self.config.layers,
            tolerance_secs: self.config.tolerance_secs,
            compression: self.config.compression,
            tag_hash: self.config.tag_hash,
            fragment_counts: self.config.fragment_counts(),
            markers,
            seal,
        };

        let table = self.fragment_and_seal(&serialized, &header, &keys);
        info!(
            partitions = table.partitions.len(),
            fragments = table.fragment_count(),
            layers = header.layers,
            "protected payload"
        );

        Bundle::seal(header, &table, &keys)
    }

    fn fragment_and_seal(
        &self,
        serialized: &[u8],
        header: &BundleHeader,
        keys: &KeyMaterial,
    ) -> PartitionTable {
        let stack = header.stack();
        let marker = self.clock.now();

        let partitions: Vec<Vec<EncryptedFragment>> = header
            .fragment_counts
            .iter()
            .enumerate()
            .map(|(partition, &count)| {
                fragment_data(serialized, count)
                    .into_iter()
                    .enumerate()
                    .map(|(index, slice)| {
                        let record = FragmentRecord::new(partition, index, marker, slice);
                        EncryptedFragment(stack.apply(&record.encode(), partition, keys))
                    })
                    .collect()
            })
            .collect();

        PartitionTable { partitions }
    }
}
