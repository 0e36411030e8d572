//! Optional remote validation handshake.
//!
//! Runs at protection time only, and only when an endpoint is configured. The
//! request carries the key fingerprint and digests of random password
//! substrings; the password text itself never leaves the process. Every
//! outcome, including timeouts and network errors, lets protection proceed.

use crate::config::ValidationConfig;
use crate::error::{Result, ShroudError};
use crate::keys::KeySeal;
use rand::Rng;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub derived_hash: String,
    pub timestamp: f64,
    /// Hex SHA3-256 digests of random password substrings
    pub samples: Vec<String>,
}

impl ValidationRequest {
    pub fn build<R: Rng + ?Sized>(
        seal: &KeySeal,
        password: &str,
        timestamp: f64,
        config: &ValidationConfig,
        rng: &mut R,
    ) -> Self {
        Self {
            derived_hash: seal.fingerprint(),
            timestamp,
            samples: sample_digests(password, config, rng),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted,
    Rejected(String),
    Unreachable(String),
}

pub trait Validator {
    fn validate(&self, request: &ValidationRequest) -> ValidationOutcome;
}

/// POSTs the request as JSON with a bounded timeout
pub struct HttpValidator {
    client: Client,
    endpoint: String,
}

impl HttpValidator {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ShroudError::InvalidConfig(format!("validation client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// Build a validator when the config names an endpoint
    pub fn from_config(config: &ValidationConfig) -> Result<Option<Self>> {
        config
            .endpoint
            .as_deref()
            .map(|endpoint| Self::new(endpoint, config.timeout_secs))
            .transpose()
    }
}

impl Validator for HttpValidator {
    fn validate(&self, request: &ValidationRequest) -> ValidationOutcome {
        match self.client.post(&self.endpoint).json(request).send() {
            Ok(response) if response.status().is_success() => ValidationOutcome::Accepted,
            Ok(response) => ValidationOutcome::Rejected(response.status().to_string()),
            Err(e) => ValidationOutcome::Unreachable(e.to_string()),
        }
    }
}

/// Run the handshake and log the result. Never fails.
pub fn run_validation(validator: &dyn Validator, request: &ValidationRequest) -> ValidationOutcome {
    let outcome = validator.validate(request);
    match &outcome {
        ValidationOutcome::Accepted => info!("validation accepted"),
        ValidationOutcome::Rejected(status) => {
            warn!(%status, "validation rejected, continuing")
        }
        ValidationOutcome::Unreachable(reason) => {
            warn!(%reason, "validation endpoint unreachable, continuing")
        }
    }
    outcome
}

fn sample_digests<R: Rng + ?Sized>(
    password: &str,
    config: &ValidationConfig,
    rng: &mut R,
) -> Vec<String> {
    let chars: Vec<char> = password.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    (0..config.samples)
        .map(|_| {
            let len = rng
                .gen_range(config.min_sample_len..=config.max_sample_len)
                .min(chars.len());
            let start = rng.gen_range(0..=chars.len() - len);
            let sample: String = chars[start..start + len].iter().collect();
            debug!(len, "sampled password substring");
            hex::encode(Sha3_256::digest(sample.as_bytes()))
        })
        .collect()
}
