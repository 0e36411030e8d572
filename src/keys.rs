//! Key derivation.
//!
//! A password is never stored. Protection turns it into two SHA3-512 factors
//! bound to random markers; the factors and markers travel in the bundle
//! header and are enough to rebuild the master key during recovery.
//!
//! ```text
//! factor_1 = SHA3-512-hex(password || "identity_marker_" || clock)
//! factor_2 = SHA3-512-hex(password || "entropy_marker_"  || entropy)
//! master   = SHA3-512(factor_1 || factor_2)
//! subkey   = SHA3-512(master || partition || layer || salt[partition % salts])
//! ```

use crate::clock::Clock;
use crate::error::{Result, ShroudError};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_512};
use zeroize::Zeroize;

pub const MASTER_KEY_SIZE: usize = 64;
pub const SALT_SIZE: usize = 48;
const ENTROPY_SIZE: usize = 16;

/// Random, protection-time inputs to key derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMarkers {
    /// Protection-time clock reading, kept in its exact textual form
    pub clock: String,
    /// Hex-encoded random bytes
    pub entropy: String,
    /// Hex-encoded partition salts
    pub salts: Vec<String>,
}

impl KeyMarkers {
    /// Generate fresh markers with `salts` partition salts
    pub fn generate(clock: &dyn Clock, salts: usize) -> Self {
        let mut rng = OsRng;
        let mut entropy = [0u8; ENTROPY_SIZE];
        rng.fill_bytes(&mut entropy);

        let salts = (0..salts.max(1))
            .map(|_| {
                let mut salt = [0u8; SALT_SIZE];
                rng.fill_bytes(&mut salt);
                hex::encode(salt)
            })
            .collect();

        Self {
            clock: format!("{}", clock.now()),
            entropy: hex::encode(entropy),
            salts,
        }
    }
}

/// Password-derived factors embedded in the bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySeal {
    pub identity: String,
    pub entropy: String,
}

impl KeySeal {
    pub fn derive(password: &str, markers: &KeyMarkers) -> Result<Self> {
        if password.is_empty() {
            return Err(ShroudError::EmptyPassword);
        }

        let mut hasher = Sha3_512::new();
        hasher.update(password.as_bytes());
        hasher.update(b"identity_marker_");
        hasher.update(markers.clock.as_bytes());
        let identity = hex::encode(hasher.finalize());

        let mut hasher = Sha3_512::new();
        hasher.update(password.as_bytes());
        hasher.update(b"entropy_marker_");
        hasher.update(markers.entropy.as_bytes());
        let entropy = hex::encode(hasher.finalize());

        Ok(Self { identity, entropy })
    }

    /// Hex digest of the master key, used as the derived hash sent to validation
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha3_512::new();
        hasher.update(self.identity.as_bytes());
        hasher.update(self.entropy.as_bytes());
        hex::encode(Sha3_512::digest(hasher.finalize().as_slice()))
    }
}

/// Master secret plus the salts needed for subkeys. Zeroized on drop.
pub struct KeyMaterial {
    master: [u8; MASTER_KEY_SIZE],
    salts: Vec<Vec<u8>>,
}

impl KeyMaterial {
    /// Protection side: derive from the password and freshly generated markers
    pub fn derive(password: &str, markers: &KeyMarkers) -> Result<(Self, KeySeal)> {
        let seal = KeySeal::derive(password, markers)?;
        let keys = Self::from_seal(&seal, markers)?;
        Ok((keys, seal))
    }

    /// Recovery side: rebuild from what the bundle carries
    pub fn from_seal(seal: &KeySeal, markers: &KeyMarkers) -> Result<Self> {
        if markers.salts.is_empty() {
            return Err(ShroudError::InvalidFormat("bundle carries no salts".into()));
        }

        let salts = markers
            .salts
            .iter()
            .map(|s| {
                hex::decode(s).map_err(|e| ShroudError::InvalidFormat(format!("salt: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let master = sha3_512(&[seal.identity.as_bytes(), seal.entropy.as_bytes()]);

        Ok(Self { master, salts })
    }

    /// Subkey for one (partition, layer) pair
    pub fn subkey(&self, partition: usize, layer: usize) -> [u8; MASTER_KEY_SIZE] {
        let salt = &self.salts[partition % self.salts.len()];
        sha3_512(&[
            &self.master,
            partition.to_string().as_bytes(),
            layer.to_string().as_bytes(),
            salt,
        ])
    }

    /// XOR stream key for camouflage on the given layer
    pub fn stream_key(&self, layer: usize) -> [u8; MASTER_KEY_SIZE] {
        sha3_512(&[&self.master, layer.to_string().as_bytes()])
    }

    /// Key for the outer envelope around the partition table
    pub fn envelope_key(&self) -> [u8; MASTER_KEY_SIZE] {
        sha3_512(&[&self.master])
    }
}

fn sha3_512(parts: &[&[u8]]) -> [u8; MASTER_KEY_SIZE] {
    let mut hasher = Sha3_512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; MASTER_KEY_SIZE];
    out.copy_from_slice(&hasher.finalize());
    out
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.master.zeroize();
        for salt in self.salts.iter_mut() {
            salt.zeroize();
        }
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("salts", &self.salts.len())
            .finish_non_exhaustive()
    }
}
