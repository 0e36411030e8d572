use crate::config::TagHash;
use crate::error::{Result, ShroudError};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use sha3::{Digest, Sha3_256};

type HmacSha3_256 = Hmac<Sha3_256>;
type HmacSha256 = Hmac<Sha256>;

pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

/// Encrypt with a fresh random nonce.
/// Output layout: nonce || tag || ciphertext
pub fn seal(key: &[u8], plaintext: &[u8], hash: TagHash) -> Vec<u8> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    seal_with_nonce(key, &nonce, plaintext, hash)
}

pub fn seal_with_nonce(
    key: &[u8],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    hash: TagHash,
) -> Vec<u8> {
    let mut ciphertext = plaintext.to_vec();
    apply_keystream(key, nonce, &mut ciphertext);
    let tag = compute_tag(key, nonce, &ciphertext, hash);

    let mut out = Vec::with_capacity(NONCE_SIZE + TAG_SIZE + ciphertext.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&tag);
    out.extend_from_slice(&ciphertext);
    out
}

/// Verify the tag and decrypt. `layer` only labels the error.
pub fn open(key: &[u8], sealed: &[u8], hash: TagHash, layer: usize) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(ShroudError::Truncated { layer });
    }

    let (nonce, rest) = sealed.split_at(NONCE_SIZE);
    let (tag, ciphertext) = rest.split_at(TAG_SIZE);

    let expected = compute_tag(key, nonce, ciphertext, hash);
    if !constant_time_compare(&expected, tag) {
        return Err(ShroudError::AuthenticationFailed { layer });
    }

    let mut plaintext = ciphertext.to_vec();
    apply_keystream(key, nonce, &mut plaintext);
    Ok(plaintext)
}

/// XOR data with a SHA3 counter-mode stream keyed by (key, nonce)
fn apply_keystream(key: &[u8], nonce: &[u8], data: &mut [u8]) {
    for (counter, chunk) in data.chunks_mut(32).enumerate() {
        let mut hasher = Sha3_256::new();
        hasher.update(b"shroud_stream_v1");
        hasher.update(key);
        hasher.update(nonce);
        hasher.update((counter as u64).to_le_bytes());
        let block = hasher.finalize();

        for (byte, k) in chunk.iter_mut().zip(block.iter()) {
            *byte ^= k;
        }
    }
}

fn compute_tag(key: &[u8], nonce: &[u8], ciphertext: &[u8], hash: TagHash) -> [u8; TAG_SIZE] {
    let full: Vec<u8> = match hash {
        TagHash::Sha3 => {
            let mut mac =
                HmacSha3_256::new_from_slice(key).expect("HMAC can take key of any size");
            mac.update(nonce);
            mac.update(ciphertext);
            mac.finalize().into_bytes().to_vec()
        }
        TagHash::Blake3 => {
            let derived = blake3::hash(key);
            let mut hasher = blake3::Hasher::new_keyed(derived.as_bytes());
            hasher.update(nonce);
            hasher.update(ciphertext);
            hasher.finalize().as_bytes().to_vec()
        }
        TagHash::Sha256 => {
            let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
            mac.update(nonce);
            mac.update(ciphertext);
            mac.finalize().into_bytes().to_vec()
        }
    };

    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&full[..TAG_SIZE]);
    tag
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
