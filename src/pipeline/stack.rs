use crate::config::TagHash;
use crate::error::Result;
use crate::keys::KeyMaterial;
use crate::pipeline::camouflage::Camouflage;
use crate::pipeline::cipher;

/// Ordered stack of reversible layers.
///
/// Forward, each layer seals the data under the (partition, layer) subkey and
/// then, on camouflaged layers, wraps it in the partition's structural
/// transform. Reverse walks the layers backwards and undoes camouflage before
/// opening the cipher.
#[derive(Debug, Clone, Copy)]
pub struct TransformStack {
    layers: usize,
    hash: TagHash,
}

impl TransformStack {
    pub fn new(layers: usize, hash: TagHash) -> Self {
        Self { layers, hash }
    }

    pub fn apply(&self, data: &[u8], partition: usize, keys: &KeyMaterial) -> Vec<u8> {
        let mut current = data.to_vec();

        for layer in 0..self.layers {
            let subkey = keys.subkey(partition, layer);
            current = cipher::seal(&subkey, &current, self.hash);

            if Camouflage::applies_to(layer) {
                let kind = Camouflage::select(layer, partition);
                current = kind.apply(&current, &keys.stream_key(layer));
            }
        }

        current
    }

    pub fn reverse(&self, data: &[u8], partition: usize, keys: &KeyMaterial) -> Result<Vec<u8>> {
        let mut current = data.to_vec();

        for layer in (0..self.layers).rev() {
            if Camouflage::applies_to(layer) {
                let kind = Camouflage::select(layer, partition);
                current = kind.reverse(&current, &keys.stream_key(layer), layer)?;
            }

            let subkey = keys.subkey(partition, layer);
            current = cipher::open(&subkey, &current, self.hash, layer)?;
        }

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::ShroudError;
    use crate::keys::KeyMarkers;

    fn keys(password: &str) -> KeyMaterial {
        let markers = KeyMarkers::generate(&FixedClock(1_700_000_000.0), 3);
        KeyMaterial::derive(password, &markers).unwrap().0
    }

    #[test]
    fn test_stack_roundtrip_each_partition() {
        let keys = keys("pw123");
        let stack = TransformStack::new(3, TagHash::Sha3);
        let data = b"0|3|deadbeef|1700000000.5|c2xpY2U=".to_vec();

        // Partitions 0..3 exercise all three camouflage kinds on layer 0
        for partition in 0..3 {
            let sealed = stack.apply(&data, partition, &keys);
            assert_ne!(sealed, data);
            assert_eq!(stack.reverse(&sealed, partition, &keys).unwrap(), data);
        }
    }

    #[test]
    fn test_single_layer_and_deep_stacks() {
        let keys = keys("pw");
        for layers in [1, 2, 5] {
            let stack = TransformStack::new(layers, TagHash::Blake3);
            let sealed = stack.apply(b"payload", 1, &keys);
            assert_eq!(stack.reverse(&sealed, 1, &keys).unwrap(), b"payload");
        }
    }

    #[test]
    fn test_wrong_partition_fails() {
        let keys = keys("pw123");
        let stack = TransformStack::new(3, TagHash::Sha3);
        let sealed = stack.apply(b"payload", 0, &keys);
        assert!(stack.reverse(&sealed, 1, &keys).is_err());
    }

    #[test]
    fn test_wrong_keys_fail_at_outermost_layer() {
        let stack = TransformStack::new(3, TagHash::Sha3);
        let sealed = stack.apply(b"payload", 0, &keys("a"));
        assert!(matches!(
            stack.reverse(&sealed, 0, &keys("b")),
            Err(ShroudError::AuthenticationFailed { layer: 2 })
        ));
    }

    #[test]
    fn test_flipped_byte_is_detected() {
        let keys = keys("pw123");
        let stack = TransformStack::new(3, TagHash::Sha3);
        let mut sealed = stack.apply(b"payload", 1, &keys);
        sealed[20] ^= 0x04;
        let err = stack.reverse(&sealed, 1, &keys).unwrap_err();
        assert!(err.is_fragment_local());
    }
}
