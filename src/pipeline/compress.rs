use crate::config::Compression;
use crate::error::{Result, ShroudError};

const ZSTD_LEVEL: i32 = 3;

/// Compress the envelope body
pub fn compress(data: &[u8], algorithm: Compression) -> Result<Vec<u8>> {
    match algorithm {
        Compression::Zstd => zstd::encode_all(data, ZSTD_LEVEL)
            .map_err(|e| ShroudError::CompressionError(format!("zstd: {}", e))),
        Compression::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        Compression::None => Ok(data.to_vec()),
    }
}

/// Decompress the envelope body
pub fn decompress(data: &[u8], algorithm: Compression) -> Result<Vec<u8>> {
    match algorithm {
        Compression::Zstd => zstd::decode_all(data)
            .map_err(|e| ShroudError::DecompressionError(format!("zstd: {}", e))),
        Compression::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| ShroudError::DecompressionError(format!("lz4: {}", e))),
        Compression::None => Ok(data.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Compression; 3] = [Compression::Zstd, Compression::Lz4, Compression::None];

    fn roundtrip(algorithm: Compression, data: &[u8]) {
        let compressed = compress(data, algorithm).unwrap();
        let decompressed = decompress(&compressed, algorithm).unwrap();
        assert_eq!(data, &decompressed[..]);
    }

    #[test]
    fn test_partition_table_roundtrip() {
        let table = br#"{"partitions":[["MHwwfGFi","MHwxfGNk"],["MXwwfGVm"]]}"#;
        for alg in ALL {
            roundtrip(alg, table);
        }
    }

    #[test]
    fn test_empty_data() {
        for alg in ALL {
            roundtrip(alg, b"");
        }
    }

    #[test]
    fn test_repetitive_data_shrinks() {
        let data = b"abstracts interfaces traits ".repeat(500);
        for alg in [Compression::Zstd, Compression::Lz4] {
            assert!(compress(&data, alg).unwrap().len() < data.len());
        }
    }

    #[test]
    fn test_garbage_fails_to_decompress() {
        let garbage = [0xffu8; 32];
        assert!(matches!(
            decompress(&garbage, Compression::Zstd),
            Err(ShroudError::DecompressionError(_))
        ));
        assert!(decompress(&garbage, Compression::Lz4).is_err());
    }
}
