use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShroudError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid bundle format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Payload is empty")]
    EmptyPayload,

    #[error("Password is empty")]
    EmptyPassword,

    #[error("Compression error: {0}")]
    CompressionError(String),

    #[error("Decompression error: {0}")]
    DecompressionError(String),

    #[error("Authentication failed at layer {layer}")]
    AuthenticationFailed { layer: usize },

    #[error("Checksum mismatch at layer {layer}")]
    ChecksumMismatch { layer: usize },

    #[error("Ciphertext too short at layer {layer}")]
    Truncated { layer: usize },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Coherence violation for fragment {index} of partition {partition}")]
    CoherenceViolation { partition: usize, index: usize },

    #[error("Malformed fragment record: {0}")]
    MalformedRecord(String),

    #[error("Structural error: {0}")]
    Structural(String),

    #[error("No valid payload fragments could be reassembled")]
    NoValidPayload,

    #[error("Fallback extraction recovered nothing")]
    FallbackExhausted,

    #[error("Execution failed: {0}")]
    Execution(String),
}

impl ShroudError {
    /// Errors confined to a single fragment; reassembly drops the fragment and moves on.
    pub fn is_fragment_local(&self) -> bool {
        matches!(
            self,
            ShroudError::AuthenticationFailed { .. }
                | ShroudError::ChecksumMismatch { .. }
                | ShroudError::Truncated { .. }
                | ShroudError::Encoding(_)
                | ShroudError::CoherenceViolation { .. }
                | ShroudError::MalformedRecord(_)
        )
    }
}

impl From<base64::DecodeError> for ShroudError {
    fn from(err: base64::DecodeError) -> Self {
        ShroudError::Encoding(format!("base64: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, ShroudError>;
