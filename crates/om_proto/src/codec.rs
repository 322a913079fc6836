//! Wire codec — padding and field decoding.
//!
//! # Padding
//! Plaintext is padded to a fixed size bucket before encryption so the
//! ciphertext length only reveals the bucket, not the exact message length.
//!
//! Bucket sizes (bytes): 256, 512, 1024, 4096, 16384, 65536
//! Messages larger than 65536 bytes are length-prefixed but not padded.
//!
//! Format: [original_len: u32 LE] [plaintext] [random padding]

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Padding mode for length hiding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddingMode {
    /// Length prefix only — minimal bandwidth.
    None,
    /// Pad to fixed-size buckets.
    #[default]
    Buckets,
    /// Pad every message to the largest bucket (64KB).
    Maximum,
}

const BUCKET_SIZES: [usize; 6] = [256, 512, 1024, 4096, 16384, 65536];
const MAX_BUCKET: usize = BUCKET_SIZES[BUCKET_SIZES.len() - 1];

/// Pad plaintext according to `mode`.
pub fn pad(plaintext: &[u8], mode: PaddingMode) -> Result<Vec<u8>, CodecError> {
    let len = u32::try_from(plaintext.len())
        .map_err(|_| CodecError::InvalidPadding("plaintext exceeds u32::MAX bytes".into()))?;
    let needed = 4 + plaintext.len();
    let target = match mode {
        PaddingMode::None => needed,
        PaddingMode::Buckets => BUCKET_SIZES
            .iter()
            .copied()
            .find(|&b| b >= needed)
            .unwrap_or(needed),
        PaddingMode::Maximum => needed.max(MAX_BUCKET),
    };

    let mut out = Vec::with_capacity(target);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(plaintext);
    // Random fill, not zeros, so compressed transports leak nothing.
    let remaining = target - out.len();
    if remaining > 0 {
        let mut padding = vec![0u8; remaining];
        rand::rngs::OsRng.fill_bytes(&mut padding);
        out.extend_from_slice(&padding);
    }
    Ok(out)
}

/// Remove padding after decryption.
pub fn unpad(padded: &[u8]) -> Result<Vec<u8>, CodecError> {
    if padded.len() < 4 {
        return Err(CodecError::InvalidPadding("too short for length prefix".into()));
    }
    let len = u32::from_le_bytes([padded[0], padded[1], padded[2], padded[3]]) as usize;
    if 4 + len > padded.len() {
        return Err(CodecError::InvalidPadding(format!(
            "length prefix {len} exceeds padded data size {}",
            padded.len()
        )));
    }
    Ok(padded[4..4 + len].to_vec())
}

/// Decode a base64url field into a fixed-size array.
pub fn decode_fixed<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N], CodecError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| CodecError::InvalidField { field, reason: e.to_string() })?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| CodecError::InvalidField {
        field,
        reason: format!("expected {N} bytes, got {len}"),
    })
}

/// Decode a variable-length base64url field.
pub fn decode_bytes(field: &'static str, value: &str) -> Result<Vec<u8>, CodecError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| CodecError::InvalidField { field, reason: e.to_string() })
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid padding: {0}")]
    InvalidPadding(String),
    #[error("Invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("Unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
