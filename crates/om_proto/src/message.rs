//! Encrypted message as handed to (and received from) the transport.

use serde::{Deserialize, Serialize};

use crate::codec::{decode_bytes, encode_bytes, CodecError};
use crate::header::MessageHeader;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMessage {
    pub header: MessageHeader,
    /// AES-256-GCM body (padded plaintext), base64url.
    pub ciphertext: String,
}

impl EncryptedMessage {
    pub fn new(header: MessageHeader, ciphertext: &[u8]) -> Self {
        Self {
            header,
            ciphertext: encode_bytes(ciphertext),
        }
    }

    pub fn ciphertext_bytes(&self) -> Result<Vec<u8>, CodecError> {
        decode_bytes("ciphertext", &self.ciphertext)
    }

    /// Text form for transports that carry strings.
    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the text form; rejects unknown wire versions.
    pub fn from_json(s: &str) -> Result<Self, CodecError> {
        let msg: Self = serde_json::from_str(s)?;
        msg.header.check_version()?;
        Ok(msg)
    }
}
