//! Message header — travels in the clear next to every ciphertext.
//!
//! The relay (and anyone else on the path) sees:
//!   - version          (wire format version)
//!   - counter          (sender's step index in the shared ratchet)
//!   - iv               (16-byte AES-GCM IV, also binds the escrowed key)
//!   - auth_tag         (GCM tag over the body)
//!   - gov_encrypted_key (chain key wrapped for the oversight party)
//!
//! None of these reveal the chain key or the message key to a peer.

use om_crypto::{
    aead::{AuthTag, Iv},
    escrow::EscrowedKey,
};
use serde::{Deserialize, Serialize};

use crate::codec::{decode_fixed, encode_bytes, CodecError};
use crate::PROTOCOL_VERSION;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub version: u8,
    pub counter: u64,
    /// base64url, 16 bytes
    pub iv: String,
    /// base64url, 16 bytes
    pub auth_tag: String,
    pub gov_encrypted_key: EscrowedKey,
}

impl MessageHeader {
    pub fn new(counter: u64, iv: &Iv, auth_tag: &AuthTag, gov_encrypted_key: EscrowedKey) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            counter,
            iv: encode_bytes(iv),
            auth_tag: encode_bytes(auth_tag),
            gov_encrypted_key,
        }
    }

    pub fn check_version(&self) -> Result<(), CodecError> {
        if self.version != PROTOCOL_VERSION {
            return Err(CodecError::UnsupportedVersion(self.version));
        }
        Ok(())
    }

    pub fn iv_bytes(&self) -> Result<Iv, CodecError> {
        decode_fixed("iv", &self.iv)
    }

    pub fn auth_tag_bytes(&self) -> Result<AuthTag, CodecError> {
        decode_fixed("auth_tag", &self.auth_tag)
    }

    /// Associated data bound into the body's AEAD: version ‖ counter (LE).
    pub fn associated_data(&self) -> Vec<u8> {
        associated_data(self.version, self.counter)
    }
}

pub fn associated_data(version: u8, counter: u64) -> Vec<u8> {
    let mut aad = Vec::with_capacity(1 + 8);
    aad.push(version);
    aad.extend_from_slice(&counter.to_le_bytes());
    aad
}
