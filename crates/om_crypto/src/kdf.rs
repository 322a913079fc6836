//! Key derivation
//!
//! Every derivation in the protocol goes through HKDF-SHA256 with a fixed
//! protocol salt and a per-purpose `info` label. Labels are never shared
//! between purposes, so the root chain, the per-message chain keys, the
//! message keys and the escrow wrapping key live in disjoint domains even
//! when fed related input.
//!
//! | Context        | info label            | input                                |
//! |----------------|-----------------------|--------------------------------------|
//! | `RootInit`     | `om-root-init-v1`     | DH(local, peer)                      |
//! | `RootAdvance`  | `om-root-advance-v1`  | previous root key                    |
//! | `ChainKey`     | `om-chain-key-v1`     | freshly advanced root key            |
//! | `MessageKey`   | `om-message-key-v1`   | chain key                            |
//! | `EscrowWrap`   | `om-escrow-wrap-v1`   | DH(eph, oversight) ‖ eph ‖ oversight |

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Salt shared by every protocol derivation.
pub const PROTOCOL_SALT: &[u8] = b"om-ratchet-salt-v1";

/// 32-byte symmetric secret (root key, chain key, message key, DH output).
/// Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("symmetric key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Purpose of a derivation. Each variant maps to a distinct HKDF info label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KdfContext {
    RootInit,
    RootAdvance,
    ChainKey,
    MessageKey,
    EscrowWrap,
}

impl KdfContext {
    pub fn info(self) -> &'static [u8] {
        match self {
            KdfContext::RootInit => b"om-root-init-v1",
            KdfContext::RootAdvance => b"om-root-advance-v1",
            KdfContext::ChainKey => b"om-chain-key-v1",
            KdfContext::MessageKey => b"om-message-key-v1",
            KdfContext::EscrowWrap => b"om-escrow-wrap-v1",
        }
    }
}

/// Expand `ikm` + `info` into `output.len()` bytes of key material.
///
/// `salt` may be `None` (HKDF will use a zeroed salt).
pub fn hkdf_expand(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    output: &mut [u8],
) -> Result<(), CryptoError> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    hk.expand(info, output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}

/// One-way 32-byte derivation for a protocol purpose.
pub fn derive_key(input: &[u8], context: KdfContext) -> Result<SymmetricKey, CryptoError> {
    let mut out = [0u8; 32];
    hkdf_expand(input, Some(PROTOCOL_SALT), context.info(), &mut out)?;
    let key = SymmetricKey(out);
    out.zeroize();
    Ok(key)
}
