//! Primitive Provider boundary
//!
//! Everything above this module (ratchet, escrow, certificates, the
//! messenger facade) reaches cryptographic primitives only through
//! `PrimitiveProvider`. The provider is stateless; swapping it out (HSM,
//! test double, FIPS build) does not touch protocol logic.

use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::{
    aead::{self, AuthTag, Iv},
    error::CryptoError,
    identity::{self, KeyPair, PublicKeyBytes, Signature},
    kdf::{self, KdfContext, SymmetricKey},
};

pub trait PrimitiveProvider: Send + Sync {
    /// Fresh long-term (or ephemeral) key pair, signing and DH capable.
    fn generate_keypair(&self) -> Result<KeyPair, CryptoError>;

    fn sign(&self, key: &KeyPair, msg: &[u8]) -> Signature;

    fn verify(&self, public: &PublicKeyBytes, msg: &[u8], sig: &Signature) -> Result<(), CryptoError>;

    /// Symmetric DH: `dh(a, B) == dh(b, A)`.
    fn diffie_hellman(&self, local: &KeyPair, peer: &PublicKeyBytes) -> Result<SymmetricKey, CryptoError>;

    /// One-way 32-byte derivation, domain separated by `context`.
    fn derive_key(&self, input: &[u8], context: KdfContext) -> Result<SymmetricKey, CryptoError>;

    fn random_bytes(&self, out: &mut [u8]);

    fn aead_encrypt(
        &self,
        key: &SymmetricKey,
        iv: &Iv,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<(Vec<u8>, AuthTag), CryptoError>;

    fn aead_decrypt(
        &self,
        key: &SymmetricKey,
        iv: &Iv,
        ciphertext: &[u8],
        tag: &AuthTag,
        aad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;
}

/// Ed25519 / X25519 / HKDF-SHA256 / AES-256-GCM backed by the OS RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProvider;

impl PrimitiveProvider for DefaultProvider {
    fn generate_keypair(&self) -> Result<KeyPair, CryptoError> {
        Ok(KeyPair::generate())
    }

    fn sign(&self, key: &KeyPair, msg: &[u8]) -> Signature {
        key.sign(msg)
    }

    fn verify(&self, public: &PublicKeyBytes, msg: &[u8], sig: &Signature) -> Result<(), CryptoError> {
        identity::verify(public, msg, sig)
    }

    fn diffie_hellman(&self, local: &KeyPair, peer: &PublicKeyBytes) -> Result<SymmetricKey, CryptoError> {
        let peer_x = peer.to_x25519()?;
        let shared = local.x25519_secret().diffie_hellman(&peer_x);
        if !shared.was_contributory() {
            return Err(CryptoError::InvalidKey(
                "Diffie-Hellman output is non-contributory (low-order peer key)".into(),
            ));
        }
        Ok(SymmetricKey::from_bytes(*shared.as_bytes()))
    }

    fn derive_key(&self, input: &[u8], context: KdfContext) -> Result<SymmetricKey, CryptoError> {
        kdf::derive_key(input, context)
    }

    fn random_bytes(&self, out: &mut [u8]) {
        OsRng.fill_bytes(out);
    }

    fn aead_encrypt(
        &self,
        key: &SymmetricKey,
        iv: &Iv,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<(Vec<u8>, AuthTag), CryptoError> {
        aead::encrypt(key, iv, plaintext, aad)
    }

    fn aead_decrypt(
        &self,
        key: &SymmetricKey,
        iv: &Iv,
        ciphertext: &[u8],
        tag: &AuthTag,
        aad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        aead::decrypt(key, iv, ciphertext, tag, aad)
    }
}
