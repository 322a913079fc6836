//! Identity certificates
//!
//! A `Certificate` binds a username to a public key. It only becomes
//! trustworthy once a signature over its canonical form verifies against a
//! trusted public key, which yields a `VerifiedCertificate`. Nothing else
//! can construct a `VerifiedCertificate`, so code that stores peer keys can
//! demand one and never see an unverified key.
//!
//! Canonical form (signed bytes):
//!   {"public_key":"<b64url>","username":"<name>","version":1}
//! Keys are emitted in this fixed lexicographic order with no whitespace.

use serde::{Deserialize, Serialize};

use crate::{
    error::CryptoError,
    identity::{KeyPair, PublicKeyBytes, Signature},
    provider::PrimitiveProvider,
};

pub const CERTIFICATE_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub username: String,
    pub public_key: PublicKeyBytes,
}

impl Certificate {
    pub fn new(username: impl Into<String>, public_key: PublicKeyBytes) -> Self {
        Self {
            username: username.into(),
            public_key,
        }
    }

    /// Deterministic bytes covered by the signature.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        // serde_json::Map is a BTreeMap without `preserve_order`, so keys
        // are serialised sorted.
        let payload = serde_json::json!({
            "public_key": self.public_key.to_b64(),
            "username": self.username,
            "version": CERTIFICATE_VERSION,
        });
        Ok(serde_json::to_vec(&payload)?)
    }

    pub fn fingerprint(&self) -> String {
        self.public_key.fingerprint()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCertificate {
    pub certificate: Certificate,
    pub signature: Signature,
}

impl SignedCertificate {
    /// Sign `certificate` with `signer` (the authority, or the subject itself
    /// for a self-signed certificate).
    pub fn issue<P: PrimitiveProvider + ?Sized>(
        provider: &P,
        signer: &KeyPair,
        certificate: Certificate,
    ) -> Result<Self, CryptoError> {
        let payload = certificate.canonical_bytes()?;
        let signature = provider.sign(signer, &payload);
        Ok(Self {
            certificate,
            signature,
        })
    }

    /// Check the signature against `trusted`.
    pub fn verify<P: PrimitiveProvider + ?Sized>(
        self,
        provider: &P,
        trusted: &PublicKeyBytes,
    ) -> Result<VerifiedCertificate, CryptoError> {
        let payload = self.certificate.canonical_bytes()?;
        provider.verify(trusted, &payload, &self.signature)?;
        // The certified key must itself be usable for key agreement.
        self.certificate.public_key.to_x25519()?;
        Ok(VerifiedCertificate(self.certificate))
    }
}

/// A certificate whose signature has been checked against a trusted key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCertificate(Certificate);

impl VerifiedCertificate {
    pub fn username(&self) -> &str {
        &self.0.username
    }

    pub fn public_key(&self) -> &PublicKeyBytes {
        &self.0.public_key
    }

    pub fn certificate(&self) -> &Certificate {
        &self.0
    }
}
