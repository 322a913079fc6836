//! Local identity.
//!
//! An `Identity` is an explicit value (username + long-term key pair) owned
//! by whoever holds it; nothing here is process-global. A messenger holds at
//! most one, and several messengers can live in one process without sharing
//! key material.

use om_crypto::{
    certificate::{Certificate, SignedCertificate},
    identity::{KeyPair, PublicKeyBytes},
    PrimitiveProvider,
};

use crate::error::Result;

#[derive(Debug)]
pub struct Identity {
    username: String,
    keypair: KeyPair,
}

impl Identity {
    pub fn new(username: impl Into<String>, keypair: KeyPair) -> Self {
        Self {
            username: username.into(),
            keypair,
        }
    }

    /// Fresh key pair plus a self-signed certificate for it.
    pub fn generate<P: PrimitiveProvider + ?Sized>(
        provider: &P,
        username: &str,
    ) -> Result<(Self, SignedCertificate)> {
        let identity = Self::new(username, provider.generate_keypair()?);
        let signed = identity.self_signed(provider)?;
        Ok((identity, signed))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn public_key(&self) -> &PublicKeyBytes {
        self.keypair.public()
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    /// Unsigned certificate, for submission to an authority.
    pub fn certificate(&self) -> Certificate {
        Certificate::new(self.username.clone(), self.keypair.public().clone())
    }

    pub fn self_signed<P: PrimitiveProvider + ?Sized>(&self, provider: &P) -> Result<SignedCertificate> {
        Ok(SignedCertificate::issue(provider, &self.keypair, self.certificate())?)
    }
}
