//! Certificate authority: the trusted party whose signature makes a
//! certificate acceptable to every messenger configured with its public key.

use om_crypto::{
    certificate::{Certificate, SignedCertificate},
    identity::{KeyPair, PublicKeyBytes, Signature},
    DefaultProvider, PrimitiveProvider,
};
use tracing::info;

use crate::error::Result;

pub struct CertificateAuthority<P: PrimitiveProvider = DefaultProvider> {
    provider: P,
    keypair: KeyPair,
}

impl CertificateAuthority<DefaultProvider> {
    pub fn generate() -> Result<Self> {
        Self::generate_with(DefaultProvider)
    }
}

impl<P: PrimitiveProvider> CertificateAuthority<P> {
    pub fn generate_with(provider: P) -> Result<Self> {
        let keypair = provider.generate_keypair()?;
        Ok(Self { provider, keypair })
    }

    pub fn from_keypair(provider: P, keypair: KeyPair) -> Self {
        Self { provider, keypair }
    }

    pub fn public_key(&self) -> &PublicKeyBytes {
        self.keypair.public()
    }

    /// Signature over the certificate's canonical form.
    pub fn sign(&self, certificate: &Certificate) -> Result<Signature> {
        Ok(self.issue(certificate.clone())?.signature)
    }

    pub fn issue(&self, certificate: Certificate) -> Result<SignedCertificate> {
        info!(
            target: "om_messenger",
            event = "certificate_issued",
            username = %certificate.username,
            fingerprint = %certificate.fingerprint()
        );
        Ok(SignedCertificate::issue(&self.provider, &self.keypair, certificate)?)
    }
}
