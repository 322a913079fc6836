//! Oversight party.
//!
//! Holds the private half of the key every chain key is escrowed to, and is
//! the only component able to unwrap `gov_encrypted_key`. Peers never get a
//! handle to this type's key or its unwrap path.

use om_crypto::{
    escrow::unwrap_escrowed,
    identity::{KeyPair, PublicKeyBytes},
    kdf::SymmetricKey,
    DefaultProvider, PrimitiveProvider,
};
use om_proto::{EncryptedMessage, MessageHeader};
use tracing::{info, warn};

use crate::{error::Result, sealing};

pub struct Oversight<P: PrimitiveProvider = DefaultProvider> {
    provider: P,
    keypair: KeyPair,
}

impl Oversight<DefaultProvider> {
    pub fn generate() -> Result<Self> {
        Self::generate_with(DefaultProvider)
    }
}

impl<P: PrimitiveProvider> Oversight<P> {
    pub fn generate_with(provider: P) -> Result<Self> {
        let keypair = provider.generate_keypair()?;
        Ok(Self { provider, keypair })
    }

    pub fn from_keypair(provider: P, keypair: KeyPair) -> Self {
        Self { provider, keypair }
    }

    /// Goes into every messenger's `MessengerConfig::oversight_public_key`.
    pub fn public_key(&self) -> &PublicKeyBytes {
        self.keypair.public()
    }

    /// Unwrap the chain key escrowed in `header`.
    pub fn recover_chain_key(&self, header: &MessageHeader) -> Result<SymmetricKey> {
        header.check_version()?;
        let iv = header.iv_bytes()?;
        Ok(unwrap_escrowed(
            &self.provider,
            &self.keypair,
            &header.gov_encrypted_key,
            &iv,
        )?)
    }

    /// Decrypt a message from its escrowed chain key alone.
    pub fn decrypt_message(&self, message: &EncryptedMessage) -> Result<String> {
        let parsed = sealing::parse(message)?;
        let chain_key = self.recover_chain_key(&message.header).map_err(|e| {
            warn!(
                target: "om_messenger",
                event = "escrow_unwrap_failed",
                counter = message.header.counter,
                error = %e
            );
            e
        })?;
        let plaintext = sealing::open(&self.provider, &chain_key, &parsed)?;
        info!(
            target: "om_messenger",
            event = "escrow_decrypt_ok",
            counter = message.header.counter
        );
        Ok(plaintext)
    }
}
