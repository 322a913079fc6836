//! Message body encryption given a chain key.
//!
//!   MK   = KDF(CK, MessageKey)
//!   body = AES-256-GCM(MK, iv, pad(plaintext), aad = version ‖ counter)
//!
//! Shared by the peer facade (which obtains CK from its ratchet) and the
//! oversight party (which obtains CK from the escrowed key).

use om_crypto::{
    aead::{AuthTag, Iv, IV_LEN},
    escrow::wrap_for_oversight,
    identity::PublicKeyBytes,
    kdf::{KdfContext, SymmetricKey},
    ratchet::StepOutput,
    PrimitiveProvider,
};
use om_proto::{codec, header::associated_data, EncryptedMessage, MessageHeader, PaddingMode, PROTOCOL_VERSION};

use crate::error::{MessengerError, Result};

/// Header and body decoded and checked, ready to decrypt.
pub(crate) struct ParsedMessage {
    pub iv: Iv,
    pub tag: AuthTag,
    pub ciphertext: Vec<u8>,
    pub aad: Vec<u8>,
}

pub(crate) fn seal<P: PrimitiveProvider + ?Sized>(
    provider: &P,
    step: &StepOutput,
    plaintext: &[u8],
    oversight: &PublicKeyBytes,
    padding: PaddingMode,
) -> Result<EncryptedMessage> {
    let message_key = provider.derive_key(step.chain_key.as_bytes(), KdfContext::MessageKey)?;

    let mut iv: Iv = [0u8; IV_LEN];
    provider.random_bytes(&mut iv);

    let padded = zeroize::Zeroizing::new(codec::pad(plaintext, padding)?);
    let aad = associated_data(PROTOCOL_VERSION, step.counter);
    let (ciphertext, tag) = provider.aead_encrypt(&message_key, &iv, &padded, &aad)?;

    let escrowed = wrap_for_oversight(provider, &step.chain_key, oversight, &iv)?;
    let header = MessageHeader::new(step.counter, &iv, &tag, escrowed);
    Ok(EncryptedMessage::new(header, &ciphertext))
}

/// Validate everything that can be validated without key material.
pub(crate) fn parse(message: &EncryptedMessage) -> Result<ParsedMessage> {
    message.header.check_version()?;
    Ok(ParsedMessage {
        iv: message.header.iv_bytes()?,
        tag: message.header.auth_tag_bytes()?,
        ciphertext: message.ciphertext_bytes()?,
        aad: message.header.associated_data(),
    })
}

pub(crate) fn open<P: PrimitiveProvider + ?Sized>(
    provider: &P,
    chain_key: &SymmetricKey,
    parsed: &ParsedMessage,
) -> Result<String> {
    let message_key = provider.derive_key(chain_key.as_bytes(), KdfContext::MessageKey)?;
    let padded = provider
        .aead_decrypt(&message_key, &parsed.iv, &parsed.ciphertext, &parsed.tag, &parsed.aad)
        .map_err(|_| MessengerError::Decryption)?;
    let plaintext = codec::unpad(&padded)
        .map_err(|e| MessengerError::MalformedMessage(e.to_string()))?;
    String::from_utf8(plaintext)
        .map_err(|_| MessengerError::MalformedMessage("plaintext is not valid UTF-8".into()))
}
