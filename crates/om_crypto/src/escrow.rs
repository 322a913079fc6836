//! Key escrow for the oversight party.
//!
//! Each message's chain key is encrypted to the oversight public key with an
//! ephemeral-static DH (ECIES shape):
//!
//!   E        = fresh key pair
//!   shared   = DH(E, O)
//!   wrap_key = KDF(shared ‖ E_pub ‖ O_pub, EscrowWrap)
//!   blob     = AES-256-GCM(wrap_key, iv_msg, CK, aad = "om-escrow-v1" ‖ E_pub)
//!
//! `iv_msg` is the IV of the message body. An escrowed key moved onto a
//! different message is decrypted under the wrong IV and fails its tag.
//!
//! Only the holder of O's private key can compute `shared`; the receiving
//! peer sees `E_pub` and the blob and learns nothing about CK from them.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{
    aead::{AuthTag, Iv, TAG_LEN},
    error::CryptoError,
    identity::{KeyPair, PublicKeyBytes},
    kdf::{KdfContext, SymmetricKey},
    provider::PrimitiveProvider,
};

const ESCROW_AAD_PREFIX: &[u8] = b"om-escrow-v1";

/// Chain key encrypted to the oversight party. Opaque to peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowedKey {
    /// Ephemeral public key used for this wrap.
    pub ephemeral_public_key: PublicKeyBytes,
    /// Encrypted chain key (base64url).
    pub ciphertext: String,
    /// GCM tag over the encrypted chain key (base64url).
    pub auth_tag: String,
}

fn wrap_key<P: PrimitiveProvider + ?Sized>(
    provider: &P,
    shared: &SymmetricKey,
    ephemeral: &PublicKeyBytes,
    oversight: &PublicKeyBytes,
) -> Result<SymmetricKey, CryptoError> {
    let mut ikm = Zeroizing::new(Vec::with_capacity(96));
    ikm.extend_from_slice(shared.as_bytes());
    ikm.extend_from_slice(ephemeral.as_bytes());
    ikm.extend_from_slice(oversight.as_bytes());
    provider.derive_key(&ikm, KdfContext::EscrowWrap)
}

fn escrow_aad(ephemeral: &PublicKeyBytes) -> Vec<u8> {
    let mut aad = ESCROW_AAD_PREFIX.to_vec();
    aad.extend_from_slice(ephemeral.as_bytes());
    aad
}

/// Encrypt `chain_key` so that only the holder of `oversight_public_key`'s
/// private half can recover it.
pub fn wrap_for_oversight<P: PrimitiveProvider + ?Sized>(
    provider: &P,
    chain_key: &SymmetricKey,
    oversight_public_key: &PublicKeyBytes,
    iv: &Iv,
) -> Result<EscrowedKey, CryptoError> {
    let ephemeral = provider.generate_keypair()?;
    let shared = provider.diffie_hellman(&ephemeral, oversight_public_key)?;
    let key = wrap_key(provider, &shared, ephemeral.public(), oversight_public_key)?;

    let (ciphertext, tag) = provider
        .aead_encrypt(&key, iv, chain_key.as_bytes(), &escrow_aad(ephemeral.public()))
        .map_err(|e| CryptoError::Escrow(e.to_string()))?;

    Ok(EscrowedKey {
        ephemeral_public_key: ephemeral.public().clone(),
        ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        auth_tag: URL_SAFE_NO_PAD.encode(tag),
    })
}

/// Recover the chain key. Requires the oversight private key; not reachable
/// from the peer-facing messenger API.
pub fn unwrap_escrowed<P: PrimitiveProvider + ?Sized>(
    provider: &P,
    oversight: &KeyPair,
    escrowed: &EscrowedKey,
    iv: &Iv,
) -> Result<SymmetricKey, CryptoError> {
    let ciphertext = URL_SAFE_NO_PAD.decode(&escrowed.ciphertext)?;
    let tag: AuthTag = URL_SAFE_NO_PAD
        .decode(&escrowed.auth_tag)?
        .try_into()
        .map_err(|_| CryptoError::Escrow(format!("escrow tag must be {TAG_LEN} bytes")))?;

    let shared = provider.diffie_hellman(oversight, &escrowed.ephemeral_public_key)?;
    let key = wrap_key(provider, &shared, &escrowed.ephemeral_public_key, oversight.public())?;

    let plaintext = provider.aead_decrypt(
        &key,
        iv,
        &ciphertext,
        &tag,
        &escrow_aad(&escrowed.ephemeral_public_key),
    )?;
    SymmetricKey::from_slice(&plaintext)
}
