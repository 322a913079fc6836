//! Authenticated Encryption with Associated Data
//!
//! AES-256-GCM with a 128-bit IV and a detached 128-bit tag.
//! Key size: 32 bytes.  IV: 16 bytes (random per message).  Tag: 16 bytes.
//!
//! The IV and tag travel in the message header, so the ciphertext is the
//! bare encrypted body with no prefix or suffix.

use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray, AeadInPlace, KeyInit},
    aes::Aes256,
    AesGcm,
};
use zeroize::Zeroizing;

use crate::{error::CryptoError, kdf::SymmetricKey};

pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;

pub type Iv = [u8; IV_LEN];
pub type AuthTag = [u8; TAG_LEN];

/// AES-256-GCM instantiated with a 16-byte nonce.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Encrypt `plaintext`; returns `(ciphertext, tag)`.
/// `aad` — additional associated data (authenticated but not encrypted).
pub fn encrypt(
    key: &SymmetricKey,
    iv: &Iv,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, AuthTag), CryptoError> {
    let cipher = Aes256Gcm16::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::AeadEncrypt)?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(iv), aad, &mut buffer)
        .map_err(|_| CryptoError::AeadEncrypt)?;

    let mut tag_out = [0u8; TAG_LEN];
    tag_out.copy_from_slice(&tag);
    Ok((buffer, tag_out))
}

/// Verify `tag` and decrypt. Any mismatch in key, IV, AAD, ciphertext or tag
/// yields `CryptoError::AeadDecrypt`.
pub fn decrypt(
    key: &SymmetricKey,
    iv: &Iv,
    ciphertext: &[u8],
    tag: &AuthTag,
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cipher = Aes256Gcm16::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::AeadDecrypt)?;

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(iv),
            aad,
            buffer.as_mut_slice(),
            GenericArray::from_slice(tag),
        )
        .map_err(|_| CryptoError::AeadDecrypt)?;

    Ok(buffer)
}
