//! om_crypto — Oversight Messenger cryptographic core
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates and are
//!   reached through the `PrimitiveProvider` trait.
//! - Zeroize all secret material on drop.
//! - Every KDF call names its purpose (`KdfContext`); no label is reused.
//!
//! # Module layout
//! - `provider`    — Primitive Provider trait + default implementation
//! - `identity`    — Ed25519 key pairs (signing + X25519 DH), public keys, signatures
//! - `certificate` — username ↔ public key certificates, canonical signing form
//! - `ratchet`     — single-chain session ratchet and the per-peer session slot
//! - `escrow`      — chain-key wrapping for the oversight party
//! - `aead`        — AES-256-GCM with 16-byte IV and detached tag
//! - `kdf`         — HKDF-SHA256 with per-purpose contexts
//! - `error`       — unified error type

pub mod aead;
pub mod certificate;
pub mod error;
pub mod escrow;
pub mod identity;
pub mod kdf;
pub mod provider;
pub mod ratchet;

pub use error::CryptoError;
pub use provider::{DefaultProvider, PrimitiveProvider};
