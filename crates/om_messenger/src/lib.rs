//! om_messenger — Oversight Messenger trust and session layer
//!
//! # Module layout
//! - `messenger` — facade: certificates in, encrypted messages in/out
//! - `shared`    — `Arc<Mutex<_>>` handle for multi-threaded callers
//! - `identity`  — explicit local identity (username + key pair)
//! - `store`     — verified peer certificates, key-change refusal
//! - `authority` — certificate authority (signs user certificates)
//! - `oversight` — escrow holder; recovers chain keys and plaintext
//! - `config`    — oversight / authority keys and padding mode
//! - `sealing`   — body encryption from a chain key
//! - `error`     — facade error taxonomy

pub mod authority;
pub mod config;
pub mod error;
pub mod identity;
pub mod messenger;
pub mod oversight;
mod sealing;
pub mod shared;
pub mod store;

pub use authority::CertificateAuthority;
pub use config::MessengerConfig;
pub use error::{MessengerError, Result};
pub use identity::Identity;
pub use messenger::Messenger;
pub use oversight::Oversight;
pub use shared::SharedMessenger;
