//! Certificate store: username → verified public key.
//!
//! Only `VerifiedCertificate`s can be inserted, so the store never holds a
//! key that did not pass signature verification.
//!
//! Key-change policy: once a username is bound to a key, a certificate for
//! the same username with a different key is refused. The caller must
//! `remove` the peer explicitly (and drop any session with it) before a
//! re-verified certificate is accepted. Re-receiving the same key is a no-op.

use std::collections::HashMap;

use om_crypto::{certificate::VerifiedCertificate, identity::PublicKeyBytes};

use crate::error::{MessengerError, Result};

#[derive(Debug, Default)]
pub struct CertificateStore {
    entries: HashMap<String, PublicKeyBytes>,
}

/// What `insert` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Added,
    Unchanged,
}

impl CertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cert: &VerifiedCertificate) -> Result<InsertOutcome> {
        match self.entries.get(cert.username()) {
            Some(existing) if existing == cert.public_key() => Ok(InsertOutcome::Unchanged),
            Some(_) => Err(MessengerError::KeyChanged {
                username: cert.username().to_string(),
            }),
            None => {
                self.entries
                    .insert(cert.username().to_string(), cert.public_key().clone());
                Ok(InsertOutcome::Added)
            }
        }
    }

    pub fn get(&self, username: &str) -> Option<&PublicKeyBytes> {
        self.entries.get(username)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.entries.contains_key(username)
    }

    pub fn remove(&mut self, username: &str) -> Option<PublicKeyBytes> {
        self.entries.remove(username)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
