//! Thread-safe handle to a messenger.
//!
//! A ratchet step is a read-modify-write of the peer session; two
//! concurrent sends must never consume the same root key. Every operation
//! here holds the lock for its full duration, so steps are serialised and
//! each message gets a distinct counter in call order.

use std::sync::Arc;

use om_crypto::{
    certificate::{Certificate, SignedCertificate},
    identity::Signature,
    DefaultProvider, PrimitiveProvider,
};
use om_proto::EncryptedMessage;
use parking_lot::Mutex;

use crate::{error::Result, messenger::Messenger};

pub struct SharedMessenger<P: PrimitiveProvider = DefaultProvider> {
    inner: Arc<Mutex<Messenger<P>>>,
}

impl<P: PrimitiveProvider> Clone for SharedMessenger<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: PrimitiveProvider> SharedMessenger<P> {
    pub fn new(messenger: Messenger<P>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(messenger)),
        }
    }

    pub fn generate_certificate(&self, username: &str) -> Result<SignedCertificate> {
        self.inner.lock().generate_certificate(username)
    }

    pub fn receive_certificate(&self, certificate: Certificate, signature: Signature) -> Result<()> {
        self.inner.lock().receive_certificate(certificate, signature)
    }

    pub fn send_message(&self, receiver: &str, plaintext: &str) -> Result<EncryptedMessage> {
        self.inner.lock().send_message(receiver, plaintext)
    }

    pub fn receive_message(&self, sender: &str, message: &EncryptedMessage) -> Result<String> {
        self.inner.lock().receive_message(sender, message)
    }

    /// Run `f` with exclusive access to the messenger.
    pub fn with<R>(&self, f: impl FnOnce(&mut Messenger<P>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
