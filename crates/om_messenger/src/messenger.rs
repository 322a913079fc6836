//! Messenger facade.
//!
//! Composes identity, certificate store, per-peer ratchet sessions and
//! escrow into the four user-facing operations:
//!
//!   generate_certificate(username)              → SignedCertificate
//!   receive_certificate(certificate, signature) → ()
//!   send_message(receiver, plaintext)           → EncryptedMessage
//!   receive_message(sender, message)            → plaintext
//!
//! Sessions are established lazily on first send or receive. Each successful
//! send and each receive consumes exactly one ratchet step. A receive step is
//! never rolled back: a message that fails to decrypt still advanced the
//! chain.

use std::collections::HashMap;

use om_crypto::{
    certificate::{Certificate, SignedCertificate},
    identity::Signature,
    ratchet::{Direction, PeerSession, RatchetState},
    DefaultProvider, PrimitiveProvider,
};
use om_proto::EncryptedMessage;
use tracing::{debug, info, warn};

use crate::{
    config::MessengerConfig,
    error::{MessengerError, Result},
    identity::Identity,
    sealing,
    store::{CertificateStore, InsertOutcome},
};

pub struct Messenger<P: PrimitiveProvider = DefaultProvider> {
    provider: P,
    config: MessengerConfig,
    identity: Option<Identity>,
    certificates: CertificateStore,
    sessions: HashMap<String, PeerSession>,
}

impl Messenger<DefaultProvider> {
    pub fn new(config: MessengerConfig) -> Result<Self> {
        Self::with_provider(config, DefaultProvider)
    }
}

impl<P: PrimitiveProvider> Messenger<P> {
    /// Fails with `Config` unless `config` validates.
    pub fn with_provider(config: MessengerConfig, provider: P) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            config,
            identity: None,
            certificates: CertificateStore::new(),
            sessions: HashMap::new(),
        })
    }

    /// Start from an existing identity instead of generating one.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn config(&self) -> &MessengerConfig {
        &self.config
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn certificates(&self) -> &CertificateStore {
        &self.certificates
    }

    pub fn has_session(&self, peer: &str) -> bool {
        self.sessions
            .get(peer)
            .is_some_and(PeerSession::is_established)
    }

    /// Ratchet steps taken with `peer` so far.
    pub fn session_steps(&mut self, peer: &str) -> Result<u64> {
        let session = self
            .sessions
            .get_mut(peer)
            .ok_or_else(|| MessengerError::SessionState(format!("no session with `{peer}`")))?;
        Ok(session.established_mut()?.steps())
    }

    // ── Identity & certificates ──────────────────────────────────────────

    /// Generate a fresh identity and return its self-signed certificate.
    ///
    /// Replaces any previous identity. Sessions were derived from the old
    /// private key and are dropped with it.
    pub fn generate_certificate(&mut self, username: &str) -> Result<SignedCertificate> {
        let (identity, signed) = Identity::generate(&self.provider, username)?;

        if self.identity.replace(identity).is_some() {
            warn!(
                target: "om_messenger",
                event = "identity_replaced",
                username = %username,
                dropped_sessions = self.sessions.len()
            );
            self.sessions.clear();
        }

        info!(
            target: "om_messenger",
            event = "certificate_generated",
            username = %username,
            fingerprint = %signed.certificate.fingerprint()
        );
        Ok(signed)
    }

    /// Verify `certificate` against the trusted authority and store it.
    pub fn receive_certificate(&mut self, certificate: Certificate, signature: Signature) -> Result<()> {
        let username = certificate.username.clone();
        let verified = SignedCertificate {
            certificate,
            signature,
        }
        .verify(&self.provider, &self.config.trusted_authority_public_key)
        .map_err(|e| {
            warn!(
                target: "om_messenger",
                event = "certificate_rejected",
                username = %username,
                reason = %e
            );
            MessengerError::CertificateVerification(e.to_string())
        })?;

        match self.certificates.insert(&verified)? {
            InsertOutcome::Added => info!(
                target: "om_messenger",
                event = "certificate_received",
                username = %username,
                fingerprint = %verified.certificate().fingerprint()
            ),
            InsertOutcome::Unchanged => debug!(
                target: "om_messenger",
                event = "certificate_unchanged",
                username = %username
            ),
        }
        Ok(())
    }

    /// Drop a peer's certificate and session. Required before a changed key
    /// for the same username can be accepted.
    pub fn forget_peer(&mut self, username: &str) -> bool {
        let had_session = self.sessions.remove(username).is_some();
        let had_cert = self.certificates.remove(username).is_some();
        if had_cert || had_session {
            info!(target: "om_messenger", event = "peer_forgotten", username = %username);
        }
        had_cert
    }

    // ── Messaging ────────────────────────────────────────────────────────

    /// The step is committed only once the message is sealed, so a failed
    /// send leaves the chain where it was.
    pub fn send_message(&mut self, receiver: &str, plaintext: &str) -> Result<EncryptedMessage> {
        let mut next = self.session(receiver)?.clone();
        let step = next.step(&self.provider, Direction::Sending)?;
        let message = sealing::seal(
            &self.provider,
            &step,
            plaintext.as_bytes(),
            &self.config.oversight_public_key,
            self.config.padding,
        )?;
        *self.session(receiver)? = next;

        info!(
            target: "om_messenger",
            event = "send_message_ok",
            peer = %receiver,
            counter = step.counter,
            ciphertext_len = message.ciphertext.len()
        );
        Ok(message)
    }

    pub fn receive_message(&mut self, sender: &str, message: &EncryptedMessage) -> Result<String> {
        if !self.certificates.contains(sender) {
            return Err(MessengerError::UnknownPeer(sender.to_string()));
        }
        // Reject undecodable messages before they cost a ratchet step.
        let parsed = sealing::parse(message)?;

        let mut next = self.session(sender)?.clone();
        let step = next.step(&self.provider, Direction::Receiving)?;
        // Committed before decryption: a failed receive still costs the step.
        *self.session(sender)? = next;
        if step.counter != message.header.counter {
            warn!(
                target: "om_messenger",
                event = "counter_mismatch",
                peer = %sender,
                expected = step.counter,
                received = message.header.counter
            );
        }

        match sealing::open(&self.provider, &step.chain_key, &parsed) {
            Ok(plaintext) => {
                info!(
                    target: "om_messenger",
                    event = "receive_message_ok",
                    peer = %sender,
                    counter = step.counter
                );
                Ok(plaintext)
            }
            Err(e) => {
                warn!(
                    target: "om_messenger",
                    event = "receive_message_failed",
                    peer = %sender,
                    counter = step.counter,
                    error = %e
                );
                Err(e)
            }
        }
    }

    /// The session with `peer`, established on first use.
    fn session(&mut self, peer: &str) -> Result<&mut RatchetState> {
        let peer_key = self
            .certificates
            .get(peer)
            .ok_or_else(|| MessengerError::UnknownPeer(peer.to_string()))?;
        let identity = self.identity.as_ref().ok_or(MessengerError::MissingIdentity)?;

        let session = self.sessions.entry(peer.to_string()).or_default();
        let newly_established = !session.is_established();
        let state = session.ensure_established(&self.provider, identity.keypair(), peer_key)?;
        if newly_established {
            info!(
                target: "om_messenger",
                event = "session_established",
                peer = %peer,
                local = %identity.username()
            );
        }

        Ok(state)
    }
}
