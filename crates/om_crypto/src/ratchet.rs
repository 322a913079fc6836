//! Session ratchet
//!
//! One root key per peer, advanced by a one-way KDF on every message in
//! either direction:
//!
//!   establish:  RK_0 = KDF(DH(IK_local, IK_peer), RootInit)
//!   step n:     RK_n = KDF(RK_{n-1}, RootAdvance)     — RK_{n-1} zeroized
//!               CK_n = KDF(RK_n, ChainKey)
//!
//! CK_n is stored in the sending or receiving slot according to direction
//! and returned to the caller, who derives the message key from it.
//!
//! This is a single shared chain, not a Double Ratchet: both parties must
//! step the same number of times in the same order. There is no skipped-key
//! cache; a message arriving after an unmatched step cannot be decrypted.

use crate::{
    error::CryptoError,
    identity::{KeyPair, PublicKeyBytes},
    kdf::{KdfContext, SymmetricKey},
    provider::PrimitiveProvider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sending,
    Receiving,
}

/// Output of one ratchet step.
#[derive(Debug)]
pub struct StepOutput {
    /// 1-based index of this step in the shared chain.
    pub counter: u64,
    pub chain_key: SymmetricKey,
}

/// Established ratchet state for one peer.
#[derive(Debug, Clone)]
pub struct RatchetState {
    root_key: SymmetricKey,
    sending_chain_key: Option<SymmetricKey>,
    receiving_chain_key: Option<SymmetricKey>,
    steps: u64,
}

impl RatchetState {
    /// Derive the initial root key from DH(local, peer).
    pub fn establish<P: PrimitiveProvider + ?Sized>(
        provider: &P,
        local: &KeyPair,
        peer: &PublicKeyBytes,
    ) -> Result<Self, CryptoError> {
        let shared = provider.diffie_hellman(local, peer)?;
        let root_key = provider.derive_key(shared.as_bytes(), KdfContext::RootInit)?;
        Ok(Self {
            root_key,
            sending_chain_key: None,
            receiving_chain_key: None,
            steps: 0,
        })
    }

    /// Advance the root key once and derive the chain key for `direction`.
    pub fn step<P: PrimitiveProvider + ?Sized>(
        &mut self,
        provider: &P,
        direction: Direction,
    ) -> Result<StepOutput, CryptoError> {
        let new_root = provider.derive_key(self.root_key.as_bytes(), KdfContext::RootAdvance)?;
        let chain_key = provider.derive_key(new_root.as_bytes(), KdfContext::ChainKey)?;

        // Old root is zeroized on drop.
        drop(std::mem::replace(&mut self.root_key, new_root));

        let slot = match direction {
            Direction::Sending => &mut self.sending_chain_key,
            Direction::Receiving => &mut self.receiving_chain_key,
        };
        *slot = Some(chain_key.clone());
        self.steps += 1;

        Ok(StepOutput {
            counter: self.steps,
            chain_key,
        })
    }

    /// Number of steps taken so far (sends + receives).
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn sending_chain_key(&self) -> Option<&SymmetricKey> {
        self.sending_chain_key.as_ref()
    }

    pub fn receiving_chain_key(&self) -> Option<&SymmetricKey> {
        self.receiving_chain_key.as_ref()
    }
}

/// Per-peer session slot.
#[derive(Debug, Default)]
pub enum PeerSession {
    #[default]
    Absent,
    Established(RatchetState),
}

impl PeerSession {
    pub fn is_established(&self) -> bool {
        matches!(self, PeerSession::Established(_))
    }

    /// Establish on first use; an established session is returned untouched.
    pub fn ensure_established<P: PrimitiveProvider + ?Sized>(
        &mut self,
        provider: &P,
        local: &KeyPair,
        peer: &PublicKeyBytes,
    ) -> Result<&mut RatchetState, CryptoError> {
        if let PeerSession::Absent = self {
            *self = PeerSession::Established(RatchetState::establish(provider, local, peer)?);
        }
        self.established_mut()
    }

    pub fn established_mut(&mut self) -> Result<&mut RatchetState, CryptoError> {
        match self {
            PeerSession::Established(state) => Ok(state),
            PeerSession::Absent => Err(CryptoError::SessionNotEstablished),
        }
    }
}
