use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use om_crypto::{
    aead::{AuthTag, Iv},
    certificate::Certificate,
    escrow::unwrap_escrowed,
    identity::{KeyPair, PublicKeyBytes, Signature},
    kdf::{KdfContext, SymmetricKey},
    ratchet::{Direction, RatchetState},
    CryptoError, DefaultProvider, PrimitiveProvider,
};
use om_messenger::{
    CertificateAuthority, Identity, Messenger, MessengerConfig, MessengerError, Oversight,
    SharedMessenger,
};
use proptest::prelude::*;
use zeroize::Zeroizing;
use om_proto::{
    codec::{decode_bytes, decode_fixed, encode_bytes},
    EncryptedMessage, PaddingMode,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("om_messenger=debug")
        .try_init();
}

struct World {
    authority: CertificateAuthority,
    oversight: Oversight,
}

impl World {
    fn new() -> Self {
        init_tracing();
        Self {
            authority: CertificateAuthority::generate().unwrap(),
            oversight: Oversight::generate().unwrap(),
        }
    }

    fn config(&self) -> MessengerConfig {
        MessengerConfig::new(
            self.oversight.public_key().clone(),
            self.authority.public_key().clone(),
        )
    }

    /// A messenger with a fresh identity, plus the authority's signature on
    /// its certificate.
    fn user(&self, name: &str) -> (Messenger, Certificate, Signature) {
        let mut messenger = Messenger::new(self.config()).unwrap();
        let self_signed = messenger.generate_certificate(name).unwrap();
        let signature = self.authority.sign(&self_signed.certificate).unwrap();
        (messenger, self_signed.certificate, signature)
    }

    /// Alice and Bob with each other's authority-signed certificates.
    fn pair(&self) -> (Messenger, Messenger) {
        let (mut alice, alice_cert, alice_sig) = self.user("alice");
        let (mut bob, bob_cert, bob_sig) = self.user("bob");
        bob.receive_certificate(alice_cert, alice_sig).unwrap();
        alice.receive_certificate(bob_cert, bob_sig).unwrap();
        (alice, bob)
    }
}

fn flip_ciphertext_bit(msg: &EncryptedMessage, byte: usize, bit: u8) -> EncryptedMessage {
    let mut raw = decode_bytes("ciphertext", &msg.ciphertext).unwrap();
    raw[byte] ^= 1 << bit;
    let mut out = msg.clone();
    out.ciphertext = encode_bytes(&raw);
    out
}

fn flip_tag_bit(msg: &EncryptedMessage, byte: usize, bit: u8) -> EncryptedMessage {
    let mut tag: [u8; 16] = decode_fixed("auth_tag", &msg.header.auth_tag).unwrap();
    tag[byte] ^= 1 << bit;
    let mut out = msg.clone();
    out.header.auth_tag = encode_bytes(&tag);
    out
}

#[test]
fn alice_and_bob_scenario() {
    let world = World::new();
    let (mut alice, mut bob) = world.pair();

    let first = alice.send_message("bob", "Hello, Bob!").unwrap();
    assert_eq!(bob.receive_message("alice", &first).unwrap(), "Hello, Bob!");

    let second = alice.send_message("bob", "Second message").unwrap();
    assert_ne!(first.ciphertext, second.ciphertext);
    assert_ne!(first.header.iv, second.header.iv);
    assert_eq!(bob.receive_message("alice", &second).unwrap(), "Second message");
}

#[test]
fn roundtrip_various_plaintexts() {
    let world = World::new();
    let (mut alice, mut bob) = world.pair();
    let long = "x".repeat(10_000);
    for m in ["", "a", "héllo wörld ✓", "line\nbreaks\tand tabs", long.as_str()] {
        let msg = alice.send_message("bob", m).unwrap();
        assert_eq!(bob.receive_message("alice", &msg).unwrap(), m);
    }
}

#[test]
fn roundtrip_both_directions_in_lockstep() {
    let world = World::new();
    let (mut alice, mut bob) = world.pair();

    let m1 = alice.send_message("bob", "ping").unwrap();
    assert_eq!(bob.receive_message("alice", &m1).unwrap(), "ping");
    let m2 = bob.send_message("alice", "pong").unwrap();
    assert_eq!(alice.receive_message("bob", &m2).unwrap(), "pong");
    assert_eq!(alice.session_steps("bob").unwrap(), 2);
    assert_eq!(bob.session_steps("alice").unwrap(), 2);
}

#[test]
fn roundtrip_through_json_text() {
    let world = World::new();
    let (mut alice, mut bob) = world.pair();
    let msg = alice.send_message("bob", "over the wire").unwrap();
    let text = msg.to_json().unwrap();
    let parsed = EncryptedMessage::from_json(&text).unwrap();
    assert_eq!(bob.receive_message("alice", &parsed).unwrap(), "over the wire");
}

#[test]
fn ciphertext_bit_flip_is_detected() {
    let world = World::new();
    for (byte, bit) in [(0, 0), (3, 7), (100, 4)] {
        let (mut alice, mut bob) = world.pair();
        let msg = alice.send_message("bob", "tamper me").unwrap();
        let err = bob
            .receive_message("alice", &flip_ciphertext_bit(&msg, byte, bit))
            .unwrap_err();
        assert!(matches!(err, MessengerError::Decryption), "got {err:?}");
    }
}

#[test]
fn auth_tag_bit_flip_is_detected() {
    let world = World::new();
    for (byte, bit) in [(0, 0), (15, 7), (8, 3)] {
        let (mut alice, mut bob) = world.pair();
        let msg = alice.send_message("bob", "tamper me").unwrap();
        let err = bob
            .receive_message("alice", &flip_tag_bit(&msg, byte, bit))
            .unwrap_err();
        assert!(matches!(err, MessengerError::Decryption), "got {err:?}");
    }
}

#[test]
fn tampered_counter_is_detected() {
    let world = World::new();
    let (mut alice, mut bob) = world.pair();
    let mut msg = alice.send_message("bob", "counted").unwrap();
    msg.header.counter += 1;
    assert!(matches!(
        bob.receive_message("alice", &msg),
        Err(MessengerError::Decryption)
    ));
}

#[test]
fn failed_decryption_still_consumes_a_step() {
    let world = World::new();
    let (mut alice, mut bob) = world.pair();
    let m1 = alice.send_message("bob", "one").unwrap();
    let m2 = alice.send_message("bob", "two").unwrap();

    assert!(bob.receive_message("alice", &flip_tag_bit(&m1, 0, 0)).is_err());
    // No rewind: the retry of m1 is now one step behind and fails, while m2
    // lines up with Bob's next step.
    assert_eq!(bob.session_steps("alice").unwrap(), 1);
    assert_eq!(bob.receive_message("alice", &m2).unwrap(), "two");
}

#[test]
fn unmatched_step_breaks_decryption() {
    let world = World::new();
    let (mut alice, mut bob) = world.pair();

    // Two sends, Bob only sees the second: his first step does not match.
    let _lost = alice.send_message("bob", "lost").unwrap();
    let second = alice.send_message("bob", "second").unwrap();
    assert!(matches!(
        bob.receive_message("alice", &second),
        Err(MessengerError::Decryption)
    ));
}

#[test]
fn unsigned_certificate_is_rejected_and_store_unchanged() {
    let world = World::new();
    let (mut bob, _, _) = world.user("bob");
    let mut mallory = Messenger::new(world.config()).unwrap();
    let self_signed = mallory.generate_certificate("alice").unwrap();

    let err = bob
        .receive_certificate(self_signed.certificate, self_signed.signature)
        .unwrap_err();
    assert!(matches!(err, MessengerError::CertificateVerification(_)));
    assert!(bob.certificates().is_empty());
}

#[test]
fn certificate_signed_by_other_authority_is_rejected() {
    let world = World::new();
    let rogue = CertificateAuthority::generate().unwrap();
    let (mut bob, _, _) = world.user("bob");
    let mut eve = Messenger::new(world.config()).unwrap();
    let cert = eve.generate_certificate("eve").unwrap().certificate;
    let sig = rogue.sign(&cert).unwrap();

    assert!(matches!(
        bob.receive_certificate(cert, sig),
        Err(MessengerError::CertificateVerification(_))
    ));
    assert!(!bob.certificates().contains("eve"));
}

#[test]
fn garbage_signature_is_rejected() {
    let world = World::new();
    let (mut bob, _, _) = world.user("bob");
    let (_, alice_cert, _) = world.user("alice");
    let err = bob
        .receive_certificate(alice_cert, Signature::from_bytes(vec![0u8; 10]))
        .unwrap_err();
    assert!(matches!(err, MessengerError::CertificateVerification(_)));
    assert!(bob.certificates().is_empty());
}

#[test]
fn changed_key_requires_forget() {
    let world = World::new();
    let (mut bob, _, _) = world.user("bob");
    let (_, old_cert, old_sig) = world.user("alice");
    let (_, new_cert, new_sig) = world.user("alice");

    bob.receive_certificate(old_cert.clone(), old_sig).unwrap();
    assert!(matches!(
        bob.receive_certificate(new_cert.clone(), new_sig.clone()),
        Err(MessengerError::KeyChanged { .. })
    ));
    assert_eq!(bob.certificates().get("alice"), Some(&old_cert.public_key));

    assert!(bob.forget_peer("alice"));
    bob.receive_certificate(new_cert.clone(), new_sig).unwrap();
    assert_eq!(bob.certificates().get("alice"), Some(&new_cert.public_key));
}

#[test]
fn unknown_peer_on_send_and_receive() {
    let world = World::new();
    let (mut alice, mut bob) = world.pair();
    assert!(matches!(
        alice.send_message("carol", "hi"),
        Err(MessengerError::UnknownPeer(ref p)) if p == "carol"
    ));
    let msg = alice.send_message("bob", "hi").unwrap();
    assert!(matches!(
        bob.receive_message("carol", &msg),
        Err(MessengerError::UnknownPeer(_))
    ));
    assert!(!bob.has_session("carol"));
}

#[test]
fn send_without_identity_fails() {
    let world = World::new();
    let (_, bob_cert, bob_sig) = world.user("bob");
    let mut nobody = Messenger::new(world.config()).unwrap();
    nobody.receive_certificate(bob_cert, bob_sig).unwrap();
    assert!(matches!(
        nobody.send_message("bob", "hi"),
        Err(MessengerError::MissingIdentity)
    ));
}

#[test]
fn session_queries_before_establishment() {
    let world = World::new();
    let (mut alice, _) = world.pair();
    assert!(!alice.has_session("bob"));
    assert!(matches!(
        alice.session_steps("bob"),
        Err(MessengerError::SessionState(_))
    ));
    alice.send_message("bob", "now").unwrap();
    assert!(alice.has_session("bob"));
}

#[test]
fn regenerating_identity_drops_sessions() {
    let world = World::new();
    let (mut alice, _) = world.pair();
    alice.send_message("bob", "before").unwrap();
    assert!(alice.has_session("bob"));
    alice.generate_certificate("alice").unwrap();
    assert!(!alice.has_session("bob"));
}

#[test]
fn malformed_header_does_not_consume_a_step() {
    let world = World::new();
    let (mut alice, mut bob) = world.pair();
    let msg = alice.send_message("bob", "intact").unwrap();

    let mut broken = msg.clone();
    broken.header.iv = encode_bytes(&[0u8; 12]);
    assert!(matches!(
        bob.receive_message("alice", &broken),
        Err(MessengerError::MalformedMessage(_))
    ));

    let mut future = msg.clone();
    future.header.version = 99;
    assert!(matches!(
        bob.receive_message("alice", &future),
        Err(MessengerError::UnsupportedVersion(99))
    ));

    assert_eq!(bob.receive_message("alice", &msg).unwrap(), "intact");
}

#[test]
fn successive_sends_use_distinct_chain_keys() {
    let world = World::new();
    let (mut alice, _) = world.pair();
    let mut keys = Vec::new();
    for i in 0..10 {
        let msg = alice.send_message("bob", "same text").unwrap();
        assert_eq!(msg.header.counter, i + 1);
        let ck = world.oversight.recover_chain_key(&msg.header).unwrap();
        assert!(!keys.contains(&ck), "chain key repeated at step {}", i + 1);
        keys.push(ck);
    }
}

#[test]
fn oversight_recovers_the_chain_key_used() {
    let world = World::new();
    let (mut alice, _) = world.pair();
    let msg = alice.send_message("bob", "for the record").unwrap();

    // Recompute Alice's first chain key independently of the messenger.
    let p = DefaultProvider;
    let alice_id = alice.identity().unwrap();
    let bob_key = alice.certificates().get("bob").unwrap().clone();
    let mut state = RatchetState::establish(&p, alice_id.keypair(), &bob_key).unwrap();
    let expected = state.step(&p, Direction::Sending).unwrap().chain_key;

    assert_eq!(world.oversight.recover_chain_key(&msg.header).unwrap(), expected);
    assert_eq!(world.oversight.decrypt_message(&msg).unwrap(), "for the record");
}

#[test]
fn peer_cannot_unwrap_escrowed_key() {
    let world = World::new();
    let (mut alice, bob) = world.pair();
    let msg = alice.send_message("bob", "private").unwrap();
    let iv = msg.header.iv_bytes().unwrap();

    let bob_keypair = bob.identity().unwrap().keypair();
    assert!(unwrap_escrowed(&DefaultProvider, bob_keypair, &msg.header.gov_encrypted_key, &iv).is_err());

    let other = Oversight::generate().unwrap();
    assert!(other.decrypt_message(&msg).is_err());
}

#[test]
fn escrowed_key_swapped_between_messages_fails() {
    let world = World::new();
    let (mut alice, _) = world.pair();
    let m1 = alice.send_message("bob", "one").unwrap();
    let m2 = alice.send_message("bob", "two").unwrap();

    let mut swapped = m2.clone();
    swapped.header.gov_encrypted_key = m1.header.gov_encrypted_key.clone();
    assert!(world.oversight.decrypt_message(&swapped).is_err());
}

#[test]
fn padding_hides_length() {
    let world = World::new();
    let (mut alice, mut bob) = world.pair();
    let short = alice.send_message("bob", "hi").unwrap();
    let longer = alice.send_message("bob", &"y".repeat(200)).unwrap();
    assert_eq!(
        short.ciphertext_bytes().unwrap().len(),
        longer.ciphertext_bytes().unwrap().len()
    );
    bob.receive_message("alice", &short).unwrap();
    assert_eq!(bob.receive_message("alice", &longer).unwrap(), "y".repeat(200));
}

#[test]
fn no_padding_mode_roundtrips() {
    let world = World::new();
    let config = world.config().with_padding(PaddingMode::None);
    let mut alice = Messenger::new(config.clone()).unwrap();
    let mut bob = Messenger::new(config).unwrap();
    let a = alice.generate_certificate("alice").unwrap().certificate;
    let b = bob.generate_certificate("bob").unwrap().certificate;
    let a_sig = world.authority.sign(&a).unwrap();
    let b_sig = world.authority.sign(&b).unwrap();
    alice.receive_certificate(b, b_sig).unwrap();
    bob.receive_certificate(a, a_sig).unwrap();

    let msg = alice.send_message("bob", "hi").unwrap();
    assert_eq!(msg.ciphertext_bytes().unwrap().len(), 4 + 2);
    assert_eq!(bob.receive_message("alice", &msg).unwrap(), "hi");
}

#[test]
fn concurrent_sends_get_distinct_steps() {
    let world = World::new();
    let (alice, mut bob) = world.pair();
    let alice = SharedMessenger::new(alice);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let alice = alice.clone();
            std::thread::spawn(move || alice.send_message("bob", &format!("msg {i}")).unwrap())
        })
        .collect();
    let mut messages: Vec<EncryptedMessage> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    messages.sort_by_key(|m| m.header.counter);
    let counters: Vec<u64> = messages.iter().map(|m| m.header.counter).collect();
    assert_eq!(counters, (1..=8).collect::<Vec<_>>());

    // Delivered in counter order, every message decrypts.
    for msg in &messages {
        assert!(bob.receive_message("alice", msg).unwrap().starts_with("msg "));
    }
    assert_eq!(alice.with(|m| m.session_steps("bob").unwrap()), 8);
}

// ── Construction ─────────────────────────────────────────────────────────────

#[test]
fn messenger_refuses_small_order_oversight_key() {
    let world = World::new();
    let mut identity_point = [0u8; 32];
    identity_point[0] = 1;
    let config = MessengerConfig::new(
        PublicKeyBytes::from_bytes(identity_point),
        world.authority.public_key().clone(),
    );
    assert!(matches!(Messenger::new(config), Err(MessengerError::Config(_))));
}

#[test]
fn parties_restored_from_stored_keys_interoperate() {
    init_tracing();
    let p = DefaultProvider;
    let (authority_seed, oversight_seed, bob_seed) = ([1u8; 32], [2u8; 32], [3u8; 32]);

    let authority = CertificateAuthority::from_keypair(p, KeyPair::from_bytes(&authority_seed).unwrap());
    let oversight = Oversight::from_keypair(p, KeyPair::from_bytes(&oversight_seed).unwrap());
    assert_eq!(
        authority.public_key(),
        KeyPair::from_bytes(&authority_seed).unwrap().public()
    );
    let config = MessengerConfig::new(oversight.public_key().clone(), authority.public_key().clone());

    let restore_bob = || {
        Messenger::new(config.clone())
            .unwrap()
            .with_identity(Identity::new("bob", KeyPair::from_bytes(&bob_seed).unwrap()))
    };
    let mut alice = Messenger::new(config.clone())
        .unwrap()
        .with_identity(Identity::new("alice", KeyPair::generate()));
    let alice_cert = alice.identity().unwrap().certificate();
    let bob_cert = restore_bob().identity().unwrap().certificate();

    let alice_sig = authority.sign(&alice_cert).unwrap();
    let bob_sig = authority.sign(&bob_cert).unwrap();
    alice.receive_certificate(bob_cert, bob_sig).unwrap();
    assert_eq!(alice.certificates().usernames().collect::<Vec<_>>(), ["bob"]);

    let msg = alice.send_message("bob", "restored").unwrap();

    // A fresh messenger built from the same stored key reads it.
    let mut bob = restore_bob();
    bob.receive_certificate(alice_cert, alice_sig).unwrap();
    assert_eq!(bob.certificates().usernames().collect::<Vec<_>>(), ["alice"]);
    assert_eq!(bob.receive_message("alice", &msg).unwrap(), "restored");
    assert_eq!(oversight.decrypt_message(&msg).unwrap(), "restored");
}

// ── Failed sends ─────────────────────────────────────────────────────────────

/// Default primitives, with encryption that can be switched off.
#[derive(Clone, Default)]
struct SwitchableProvider {
    encryption_down: Arc<AtomicBool>,
}

impl PrimitiveProvider for SwitchableProvider {
    fn generate_keypair(&self) -> Result<KeyPair, CryptoError> {
        DefaultProvider.generate_keypair()
    }

    fn sign(&self, key: &KeyPair, msg: &[u8]) -> Signature {
        DefaultProvider.sign(key, msg)
    }

    fn verify(&self, public: &PublicKeyBytes, msg: &[u8], sig: &Signature) -> Result<(), CryptoError> {
        DefaultProvider.verify(public, msg, sig)
    }

    fn diffie_hellman(&self, local: &KeyPair, peer: &PublicKeyBytes) -> Result<SymmetricKey, CryptoError> {
        DefaultProvider.diffie_hellman(local, peer)
    }

    fn derive_key(&self, input: &[u8], context: KdfContext) -> Result<SymmetricKey, CryptoError> {
        DefaultProvider.derive_key(input, context)
    }

    fn random_bytes(&self, out: &mut [u8]) {
        DefaultProvider.random_bytes(out)
    }

    fn aead_encrypt(
        &self,
        key: &SymmetricKey,
        iv: &Iv,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<(Vec<u8>, AuthTag), CryptoError> {
        if self.encryption_down.load(Ordering::SeqCst) {
            return Err(CryptoError::AeadEncrypt);
        }
        DefaultProvider.aead_encrypt(key, iv, plaintext, aad)
    }

    fn aead_decrypt(
        &self,
        key: &SymmetricKey,
        iv: &Iv,
        ciphertext: &[u8],
        tag: &AuthTag,
        aad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        DefaultProvider.aead_decrypt(key, iv, ciphertext, tag, aad)
    }
}

#[test]
fn failed_send_does_not_consume_a_step() {
    let world = World::new();
    let provider = SwitchableProvider::default();
    let mut alice = Messenger::with_provider(world.config(), provider.clone()).unwrap();
    let alice_cert = alice.generate_certificate("alice").unwrap().certificate;
    let alice_sig = world.authority.sign(&alice_cert).unwrap();
    let (mut bob, bob_cert, bob_sig) = world.user("bob");
    alice.receive_certificate(bob_cert, bob_sig).unwrap();
    bob.receive_certificate(alice_cert, alice_sig).unwrap();

    let first = alice.send_message("bob", "first").unwrap();

    provider.encryption_down.store(true, Ordering::SeqCst);
    for _ in 0..3 {
        assert!(matches!(
            alice.send_message("bob", "never sent"),
            Err(MessengerError::Crypto(CryptoError::AeadEncrypt))
        ));
    }
    assert_eq!(alice.session_steps("bob").unwrap(), 1);

    provider.encryption_down.store(false, Ordering::SeqCst);
    let second = alice.send_message("bob", "second").unwrap();
    assert_eq!(second.header.counter, 2);
    assert_eq!(bob.receive_message("alice", &first).unwrap(), "first");
    assert_eq!(bob.receive_message("alice", &second).unwrap(), "second");
}

// ── Properties ───────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any string survives send then receive.
    #[test]
    fn any_plaintext_roundtrips(plaintext in any::<String>()) {
        let world = World::new();
        let (mut alice, mut bob) = world.pair();
        let msg = alice.send_message("bob", &plaintext).unwrap();
        prop_assert_eq!(bob.receive_message("alice", &msg).unwrap(), plaintext);
    }

    /// Flipping any single bit of the ciphertext is detected.
    #[test]
    fn any_ciphertext_bit_flip_is_detected(byte in any::<prop::sample::Index>(), bit in 0u8..8) {
        let world = World::new();
        let (mut alice, mut bob) = world.pair();
        let msg = alice.send_message("bob", "tamper me").unwrap();
        let len = msg.ciphertext_bytes().unwrap().len();
        let err = bob
            .receive_message("alice", &flip_ciphertext_bit(&msg, byte.index(len), bit))
            .unwrap_err();
        prop_assert!(matches!(err, MessengerError::Decryption), "got {:?}", err);
    }

    /// Flipping any single bit of the authentication tag is detected.
    #[test]
    fn any_auth_tag_bit_flip_is_detected(byte in 0usize..16, bit in 0u8..8) {
        let world = World::new();
        let (mut alice, mut bob) = world.pair();
        let msg = alice.send_message("bob", "tamper me").unwrap();
        let err = bob
            .receive_message("alice", &flip_tag_bit(&msg, byte, bit))
            .unwrap_err();
        prop_assert!(matches!(err, MessengerError::Decryption), "got {:?}", err);
    }
}
