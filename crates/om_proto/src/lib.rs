//! om_proto — Wire types and serialisation for Oversight Messenger
//!
//! On-wire types are serialised to JSON and carry a protocol version so the
//! format can change without silently misparsing old messages.
//!
//! # Modules
//! - `header`  — Message header (IV, tag, counter, escrowed key)
//! - `message` — Encrypted message (header + ciphertext) and its text form
//! - `codec`   — Padding and base64url field decoding

pub mod codec;
pub mod header;
pub mod message;

/// Current wire format version.
pub const PROTOCOL_VERSION: u8 = 1;

pub use codec::{CodecError, PaddingMode};
pub use header::MessageHeader;
pub use message::EncryptedMessage;
