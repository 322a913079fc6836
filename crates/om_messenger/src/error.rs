use om_crypto::CryptoError;
use om_proto::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("Certificate verification failed: {0}")]
    CertificateVerification(String),

    #[error("Trusted key for `{username}` changed; forget the peer and re-verify before accepting")]
    KeyChanged { username: String },

    #[error("No certificate on file for `{0}`")]
    UnknownPeer(String),

    #[error("Message decryption failed (authentication tag mismatch)")]
    Decryption,

    #[error("Session state error: {0}")]
    SessionState(String),

    #[error("No local identity; generate a certificate first")]
    MissingIdentity,

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Crypto(CryptoError),

    #[error(transparent)]
    Codec(CodecError),
}

impl From<CodecError> for MessengerError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnsupportedVersion(v) => MessengerError::UnsupportedVersion(v),
            CodecError::InvalidField { .. } => MessengerError::MalformedMessage(err.to_string()),
            other => MessengerError::Codec(other),
        }
    }
}

impl From<CryptoError> for MessengerError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::SessionNotEstablished => {
                MessengerError::SessionState("ratchet step without an established session".into())
            }
            CryptoError::AeadDecrypt => MessengerError::Decryption,
            other => MessengerError::Crypto(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, MessengerError>;
