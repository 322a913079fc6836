//! Messenger configuration.
//!
//! ```json
//! {
//!   "oversight_public_key": "<b64url Ed25519 public key>",
//!   "trusted_authority_public_key": "<b64url Ed25519 public key>",
//!   "padding": "buckets"
//! }
//! ```

use std::path::Path;

use om_crypto::identity::PublicKeyBytes;
use om_proto::PaddingMode;
use serde::{Deserialize, Serialize};

use crate::error::{MessengerError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessengerConfig {
    /// Every chain key is escrowed to this key.
    pub oversight_public_key: PublicKeyBytes,
    /// Peer certificates must be signed by this key.
    pub trusted_authority_public_key: PublicKeyBytes,
    #[serde(default)]
    pub padding: PaddingMode,
}

impl MessengerConfig {
    pub fn new(oversight_public_key: PublicKeyBytes, trusted_authority_public_key: PublicKeyBytes) -> Self {
        Self {
            oversight_public_key,
            trusted_authority_public_key,
            padding: PaddingMode::default(),
        }
    }

    pub fn with_padding(mut self, padding: PaddingMode) -> Self {
        self.padding = padding;
        self
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| MessengerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| MessengerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    /// Both keys must map onto the curve outside the small-order subgroup.
    /// The oversight key is used for DH on every send.
    pub fn validate(&self) -> Result<()> {
        self.oversight_public_key
            .to_x25519()
            .map_err(|e| MessengerError::Config(format!("oversight_public_key: {e}")))?;
        self.trusted_authority_public_key
            .to_x25519()
            .map_err(|e| MessengerError::Config(format!("trusted_authority_public_key: {e}")))?;
        Ok(())
    }
}
