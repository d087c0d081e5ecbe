//! Key material handling
//!
//! Keys enter the system in the base64 form they are exchanged in and leave
//! as the lowercase hexadecimal the device configuration interface expects.

use std::fmt;
use thiserror::Error;

/// Canonical key length in bytes
pub const KEY_LEN: usize = 32;

/// Key errors
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Invalid base64 key: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Key material for the device configuration interface.
///
/// `Display` renders lowercase hex, which is the only encoding the device
/// accepts on its configuration channel.
#[derive(Clone, PartialEq, Eq)]
pub struct Key(Vec<u8>);

impl Key {
    /// Decode from base64
    pub fn from_base64(s: &str) -> Result<Self, KeyError> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD.decode(s)?;
        Ok(Self(bytes))
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encode as lowercase hex
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Key({}...)", &hex[..hex.len().min(8)])
    }
}
