//! AES-256-GCM credential vault.
//!
//! Ciphertext layout: `hex(iv).hex(tag).base64(ciphertext)` with a 12-byte random
//! IV and a 16-byte tag. Callers treat the format as opaque.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

const KEY_LENGTH: usize = 32;
const IV_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("decryption failed (wrong key or tampered ciphertext)")]
    Decrypt,

    #[error("encryption failed")]
    Encrypt,
}

/// Process-wide symmetric vault.
///
/// Construct it once from configuration (`from_hex_key`) and pass it explicitly;
/// business logic never reads key material from the environment itself.
#[derive(Clone)]
pub struct Vault {
    cipher: Aes256Gcm,
}

impl core::fmt::Debug for Vault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Vault").finish_non_exhaustive()
    }
}

impl Vault {
    /// Build a vault from a 64-character hex key (32 bytes).
    pub fn from_hex_key(hex_key: &str) -> Result<Self, VaultError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| VaultError::InvalidKey(format!("not hex: {e}")))?;
        let key: [u8; KEY_LENGTH] = bytes.try_into().map_err(|b: Vec<u8>| {
            VaultError::InvalidKey(format!("expected {KEY_LENGTH} bytes, got {}", b.len()))
        })?;
        Ok(Self::from_key_bytes(key))
    }

    pub fn from_key_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        }
    }

    /// Encrypt `plaintext` under a fresh random IV. Empty input stays empty.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let iv = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&iv, plaintext.as_bytes())
            .map_err(|_| VaultError::Encrypt)?;

        let (body, tag) = sealed.split_at(sealed.len() - TAG_LENGTH);
        Ok(format!(
            "{}.{}.{}",
            hex::encode(iv),
            hex::encode(tag),
            BASE64.encode(body)
        ))
    }

    /// Decrypt a value produced by [`Vault::encrypt`].
    ///
    /// Values that are not in the three-part layout are legacy plaintext and are
    /// returned unchanged. A three-part value that fails authentication is an error.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, VaultError> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }

        let parts: Vec<&str> = ciphertext.split('.').collect();
        let [iv_hex, tag_hex, body_b64] = parts.as_slice() else {
            tracing::debug!("vault: value is not in sealed layout; treating as legacy plaintext");
            return Ok(ciphertext.to_string());
        };

        let iv = hex::decode(iv_hex).map_err(|e| VaultError::Malformed(format!("iv: {e}")))?;
        let tag = hex::decode(tag_hex).map_err(|e| VaultError::Malformed(format!("tag: {e}")))?;
        let body = BASE64
            .decode(body_b64)
            .map_err(|e| VaultError::Malformed(format!("body: {e}")))?;

        if iv.len() != IV_LENGTH {
            return Err(VaultError::Malformed(format!("iv must be {IV_LENGTH} bytes")));
        }
        if tag.len() != TAG_LENGTH {
            return Err(VaultError::Malformed(format!("tag must be {TAG_LENGTH} bytes")));
        }

        let mut sealed = body;
        sealed.extend_from_slice(&tag);

        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
            .map_err(|_| VaultError::Decrypt)?;

        String::from_utf8(plain).map_err(|e| VaultError::Malformed(format!("utf-8: {e}")))
    }
}
