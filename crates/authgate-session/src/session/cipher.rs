//! Per-field session encryption

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use rand::RngCore;

use crate::{Error, Result};

/// AES-256-GCM nonce size in bytes
const NONCE_SIZE: usize = 12;

/// AES-256 key size in bytes
pub const KEY_SIZE: usize = 32;

/// Encrypts and decrypts single session fields.
///
/// Output must not contain `|`, the encrypted record separator.
pub trait FieldCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String>;
    fn decrypt(&self, encrypted: &str) -> Result<String>;
}

/// AES-256-GCM with a fresh random nonce per field.
///
/// Each field is `base64url(nonce || ciphertext)`, so tampering with any
/// byte fails authentication on decode.
#[derive(Clone)]
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmCipher").finish_non_exhaustive()
    }
}

impl AesGcmCipher {
    #[must_use]
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }

    /// Key from a cookie secret: 32 raw bytes, or base64 (standard or
    /// URL-safe) of 32 bytes.
    pub fn from_secret(secret: &str) -> Result<Self> {
        if secret.len() == KEY_SIZE {
            return Self::from_slice(secret.as_bytes());
        }

        let decoded = STANDARD
            .decode(secret)
            .or_else(|_| URL_SAFE.decode(secret))
            .or_else(|_| URL_SAFE_NO_PAD.decode(secret))
            .map_err(|_| Error::Config("cookie secret is not valid base64".into()))?;
        Self::from_slice(&decoded)
    }

    fn from_slice(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_SIZE {
            return Err(Error::Config(format!(
                "cookie secret must be {KEY_SIZE} bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| Error::Config(format!("invalid cookie secret: {e}")))?;
        Ok(Self { cipher })
    }

    /// Random key, base64 encoded
    #[must_use]
    pub fn generate_secret() -> String {
        let mut key = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut key);
        STANDARD.encode(key)
    }
}

impl FieldCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| Error::codec(format!("encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    fn decrypt(&self, encrypted: &str) -> Result<String> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encrypted)
            .map_err(|e| Error::codec(format!("invalid field encoding: {e}")))?;

        if bytes.len() < NONCE_SIZE {
            return Err(Error::codec("encrypted field too short"));
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| Error::codec("field authentication failed"))?;

        String::from_utf8(plaintext).map_err(|e| Error::codec(e.to_string()))
    }
}
