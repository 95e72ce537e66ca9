//! AES-256-GCM sealing of stored tokens.
//!
//! The master key is 32 bytes, supplied base64-encoded from the environment.
//! Each sealed value carries its own random nonce.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

const KEY_SIZE: usize = 32;

/// 96-bit GCM nonce
const NONCE_SIZE: usize = 12;

/// Decodes a base64 master key and checks it is exactly 32 bytes.
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>> {
    let key_bytes = BASE64
        .decode(key_base64.trim())
        .context("Failed to decode base64 encryption key")?;

    if key_bytes.len() != KEY_SIZE {
        return Err(anyhow!(
            "Encryption key must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        ));
    }

    Ok(key_bytes)
}

/// Cipher bound to the store's master key.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Builds a cipher from a base64-encoded 32-byte key.
    pub fn from_base64(key_base64: &str) -> Result<Self> {
        let key = validate_key(key_base64)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;
        Ok(Self { cipher })
    }

    /// Seals `plaintext`, returning `(ciphertext, nonce)`, both base64.
    pub fn seal(&self, plaintext: &str) -> Result<(String, String)> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        Ok((BASE64.encode(ciphertext), BASE64.encode(nonce)))
    }

    /// Opens a value produced by [`seal`](Self::seal).
    ///
    /// Fails on a wrong key, a malformed nonce or tampered ciphertext.
    pub fn open(&self, ciphertext: &str, nonce: &str) -> Result<String> {
        let ciphertext = BASE64
            .decode(ciphertext)
            .context("Failed to decode ciphertext")?;
        let nonce = BASE64.decode(nonce).context("Failed to decode nonce")?;

        if nonce.len() != NONCE_SIZE {
            return Err(anyhow!(
                "Invalid nonce size: expected {}, got {}",
                NONCE_SIZE,
                nonce.len()
            ));
        }

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
            .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

        String::from_utf8(plaintext).context("Decrypted data is not valid UTF-8")
    }

    /// Seals an optional value; `None` stays `None` in both columns.
    pub fn seal_optional(&self, plaintext: Option<&str>) -> Result<(Option<String>, Option<String>)> {
        match plaintext {
            Some(value) => {
                let (ciphertext, nonce) = self.seal(value)?;
                Ok((Some(ciphertext), Some(nonce)))
            }
            None => Ok((None, None)),
        }
    }

    pub fn open_optional(
        &self,
        ciphertext: Option<String>,
        nonce: Option<String>,
    ) -> Result<Option<String>> {
        match (ciphertext, nonce) {
            (Some(ciphertext), Some(nonce)) => self.open(&ciphertext, &nonce).map(Some),
            _ => Ok(None),
        }
    }
}
