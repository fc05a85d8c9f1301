//! Encryption of credentials at rest
//!
//! AES-256-GCM under a key stretched from the process cipher secret by
//! `rounds` iterations of SHA-256. The nonce is derived from the key and the
//! plaintext, so the same input always yields the same ciphertext; a changed
//! byte anywhere fails authentication on decrypt.
//!
//! Wire format: URL-safe base64 (no padding) of `nonce (12) || ciphertext+tag`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Secret;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_CONTEXT: &[u8] = b"bookstore-tokens/cipher/v1";

/// Cipher failures. Never surfaced verbatim past the orchestration layer.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("ciphertext does not authenticate under this key and rounds")]
    KeyMismatch,
}

/// Symmetric cipher bound to the process-wide cipher secret.
pub struct Cipher {
    secret: Secret<String>,
}

impl Cipher {
    pub fn new(secret: Secret<String>) -> Self {
        Self { secret }
    }

    /// Encrypt `plaintext` with the given cost factor.
    pub fn encrypt(&self, plaintext: &str, rounds: u32) -> Result<String, CipherError> {
        let key = self.derive_key(rounds);
        let nonce = synthetic_nonce(&key, plaintext.as_bytes());

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Decrypt a value produced by [`Cipher::encrypt`] with the same rounds.
    pub fn decrypt(&self, ciphertext: &str, rounds: u32) -> Result<String, CipherError> {
        let raw = URL_SAFE_NO_PAD
            .decode(ciphertext.trim())
            .map_err(|e| CipherError::Malformed(format!("not base64: {e}")))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Malformed(format!(
                "{} bytes is shorter than nonce and tag",
                raw.len()
            )));
        }

        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let key = self.derive_key(rounds);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::KeyMismatch)?;

        String::from_utf8(plain).map_err(|e| CipherError::Malformed(format!("not utf-8: {e}")))
    }

    fn derive_key(&self, rounds: u32) -> Zeroizing<[u8; 32]> {
        let secret = self.secret.as_bytes();
        let mut key: [u8; 32] = Sha256::new()
            .chain_update(KEY_CONTEXT)
            .chain_update(rounds.to_be_bytes())
            .chain_update(secret)
            .finalize()
            .into();
        for _ in 1..rounds {
            key = Sha256::new()
                .chain_update(key)
                .chain_update(secret)
                .finalize()
                .into();
        }
        Zeroizing::new(key)
    }
}

fn synthetic_nonce(key: &[u8; 32], plaintext: &[u8]) -> [u8; NONCE_LEN] {
    let digest = Sha256::new()
        .chain_update(b"nonce")
        .chain_update(key)
        .chain_update(plaintext)
        .finalize();
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&digest[..NONCE_LEN]);
    nonce
}
