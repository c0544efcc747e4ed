//! Authenticated symmetric channel between a tablet and the proof server.
//!
//! AES-256-GCM under a 32-byte tablet secret. Each message gets a fresh
//! 96-bit nonce; the wire blob is `nonce ‖ ciphertext+tag`.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::{CryptoRng, RngCore};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a tablet secret in bytes.
pub const SECRET_KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("secret key must be {SECRET_KEY_LEN} bytes, got {0}")]
    KeyLength(usize),
    #[error("ciphertext shorter than the {NONCE_LEN}-byte nonce")]
    Truncated,
    #[error("message failed authentication")]
    Authentication,
    #[error("encryption failure")]
    Encryption,
}

/// A tablet's symmetric secret. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; SECRET_KEY_LEN]);

impl SecretKey {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; SECRET_KEY_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChannelError> {
        let bytes: [u8; SECRET_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| ChannelError::KeyLength(bytes.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Sealing/opening endpoint for one tablet secret.
#[derive(Clone)]
pub struct Channel {
    cipher: Aes256Gcm,
}

impl Channel {
    pub fn new(secret: &SecretKey) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(secret.as_bytes());
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn seal<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, ChannelError> {
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| ChannelError::Encryption)?;
        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt and authenticate a `nonce ‖ ciphertext` blob.
    pub fn open(&self, blob: &[u8]) -> Result<Vec<u8>, ChannelError> {
        if blob.len() < NONCE_LEN {
            return Err(ChannelError::Truncated);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| ChannelError::Authentication)
    }
}
