//! RSA-OAEP key transport.
//!
//! Tablets fetch the proof server's RSA public key at registration and use
//! it for a one-shot transfer of their symmetric secret. 2048-bit keys,
//! OAEP with SHA-256 (and SHA-256 MGF1).

use rand::{CryptoRng, RngCore};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;

use super::channel::SecretKey;

const RSA_BITS: usize = 2048;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("key pair generation failed: {0}")]
    KeyGeneration(rsa::Error),
    #[error("secret encryption failed: {0}")]
    Encrypt(rsa::Error),
    #[error("secret decryption failed")]
    Decrypt,
    #[error("transported secret has the wrong length")]
    SecretLength,
}

/// The proof server's transport key pair.
pub struct TransportKeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl TransportKeyPair {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, TransportError> {
        let private = RsaPrivateKey::new(rng, RSA_BITS).map_err(TransportError::KeyGeneration)?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Recover a tablet secret from its OAEP ciphertext. Failures are not
    /// distinguished further; a registration that does not decrypt is
    /// rejected wholesale.
    pub fn decrypt_secret(&self, ciphertext: &[u8]) -> Result<SecretKey, TransportError> {
        let plaintext = self
            .private
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(|_| TransportError::Decrypt)?;
        SecretKey::from_bytes(&plaintext).map_err(|_| TransportError::SecretLength)
    }
}

/// Encrypt a tablet secret under the proof server's public key.
pub fn encrypt_secret<R: RngCore + CryptoRng>(
    rng: &mut R,
    public: &RsaPublicKey,
    secret: &SecretKey,
) -> Result<Vec<u8>, TransportError> {
    public
        .encrypt(rng, Oaep::new::<Sha256>(), secret.as_bytes())
        .map_err(TransportError::Encrypt)
}
