//! HMAC-SHA256 commitments over byte strings.
//!
//! `COM(K, x) = HMAC-SHA256(K, x)` with 16-byte keys. The commitment is
//! computationally hiding; opening is re-computation with the revealed key
//! and value.

use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// Length of a commitment key in bytes.
pub const COMMIT_KEY_LEN: usize = 16;

/// Length of a commitment (HMAC-SHA256 output) in bytes.
pub const COMMITMENT_LEN: usize = 32;

/// A 16-byte uniformly random commitment key.
#[derive(Clone, PartialEq, Eq, Zeroize)]
pub struct CommitKey([u8; COMMIT_KEY_LEN]);

impl CommitKey {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; COMMIT_KEY_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; COMMIT_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for CommitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keys open commitments; keep them out of logs until published.
        f.write_str("CommitKey(..)")
    }
}

/// A 32-byte HMAC-SHA256 commitment.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment([u8; COMMITMENT_LEN]);

impl Commitment {
    pub fn from_bytes(bytes: [u8; COMMITMENT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Commitment({})", hex::encode(self.0))
    }
}

/// Commit to `message` under `key`.
pub fn commit(key: &CommitKey, message: &[u8]) -> Commitment {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message);
    Commitment(mac.finalize().into_bytes().into())
}
