//! Cryptographic primitives: byte encoding, commitments, hashing, the
//! tablet↔proof-server channel, key transport, and uniform sampling.

pub mod channel;
pub mod commitment;
pub mod encoding;
pub mod hash;
pub mod random;
pub mod transport;

pub use channel::{Channel, ChannelError, SecretKey, SECRET_KEY_LEN};
pub use commitment::{commit, CommitKey, Commitment, COMMITMENT_LEN, COMMIT_KEY_LEN};
pub use encoding::{bigint_to_bytes, bytes_to_bigint, decode_value, encode_value, fixed_width};
pub use hash::sha256_hex;
pub use random::{invert_permutation, rand_mod, random_permutation};
pub use transport::{encrypt_secret, TransportError, TransportKeyPair};
