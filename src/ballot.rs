//! Ballot-side data: split-value representations, their commitments, the
//! encrypted per-row wire messages, and voter receipts.

use std::collections::BTreeMap;

use rand::{CryptoRng, RngCore};
use serde::Serialize;
use thiserror::Error;

use crate::crypto::{
    commit, encode_value, sha256_hex, Channel, ChannelError, CommitKey, Commitment,
    COMMIT_KEY_LEN,
};
use crate::json_num;
use crate::split_value::{split_value, val};

/// Length of a ballot id in bytes.
pub const BALLOT_ID_LEN: usize = 32;

/// Tablet identity as registered with the proof server.
pub type TabletId = String;

/// Uniformly random per-ballot identifier; the voter keeps it to look up
/// their receipt on the bulletin board.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BallotId(pub [u8; BALLOT_ID_LEN]);

impl BallotId {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; BALLOT_ID_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for BallotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BallotId({})", hex::encode(&self.0[..8]))
    }
}

impl std::fmt::Display for BallotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// One split-value representation: the `(u, v)` pair plus the keys that
/// open its commitments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaintextSvr {
    pub k1: CommitKey,
    pub k2: CommitKey,
    pub u: u64,
    pub v: u64,
}

impl PlaintextSvr {
    /// Draw a fresh randomized representation of `x` modulo `modulus`.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R, x: u64, modulus: u64) -> Self {
        let (u, v) = split_value(rng, x, modulus);
        Self {
            k1: CommitKey::random(rng),
            k2: CommitKey::random(rng),
            u,
            v,
        }
    }

    /// The committed pair `(COM(k1, u), COM(k2, v))`.
    pub fn commitments(&self) -> ComPair {
        ComPair {
            com_u: commit(&self.k1, &encode_value(self.u)),
            com_v: commit(&self.k2, &encode_value(self.v)),
        }
    }

    /// The represented value `(u + v) mod modulus`.
    pub fn value(&self, modulus: u64) -> u64 {
        val(self.u, self.v, modulus)
    }

    pub fn component(&self, side: Side) -> u64 {
        match side {
            Side::U => self.u,
            Side::V => self.v,
        }
    }

    pub fn key(&self, side: Side) -> &CommitKey {
        match side {
            Side::U => &self.k1,
            Side::V => &self.k2,
        }
    }
}

/// The public commitment to one split-value representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComPair {
    pub com_u: Commitment,
    pub com_v: Commitment,
}

impl ComPair {
    pub fn side(&self, side: Side) -> Commitment {
        match side {
            Side::U => self.com_u,
            Side::V => self.com_v,
        }
    }
}

/// Which half of a split-value pair an opening reveals. The challenger
/// fixes one side per ballot position and the proof server opens that side
/// in every proved round, so no representation ever has both halves opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    U,
    V,
}

impl Side {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        if rng.next_u32() & 1 == 0 {
            Side::U
        } else {
            Side::V
        }
    }
}

#[derive(Debug, Error)]
pub enum SvrOpenError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("decrypted commitment key is {0} bytes, expected at most {COMMIT_KEY_LEN}")]
    KeyLength(usize),
    #[error("decrypted split component does not fit a machine word")]
    ValueOverflow,
}

/// The four ciphertexts a tablet sends so the proof server can open one
/// row's commitment: `k1`, `k2`, and the encoded `u` and `v`, each sealed
/// separately under the tablet secret.
#[derive(Clone, Debug)]
pub struct EncryptedSvr {
    pub k1: Vec<u8>,
    pub k2: Vec<u8>,
    pub u: Vec<u8>,
    pub v: Vec<u8>,
}

impl EncryptedSvr {
    pub fn seal<R: RngCore + CryptoRng>(
        channel: &Channel,
        rng: &mut R,
        svr: &PlaintextSvr,
    ) -> Result<Self, ChannelError> {
        Ok(Self {
            k1: channel.seal(rng, svr.k1.as_bytes())?,
            k2: channel.seal(rng, svr.k2.as_bytes())?,
            u: channel.seal(rng, &encode_value(svr.u))?,
            v: channel.seal(rng, &encode_value(svr.v))?,
        })
    }

    pub fn open(&self, channel: &Channel) -> Result<PlaintextSvr, SvrOpenError> {
        let k1 = decode_key(&channel.open(&self.k1)?)?;
        let k2 = decode_key(&channel.open(&self.k2)?)?;
        let u = decode_component(&channel.open(&self.u)?)?;
        let v = decode_component(&channel.open(&self.v)?)?;
        Ok(PlaintextSvr { k1, k2, u, v })
    }
}

fn decode_key(bytes: &[u8]) -> Result<CommitKey, SvrOpenError> {
    crate::crypto::fixed_width::<COMMIT_KEY_LEN>(bytes)
        .map(CommitKey::from_bytes)
        .ok_or(SvrOpenError::KeyLength(bytes.len()))
}

fn decode_component(bytes: &[u8]) -> Result<u64, SvrOpenError> {
    crate::crypto::decode_value(bytes).ok_or(SvrOpenError::ValueOverflow)
}

/// Per-row wire message from a tablet to the proof server.
#[derive(Clone, Debug)]
pub struct VoteMessage {
    pub bid: BallotId,
    pub tablet_id: TabletId,
    pub row: usize,
    pub commitment: ComPair,
    pub enc: EncryptedSvr,
}

/// What the voter takes home: their ballot id and the hash of the canonical
/// receipt the tablet posted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub bid: BallotId,
    pub hash: String,
}

#[derive(Serialize)]
struct ReceiptDoc {
    #[serde(with = "json_num::bytes")]
    bid: Vec<u8>,
    commitments: BTreeMap<String, ReceiptEntry>,
}

#[derive(Serialize)]
struct ReceiptEntry {
    #[serde(with = "json_num::bytes")]
    u: Vec<u8>,
    #[serde(with = "json_num::bytes")]
    v: Vec<u8>,
}

/// Canonical receipt JSON: sorted string keys, integers for every byte
/// string. Reproducible from the posted commitments and the kept ballot id.
pub fn receipt_json(bid: &BallotId, commitments: &[ComPair]) -> String {
    let doc = ReceiptDoc {
        bid: bid.as_bytes().to_vec(),
        commitments: commitments
            .iter()
            .enumerate()
            .map(|(row, pair)| {
                (
                    row.to_string(),
                    ReceiptEntry {
                        u: pair.com_u.as_bytes().to_vec(),
                        v: pair.com_v.as_bytes().to_vec(),
                    },
                )
            })
            .collect(),
    };
    serde_json::to_string(&doc).expect("receipt serialization is infallible")
}

/// Hash of the canonical receipt.
pub fn receipt_hash(bid: &BallotId, commitments: &[ComPair]) -> String {
    sha256_hex(receipt_json(bid, commitments).as_bytes())
}
