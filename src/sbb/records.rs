//! Wire records of the bulletin-board transcript.
//!
//! Each section holds JSON records, one per line. Byte strings (ballot ids,
//! commitments, commitment keys) appear as arbitrary-precision JSON
//! integers in minimal little-endian interpretation; split components and
//! t-values are plain small integers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ballot::{ComPair, PlaintextSvr, Side};
use crate::crypto::{fixed_width, CommitKey, Commitment, COMMITMENT_LEN, COMMIT_KEY_LEN};
use crate::json_num;

use super::error::SbbError;

pub const BALLOT_RECEIPTS: &str = "ballot_receipts";
pub const ORIGINAL_ORDER_COMMITMENTS: &str = "original_order_commitments";
pub const MIXNET_VOTE_COMMITMENT_LIST: &str = "mixnet_vote_commitment_list";
pub const TVALUE_COMMITMENT_LIST: &str = "tvalue_commitment_list";
pub const CONSISTENCY_PROOF: &str = "consistency_proof";
pub const ELECTION_OUTCOME: &str = "election_outcome";
pub const END_SECTION: &str = "end_section";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptRecord {
    #[serde(with = "json_num::bytes")]
    pub bid: Vec<u8>,
    pub receipt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComPairRecord {
    #[serde(with = "json_num::bytes")]
    pub com_u: Vec<u8>,
    #[serde(with = "json_num::bytes")]
    pub com_v: Vec<u8>,
}

impl From<&ComPair> for ComPairRecord {
    fn from(pair: &ComPair) -> Self {
        Self {
            com_u: pair.com_u.as_bytes().to_vec(),
            com_v: pair.com_v.as_bytes().to_vec(),
        }
    }
}

impl ComPairRecord {
    pub fn to_com_pair(&self) -> Result<ComPair, SbbError> {
        Ok(ComPair {
            com_u: decode_commitment(&self.com_u)?,
            com_v: decode_commitment(&self.com_v)?,
        })
    }
}

fn decode_commitment(bytes: &[u8]) -> Result<Commitment, SbbError> {
    fixed_width::<COMMITMENT_LEN>(bytes)
        .map(Commitment::from_bytes)
        .ok_or(SbbError::IntegerWidth {
            context: "commitment",
            width: COMMITMENT_LEN,
        })
}

pub(crate) fn decode_commit_key(bytes: &[u8]) -> Result<CommitKey, SbbError> {
    fixed_width(bytes)
        .map(CommitKey::from_bytes)
        .ok_or(SbbError::IntegerWidth {
            context: "commitment key",
            width: COMMIT_KEY_LEN,
        })
}

/// The single record of the `original_order_commitments` section:
/// `[row][vote]` in cast order.
pub type OriginalOrderRecord = Vec<Vec<ComPairRecord>>;

/// One of the 2m mix-round records: `[vote][row]`.
pub type MixnetListRecord = Vec<Vec<ComPairRecord>>;

/// One `(tu, tv)` pair of the t-value grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TValuePair {
    pub tu: u64,
    pub tv: u64,
}

impl TValuePair {
    pub fn side(&self, side: Side) -> u64 {
        match side {
            Side::U => self.tu,
            Side::V => self.tv,
        }
    }
}

/// The single record of the `tvalue_commitment_list` section:
/// `[round][row][vote]`.
pub type TValueGridRecord = Vec<Vec<Vec<TValuePair>>>;

/// A fully opened split-value representation, as posted in outcome proofs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenedSvrRecord {
    #[serde(with = "json_num::bytes")]
    pub k1: Vec<u8>,
    #[serde(with = "json_num::bytes")]
    pub k2: Vec<u8>,
    pub u: u64,
    pub v: u64,
}

impl From<&PlaintextSvr> for OpenedSvrRecord {
    fn from(svr: &PlaintextSvr) -> Self {
        Self {
            k1: svr.k1.as_bytes().to_vec(),
            k2: svr.k2.as_bytes().to_vec(),
            u: svr.u,
            v: svr.v,
        }
    }
}

impl OpenedSvrRecord {
    pub fn to_plaintext(&self) -> Result<PlaintextSvr, SbbError> {
        Ok(PlaintextSvr {
            k1: decode_commit_key(&self.k1)?,
            k2: decode_commit_key(&self.k2)?,
            u: self.u,
            v: self.v,
        })
    }
}

/// One `election_outcome` record: one opened list in still-shuffled order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub list_idx: usize,
    pub svrs: Vec<Vec<OpenedSvrRecord>>,
}

/// One opening inside the consistency proof. Exactly one side is present:
/// the current (unmixed) component and key, plus the matching component and
/// key of the initial and final representations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsistencyOpeningRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub u: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "json_num::bytes_opt"
    )]
    pub k: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub u_init: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v_init: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "json_num::bytes_opt"
    )]
    pub k_init: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub u_fin: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v_fin: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "json_num::bytes_opt"
    )]
    pub k_fin: Option<Vec<u8>>,
}

/// The single record of the `consistency_proof` section, keyed by round
/// index and holding `[vote][row]` openings.
pub type ConsistencyProofRecord = BTreeMap<String, Vec<Vec<ConsistencyOpeningRecord>>>;
