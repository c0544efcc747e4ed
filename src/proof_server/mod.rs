//! The proof server: the mix-net operator.
//!
//! Conceptually a `rows × rows` matrix of servers. The first column
//! decrypts incoming split-value shares and checks them against the posted
//! commitments, every column obfuscates and shuffles, and the last column
//! commits the result to the bulletin board. The whole pipeline runs 2m
//! independent times; a random challenge later forces the server to open
//! half the rounds against the cast ballots and the other half as the
//! outcome.

pub mod error;
mod mixing;

use std::collections::HashMap;

use rand::{CryptoRng, RngCore};
use rsa::RsaPublicKey;
use tracing::{debug, info};

use crate::ballot::{PlaintextSvr, TabletId, VoteMessage};
use crate::crypto::{Channel, TransportKeyPair};
use crate::params::ElectionParams;

pub use error::ProofServerError;

const LOG_TARGET: &str = "proof_server";

/// Retained state of one mix round.
struct MixRound {
    /// Column permutations in application order; each permutes `[0, n)`.
    permutations: Vec<Vec<usize>>,
    /// Final-column representations, `[row][vote]`, in shuffled order.
    committed: Vec<Vec<PlaintextSvr>>,
}

pub struct ProofServer {
    params: ElectionParams,
    keys: TransportKeyPair,
    channels: HashMap<TabletId, Channel>,
    /// Incoming vote messages grouped by row, in arrival order.
    incoming: Vec<Vec<VoteMessage>>,
    /// Set once mixing starts and the row cardinalities agree.
    num_votes: Option<usize>,
    /// Ballot-order plaintext representations decrypted in the first round,
    /// `[row][vote]`.
    initial: Vec<Vec<PlaintextSvr>>,
    rounds: Vec<MixRound>,
    /// Final representations replayed back to ballot order,
    /// `[round][row][vote]`.
    unmixed: Vec<Vec<Vec<PlaintextSvr>>>,
}

impl ProofServer {
    pub fn new<R: RngCore + CryptoRng>(
        params: ElectionParams,
        rng: &mut R,
    ) -> Result<Self, ProofServerError> {
        let keys = TransportKeyPair::generate(rng)?;
        info!(
            target = LOG_TARGET,
            rows = params.rows,
            rounds = params.rounds,
            "proof server initialized"
        );
        Ok(Self {
            incoming: vec![Vec::new(); params.rows],
            params,
            keys,
            channels: HashMap::new(),
            num_votes: None,
            initial: Vec::new(),
            rounds: Vec::new(),
            unmixed: Vec::new(),
        })
    }

    /// The RSA public key tablets encrypt their secrets under.
    pub fn public_key(&self) -> &RsaPublicKey {
        self.keys.public_key()
    }

    pub fn num_rows(&self) -> usize {
        self.params.rows
    }

    /// Store a tablet's symmetric secret, delivered under RSA-OAEP.
    pub fn register_tablet(
        &mut self,
        tablet_id: TabletId,
        encrypted_secret: &[u8],
    ) -> Result<(), ProofServerError> {
        let secret = self.keys.decrypt_secret(encrypted_secret)?;
        debug!(target = LOG_TARGET, tablet_id = %tablet_id, "tablet registered");
        self.channels.insert(tablet_id, Channel::new(&secret));
        Ok(())
    }

    /// Accept one per-row vote message.
    pub fn handle_vote(&mut self, message: VoteMessage) -> Result<(), ProofServerError> {
        let rows = self.params.rows;
        let slot = self
            .incoming
            .get_mut(message.row)
            .ok_or(ProofServerError::InvalidRowAssignment {
                row: message.row,
                rows,
            })?;
        slot.push(message);
        Ok(())
    }

    /// The number of ballots, fixed at mix start.
    pub fn num_votes(&self) -> Option<usize> {
        self.num_votes
    }
}
