//! Voting tablets.
//!
//! A tablet owns a symmetric secret shared with the proof server at
//! registration. Casting splits the choice across the mix-net rows, commits
//! to every share, encrypts the openings, and produces the voter's receipt.
//! The tablet retains no plaintext after a ballot is built; the receipt
//! hash is reproducible from the posted commitments and the ballot id.

use rand::{CryptoRng, RngCore};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::ballot::{
    receipt_hash, BallotId, ComPair, EncryptedSvr, PlaintextSvr, Receipt, TabletId, VoteMessage,
};
use crate::crypto::{encrypt_secret, Channel, ChannelError, SecretKey, TransportError};
use crate::error::ElectionError;
use crate::proof_server::ProofServer;
use crate::split_value::split_multiple;

const LOG_TARGET: &str = "tablet";

#[derive(Debug, Error)]
pub enum TabletError {
    #[error("choice {choice} is outside the vote space [0, {modulus})")]
    ChoiceOutOfRange { choice: u64, modulus: u64 },
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A fully built ballot: one wire message per row plus the voter's receipt.
/// The driver delivers the messages and posts the commitments; tests may
/// tamper in flight.
#[derive(Debug)]
pub struct CastBallot {
    pub messages: Vec<VoteMessage>,
    pub receipt: Receipt,
}

pub struct Tablet {
    id: TabletId,
    channel: Channel,
    rows: usize,
    modulus: u64,
}

impl Tablet {
    /// Generate an identity and symmetric secret, then register the secret
    /// with the proof server under its RSA public key.
    pub fn register<R: RngCore + CryptoRng>(
        server: &mut ProofServer,
        modulus: u64,
        rng: &mut R,
    ) -> Result<Self, ElectionError> {
        let id = Uuid::new_v4().to_string();
        let secret = SecretKey::random(rng);
        let encrypted = encrypt_secret(rng, server.public_key(), &secret)
            .map_err(TabletError::Transport)?;
        server.register_tablet(id.clone(), &encrypted)?;
        debug!(target = LOG_TARGET, tablet_id = %id, "tablet registered with proof server");
        Ok(Self {
            id,
            channel: Channel::new(&secret),
            rows: server.num_rows(),
            modulus,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Split `choice` into one share per row and build the per-row
    /// messages, commitments, and the canonical receipt.
    pub fn cast<R: RngCore + CryptoRng>(
        &self,
        choice: u64,
        rng: &mut R,
    ) -> Result<CastBallot, TabletError> {
        if choice >= self.modulus {
            return Err(TabletError::ChoiceOutOfRange {
                choice,
                modulus: self.modulus,
            });
        }

        let bid = BallotId::random(rng);
        let shares = split_multiple(rng, choice, self.rows, self.modulus);

        let mut messages = Vec::with_capacity(self.rows);
        let mut commitments: Vec<ComPair> = Vec::with_capacity(self.rows);
        for (row, &share) in shares.iter().enumerate() {
            let svr = PlaintextSvr::random(rng, share, self.modulus);
            let commitment = svr.commitments();
            let enc = EncryptedSvr::seal(&self.channel, rng, &svr)?;
            commitments.push(commitment);
            messages.push(VoteMessage {
                bid,
                tablet_id: self.id.clone(),
                row,
                commitment,
                enc,
            });
        }

        let hash = receipt_hash(&bid, &commitments);
        debug!(target = LOG_TARGET, tablet_id = %self.id, bid = %bid, "ballot built");
        Ok(CastBallot {
            messages,
            receipt: Receipt { bid, hash },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modular::add_mod;
    use crate::params::ElectionParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tablet(rng: &mut StdRng) -> (Tablet, ProofServer) {
        let params = ElectionParams::new(5, 2, 3).unwrap();
        let mut server = ProofServer::new(params, rng).unwrap();
        let tablet = Tablet::register(&mut server, params.modulus, rng).unwrap();
        (tablet, server)
    }

    #[test]
    fn cast_produces_one_message_per_row() {
        let mut rng = StdRng::seed_from_u64(91);
        let (tablet, server) = tablet(&mut rng);
        let ballot = tablet.cast(3, &mut rng).unwrap();
        assert_eq!(ballot.messages.len(), server.num_rows());
        for (row, message) in ballot.messages.iter().enumerate() {
            assert_eq!(message.row, row);
            assert_eq!(message.tablet_id, tablet.id());
            assert_eq!(message.bid, ballot.receipt.bid);
        }
    }

    #[test]
    fn shares_recombine_to_the_choice() {
        let mut rng = StdRng::seed_from_u64(92);
        let (tablet, _server) = tablet(&mut rng);
        let ballot = tablet.cast(4, &mut rng).unwrap();
        let total = ballot.messages.iter().fold(0u64, |acc, message| {
            let svr = message.enc.open(&tablet.channel).unwrap();
            add_mod(acc, svr.value(5), 5)
        });
        assert_eq!(total, 4);
    }

    #[test]
    fn receipt_matches_message_commitments() {
        let mut rng = StdRng::seed_from_u64(93);
        let (tablet, _server) = tablet(&mut rng);
        let ballot = tablet.cast(1, &mut rng).unwrap();
        let commitments: Vec<ComPair> = ballot
            .messages
            .iter()
            .map(|message| message.commitment)
            .collect();
        assert_eq!(
            ballot.receipt.hash,
            receipt_hash(&ballot.receipt.bid, &commitments)
        );
    }

    #[test]
    fn out_of_range_choice_is_rejected() {
        let mut rng = StdRng::seed_from_u64(94);
        let (tablet, _server) = tablet(&mut rng);
        assert!(matches!(
            tablet.cast(5, &mut rng),
            Err(TabletError::ChoiceOutOfRange {
                choice: 5,
                modulus: 5
            })
        ));
    }
}
