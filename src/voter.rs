//! Voter actors.
//!
//! A voter picks a choice (or arrives with one), keeps the ballot id and
//! receipt hash the tablet hands back, and later confirms that exact hash
//! appears on the bulletin board under their ballot id.

use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::ballot::Receipt;
use crate::crypto::rand_mod;
use crate::error::ElectionError;
use crate::sbb::SbbContents;

const LOG_TARGET: &str = "voter";

pub struct Voter {
    pub voter_id: usize,
    choice: Option<u64>,
    receipt: Option<Receipt>,
}

impl Voter {
    pub fn new(voter_id: usize, choice: Option<u64>) -> Self {
        Self {
            voter_id,
            choice,
            receipt: None,
        }
    }

    /// The voter's choice; drawn uniformly when unset or out of range.
    pub fn choose<R: RngCore + CryptoRng>(&mut self, modulus: u64, rng: &mut R) -> u64 {
        let choice = match self.choice {
            Some(choice) if choice < modulus => choice,
            _ => rand_mod(rng, modulus),
        };
        self.choice = Some(choice);
        choice
    }

    pub fn record_receipt(&mut self, receipt: Receipt) {
        debug!(
            target = LOG_TARGET,
            voter_id = self.voter_id,
            bid = %receipt.bid,
            "receipt recorded"
        );
        self.receipt = Some(receipt);
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        self.receipt.as_ref()
    }

    /// Confirm the posted receipt hash for this voter's ballot id.
    pub fn verify(&self, contents: &SbbContents) -> Result<(), ElectionError> {
        let failure = ElectionError::VoterVerification {
            voter_id: self.voter_id,
        };
        let Some(receipt) = &self.receipt else {
            return Err(failure);
        };
        match contents.receipt(&receipt.bid) {
            Some(posted) if posted == receipt.hash => Ok(()),
            _ => Err(failure),
        }
    }
}
