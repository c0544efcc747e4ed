//! The election driver: orchestrates tablets, proof server, bulletin
//! board, and verifier through the eight protocol steps, and issues the
//! random challenge.

use std::collections::BTreeSet;
use std::path::PathBuf;

use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng, RngCore};
use tracing::{debug, info};

use crate::ballot::Side;
use crate::error::ElectionError;
use crate::params::ElectionParams;
use crate::proof_server::ProofServer;
use crate::sbb::{Sbb, DEFAULT_SBB_PATH};
use crate::tablet::Tablet;
use crate::verifier::{Tally, Verifier};
use crate::voter::Voter;

pub mod tests;

const LOG_TARGET: &str = "election";

#[derive(Clone, Debug)]
pub struct ElectionConfig {
    pub params: ElectionParams,
    pub num_voters: usize,
    pub num_tablets: usize,
    pub sbb_path: PathBuf,
}

impl ElectionConfig {
    pub fn new(params: ElectionParams, num_voters: usize) -> Self {
        Self {
            params,
            num_voters,
            num_tablets: 3,
            sbb_path: PathBuf::from(DEFAULT_SBB_PATH),
        }
    }
}

/// The random challenge: a partition of the 2m rounds into the half opened
/// for consistency and the half opened as the outcome, plus the per-ballot
/// side selector for the consistency openings.
#[derive(Clone, Debug)]
pub struct Challenge {
    pub proof_rounds: BTreeSet<usize>,
    pub outcome_rounds: BTreeSet<usize>,
    pub select_u_v: Vec<Side>,
}

impl Challenge {
    /// Draw uniformly: an m-subset of the rounds and one independent fair
    /// bit per ballot position. Must be drawn only after the t-values are
    /// posted, so the proof server cannot tailor its state to it.
    pub fn draw<R: RngCore + CryptoRng>(
        rng: &mut R,
        params: &ElectionParams,
        num_voters: usize,
    ) -> Self {
        let mut rounds: Vec<usize> = (0..params.rounds).collect();
        rounds.shuffle(rng);
        let proof_rounds: BTreeSet<usize> =
            rounds[..params.half_rounds()].iter().copied().collect();
        let outcome_rounds: BTreeSet<usize> =
            rounds[params.half_rounds()..].iter().copied().collect();
        let select_u_v = (0..num_voters).map(|_| Side::random(rng)).collect();
        Self {
            proof_rounds,
            outcome_rounds,
            select_u_v,
        }
    }
}

/// One voter's confirmation line for the summary output.
#[derive(Clone, Debug)]
pub struct VoterReceipt {
    pub voter_id: usize,
    pub bid: String,
    pub receipt_hash: String,
}

/// What a completed election hands back to the caller.
#[derive(Debug)]
pub struct ElectionReport {
    pub tally: Tally,
    pub winners: Vec<u64>,
    pub receipts: Vec<VoterReceipt>,
}

pub struct Election {
    config: ElectionConfig,
}

impl Election {
    pub fn new(config: ElectionConfig) -> Self {
        Self { config }
    }

    /// Run a full election with uniformly random voter choices.
    pub fn run<R: Rng + CryptoRng>(&self, rng: &mut R) -> Result<ElectionReport, ElectionError> {
        self.execute(None, rng)
    }

    /// Run a full election with the given voter choices, in voter order.
    pub fn run_with_choices<R: Rng + CryptoRng>(
        &self,
        choices: &[u64],
        rng: &mut R,
    ) -> Result<ElectionReport, ElectionError> {
        if choices.len() != self.config.num_voters {
            return Err(ElectionError::ChoiceCount {
                expected: self.config.num_voters,
                actual: choices.len(),
            });
        }
        self.execute(Some(choices), rng)
    }

    fn execute<R: Rng + CryptoRng>(
        &self,
        choices: Option<&[u64]>,
        rng: &mut R,
    ) -> Result<ElectionReport, ElectionError> {
        let params = self.config.params;
        if self.config.num_tablets == 0 {
            return Err(ElectionError::NoTablets);
        }

        info!(
            target = LOG_TARGET,
            num_voters = self.config.num_voters,
            num_tablets = self.config.num_tablets,
            modulus = params.modulus,
            rounds = params.rounds,
            rows = params.rows,
            "running election"
        );

        // Step 1: stand up the bulletin board, the proof server, and the
        // registered tablets.
        let mut sbb = Sbb::create(
            &self.config.sbb_path,
            self.config.num_voters,
            params.rounds,
            params.rows,
        )?;
        let mut server = ProofServer::new(params, rng)?;
        let tablets: Vec<Tablet> = (0..self.config.num_tablets)
            .map(|_| Tablet::register(&mut server, params.modulus, rng))
            .collect::<Result<_, _>>()?;

        let mut voters: Vec<Voter> = (0..self.config.num_voters)
            .map(|voter_id| {
                Voter::new(voter_id, choices.map(|choices| choices[voter_id]))
            })
            .collect();

        // Step 2: each voter casts on a random tablet; the driver delivers
        // the per-row messages and buffers the public commitments.
        for voter in &mut voters {
            let choice = voter.choose(params.modulus, rng);
            let tablet = tablets
                .choose(rng)
                .expect("at least one tablet is registered");
            let ballot = tablet.cast(choice, rng)?;
            debug!(
                target = LOG_TARGET,
                voter_id = voter.voter_id,
                tablet_id = %tablet.id(),
                choice,
                "ballot cast"
            );
            for message in &ballot.messages {
                sbb.add_ballot_svr_commitment(message.row, &message.commitment)?;
            }
            for message in ballot.messages {
                server.handle_vote(message)?;
            }
            sbb.add_ballot_receipt(&ballot.receipt.bid, &ballot.receipt.hash)?;
            voter.record_receipt(ballot.receipt);
        }

        // Step 3: receipts and original-order commitments go public.
        sbb.post_ballots_and_commitments()?;

        // Step 4: every voter confirms their receipt hash on the board.
        let contents = sbb.contents()?;
        for voter in &voters {
            voter.verify(&contents)?;
            info!(
                target = LOG_TARGET,
                voter_id = voter.voter_id,
                "voter verified posted receipt"
            );
        }

        // Step 5: the mix-net runs its 2m rounds and posts the t-values
        // before any challenge exists.
        server.mix_votes(&mut sbb, rng)?;
        server.publish_t_values(&mut sbb)?;

        // Step 6: draw the challenge.
        let challenge = Challenge::draw(rng, &params, self.config.num_voters);
        info!(
            target = LOG_TARGET,
            proof_rounds = ?challenge.proof_rounds,
            outcome_rounds = ?challenge.outcome_rounds,
            "challenge drawn"
        );

        // Step 7: consistency proof, verified from the board alone.
        server.publish_vote_consistency_proof(
            &mut sbb,
            &challenge.proof_rounds,
            &challenge.select_u_v,
        )?;
        let verifier = Verifier::new(params, self.config.num_voters);
        let contents = sbb.contents()?;
        verifier.verify_ballot_consistency(&contents)?;

        // Step 8: outcome proof, tally, and cross-list agreement.
        server.publish_election_outcome(&mut sbb, &challenge.outcome_rounds)?;
        let contents = sbb.contents()?;
        verifier.verify_challenge_partition(&contents)?;
        let tally = verifier.tally_election_outcome(&contents)?;

        sbb.close()?;

        let receipts = voters
            .iter()
            .filter_map(|voter| {
                voter.receipt().map(|receipt| VoterReceipt {
                    voter_id: voter.voter_id,
                    bid: receipt.bid.to_string(),
                    receipt_hash: receipt.hash.clone(),
                })
            })
            .collect();
        let winners = tally.winners();
        info!(target = LOG_TARGET, tally = %tally, "election complete");
        Ok(ElectionReport {
            tally,
            winners,
            receipts,
        })
    }
}

