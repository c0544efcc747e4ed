//! The verifier: checks the posted proofs using only bulletin-board data.
//!
//! Consistency: re-open the commitments referenced by the proof, re-derive
//! t-values, and require the interpolated row polynomials to cancel at
//! zero. Outcome: re-open every posted representation, tally each opened
//! list, and require all tallies to agree as multisets.

pub mod error;

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::ballot::Side;
use crate::crypto::{commit, encode_value};
use crate::modular::{add_mod, interpolate_at_zero};
use crate::params::ElectionParams;
use crate::sbb::SbbContents;
use crate::split_value::t_val;

pub use error::VerifyError;

const LOG_TARGET: &str = "verifier";

/// The multiset of raw vote values recovered from one (or all agreeing)
/// outcome lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tally {
    counts: BTreeMap<u64, usize>,
}

impl Tally {
    fn from_values(values: impl IntoIterator<Item = u64>) -> Self {
        let mut counts = BTreeMap::new();
        for value in values {
            *counts.entry(value).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn counts(&self) -> &BTreeMap<u64, usize> {
        &self.counts
    }

    pub fn total_votes(&self) -> usize {
        self.counts.values().sum()
    }

    /// The choices with the maximum count; more than one entry means a tie.
    pub fn winners(&self) -> Vec<u64> {
        let Some(&best) = self.counts.values().max() else {
            return Vec::new();
        };
        self.counts
            .iter()
            .filter(|(_, &count)| count == best)
            .map(|(&choice, _)| choice)
            .collect()
    }

    pub fn is_tie(&self) -> bool {
        self.winners().len() > 1
    }
}

impl std::fmt::Display for Tally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (choice, count) in &self.counts {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{choice}: {count}")?;
            first = false;
        }
        Ok(())
    }
}

pub struct Verifier {
    params: ElectionParams,
    num_voters: usize,
}

impl Verifier {
    pub fn new(params: ElectionParams, num_voters: usize) -> Self {
        Self { params, num_voters }
    }

    /// Check that the opened rounds and the outcome rounds are disjoint and
    /// together cover all 2m mix rounds.
    pub fn verify_challenge_partition(&self, contents: &SbbContents) -> Result<(), VerifyError> {
        let rounds = self.params.rounds;
        let mut seen = vec![0usize; rounds];
        for &round in contents
            .consistency_proof
            .keys()
            .chain(contents.election_outcomes.keys())
        {
            if round >= rounds {
                return Err(VerifyError::ChallengePartitionMismatch { rounds });
            }
            seen[round] += 1;
        }
        if contents.consistency_proof.len() != self.params.half_rounds()
            || seen.iter().any(|&count| count != 1)
        {
            return Err(VerifyError::ChallengePartitionMismatch { rounds });
        }
        Ok(())
    }

    /// Verify that the mixed lists are consistent with the cast ballots,
    /// using the openings of the challenged rounds.
    pub fn verify_ballot_consistency(&self, contents: &SbbContents) -> Result<(), VerifyError> {
        let modulus = self.params.modulus;
        let rows = self.params.rows;
        let expected_rounds = self.params.half_rounds();
        if contents.consistency_proof.len() != expected_rounds {
            return Err(VerifyError::ProofListCount {
                expected: expected_rounds,
                actual: contents.consistency_proof.len(),
            });
        }

        // The challenger fixes one opened side per ballot; track it across
        // rounds so a proof that flips sides is rejected.
        let mut selectors: Vec<Option<Side>> = vec![None; self.num_voters];

        for (&round, proof) in &contents.consistency_proof {
            let t_round = contents
                .t_values
                .get(round)
                .ok_or(VerifyError::MissingRound {
                    round,
                    section: "tvalue_commitment_list",
                })?;
            let vote_list = contents
                .vote_lists
                .get(round)
                .ok_or(VerifyError::MissingRound {
                    round,
                    section: "mixnet_vote_commitment_list",
                })?;

            for (vote, openings) in proof.iter().enumerate() {
                if openings.len() != rows {
                    return Err(VerifyError::ShapeMismatch {
                        round,
                        context: "opening does not cover every row",
                    });
                }
                let mut tu_row = Vec::with_capacity(rows);
                let mut tv_row = Vec::with_capacity(rows);

                for (row, opening) in openings.iter().enumerate() {
                    let side = opening.side;
                    match selectors[vote] {
                        None => selectors[vote] = Some(side),
                        Some(fixed) if fixed != side => {
                            return Err(VerifyError::SelectorInconsistent { vote })
                        }
                        Some(_) => {}
                    }

                    let original = contents
                        .svr_commitments
                        .get(row)
                        .and_then(|commitments| commitments.get(vote))
                        .ok_or(VerifyError::ShapeMismatch {
                            round,
                            context: "original-order commitments missing an entry",
                        })?;
                    if commit(&opening.key_init, &encode_value(opening.value_init))
                        != original.side(side)
                    {
                        return Err(VerifyError::InitialCommitmentMismatch {
                            round,
                            vote,
                            row,
                            side,
                        });
                    }

                    let posted_final = vote_list
                        .get(vote)
                        .and_then(|pairs| pairs.get(row))
                        .ok_or(VerifyError::ShapeMismatch {
                            round,
                            context: "mixed commitment list missing an entry",
                        })?;
                    if commit(&opening.key_fin, &encode_value(opening.value_fin))
                        != posted_final.side(side)
                    {
                        return Err(VerifyError::FinalCommitmentMismatch {
                            round,
                            vote,
                            row,
                            side,
                        });
                    }

                    let posted_t = t_round
                        .get(row)
                        .and_then(|row_values| row_values.get(vote))
                        .ok_or(VerifyError::ShapeMismatch {
                            round,
                            context: "t-value grid missing an entry",
                        })?;
                    let derived = t_val(opening.value_init, opening.value, modulus);
                    if derived != posted_t.side(side) {
                        return Err(VerifyError::TValueMismatch {
                            round,
                            vote,
                            row,
                            side,
                        });
                    }

                    tu_row.push(posted_t.tu);
                    tv_row.push(posted_t.tv);
                }

                let tu0 = interpolate_at_zero(&tu_row, modulus);
                let tv0 = interpolate_at_zero(&tv_row, modulus);
                if add_mod(tu0, tv0, modulus) != 0 {
                    return Err(VerifyError::LagrangeRelationFailure {
                        round,
                        vote,
                        tu0,
                        tv0,
                    });
                }
            }
            debug!(target = LOG_TARGET, round, "consistency openings verified");
        }

        info!(
            target = LOG_TARGET,
            rounds = contents.consistency_proof.len(),
            "ballot consistency verified"
        );
        Ok(())
    }

    /// Re-open the outcome lists, tally each, and require agreement.
    pub fn tally_election_outcome(&self, contents: &SbbContents) -> Result<Tally, VerifyError> {
        let modulus = self.params.modulus;
        let rows = self.params.rows;
        let expected_rounds = self.params.half_rounds();
        if contents.election_outcomes.len() != expected_rounds {
            return Err(VerifyError::OutcomeListCount {
                expected: expected_rounds,
                actual: contents.election_outcomes.len(),
            });
        }

        let mut tallies: Vec<(usize, Tally)> = Vec::with_capacity(expected_rounds);
        for (&round, outcome) in &contents.election_outcomes {
            let vote_list = contents
                .vote_lists
                .get(round)
                .ok_or(VerifyError::MissingRound {
                    round,
                    section: "mixnet_vote_commitment_list",
                })?;

            let mut raw_values = Vec::with_capacity(self.num_voters);
            for (vote, svrs) in outcome.iter().enumerate() {
                if svrs.len() != rows {
                    return Err(VerifyError::ShapeMismatch {
                        round,
                        context: "opened representation does not cover every row",
                    });
                }
                let mut raw = 0u64;
                for (row, svr) in svrs.iter().enumerate() {
                    let posted = vote_list
                        .get(vote)
                        .and_then(|pairs| pairs.get(row))
                        .ok_or(VerifyError::ShapeMismatch {
                            round,
                            context: "mixed commitment list missing an entry",
                        })?;
                    let reopened = svr.commitments();
                    if reopened.com_u != posted.com_u {
                        return Err(VerifyError::OutcomeCommitmentMismatch {
                            round,
                            vote,
                            row,
                            side: Side::U,
                        });
                    }
                    if reopened.com_v != posted.com_v {
                        return Err(VerifyError::OutcomeCommitmentMismatch {
                            round,
                            vote,
                            row,
                            side: Side::V,
                        });
                    }
                    raw = add_mod(raw, svr.value(modulus), modulus);
                }
                raw_values.push(raw);
            }
            tallies.push((round, Tally::from_values(raw_values)));
        }

        let (baseline, reference) = tallies
            .first()
            .cloned()
            .unwrap_or((0, Tally::default()));
        for (round, tally) in &tallies {
            if *tally != reference {
                return Err(VerifyError::TallyDisagreement {
                    baseline,
                    round: *round,
                });
            }
        }

        info!(
            target = LOG_TARGET,
            lists = tallies.len(),
            total_votes = reference.total_votes(),
            "outcome lists agree"
        );
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_and_winners() {
        let tally = Tally::from_values([0, 1, 0, 1, 2]);
        assert_eq!(tally.total_votes(), 5);
        assert_eq!(tally.counts().get(&0), Some(&2));
        assert_eq!(tally.winners(), vec![0, 1]);
        assert!(tally.is_tie());
    }

    #[test]
    fn unanimous_tally_has_single_winner() {
        let tally = Tally::from_values([2, 2, 2]);
        assert_eq!(tally.winners(), vec![2]);
        assert!(!tally.is_tie());
        assert_eq!(tally.to_string(), "2: 3");
    }

    #[test]
    fn empty_tally_has_no_winner() {
        let tally = Tally::default();
        assert!(tally.winners().is_empty());
        assert!(!tally.is_tie());
    }
}
