//! The 2m-round mixing pipeline and the proofs derived from its retained
//! state.

use std::collections::BTreeSet;

use rand::{CryptoRng, RngCore};
use tracing::{debug, info};

use crate::ballot::{PlaintextSvr, Side};
use crate::crypto::{invert_permutation, random_permutation};
use crate::modular::add_mod;
use crate::sbb::records::{
    ComPairRecord, ConsistencyOpeningRecord, ConsistencyProofRecord, MixnetListRecord,
    OpenedSvrRecord, OutcomeRecord, TValueGridRecord, TValuePair,
};
use crate::sbb::Sbb;
use crate::split_value::{obfuscation_tuple, t_val};

use super::{MixRound, ProofServer, ProofServerError};

const LOG_TARGET: &str = "proof_server::mixing";

impl ProofServer {
    /// Run all 2m mix rounds and post their commitment lists, then replay
    /// the recorded permutations to recover ballot order for each round.
    pub fn mix_votes<R: RngCore + CryptoRng>(
        &mut self,
        sbb: &mut Sbb,
        rng: &mut R,
    ) -> Result<(), ProofServerError> {
        let num_votes = self.validate_stored_votes()?;
        self.num_votes = Some(num_votes);
        info!(
            target = LOG_TARGET,
            num_votes,
            rounds = self.params.rounds,
            "mixing votes"
        );

        sbb.begin_mixnet_lists()?;
        for round in 0..self.params.rounds {
            self.mix_round(round, sbb, rng)?;
        }
        sbb.end_mixnet_lists()?;

        self.unmixed = self.rounds.iter().map(Self::unmix_round).collect();
        Ok(())
    }

    /// All rows must hold the same number of votes before mixing starts.
    fn validate_stored_votes(&self) -> Result<usize, ProofServerError> {
        let counts: Vec<usize> = self.incoming.iter().map(Vec::len).collect();
        let first = counts.first().copied().unwrap_or(0);
        if counts.iter().any(|&count| count != first) {
            return Err(ProofServerError::UnequalRowCardinality { counts });
        }
        Ok(first)
    }

    /// One independent round: decrypt and check the first column, obfuscate
    /// and shuffle per column, commit the last column to the board.
    fn mix_round<R: RngCore + CryptoRng>(
        &mut self,
        round: usize,
        sbb: &mut Sbb,
        rng: &mut R,
    ) -> Result<(), ProofServerError> {
        let rows = self.params.rows;
        let modulus = self.params.modulus;
        let num_votes = self.num_votes.unwrap_or(0);

        // Decryption: each row opens its incoming shares and re-checks the
        // tablet's posted commitments before anything is mixed.
        let mut row_values: Vec<Vec<u64>> = Vec::with_capacity(rows);
        for row in 0..rows {
            let mut components = Vec::with_capacity(num_votes);
            for (vote, message) in self.incoming[row].iter().enumerate() {
                let channel = self.channels.get(&message.tablet_id).ok_or_else(|| {
                    ProofServerError::UnknownTablet {
                        tablet_id: message.tablet_id.clone(),
                    }
                })?;
                let svr = message.enc.open(channel).map_err(|source| {
                    ProofServerError::VoteOpen {
                        round,
                        row,
                        vote,
                        source,
                    }
                })?;
                if svr.commitments() != message.commitment {
                    return Err(ProofServerError::CommitmentVerificationFailure {
                        round,
                        row,
                        vote,
                        tablet_id: message.tablet_id.clone(),
                    });
                }
                components.push(svr.value(modulus));
                if round == 0 {
                    if self.initial.len() <= row {
                        self.initial.push(Vec::with_capacity(num_votes));
                    }
                    self.initial[row].push(svr);
                }
            }
            row_values.push(components);
        }

        // Obfuscation and shuffling, once per column. Every vote position
        // receives a zero-sum offset tuple spread across the rows, then all
        // rows shuffle under the same permutation.
        let mut permutations = Vec::with_capacity(rows);
        for _column in 0..rows {
            let pi = random_permutation(rng, num_votes);
            let offsets: Vec<Vec<u64>> = (0..num_votes)
                .map(|_| obfuscation_tuple(rng, rows, modulus))
                .collect();
            for (row, values) in row_values.iter_mut().enumerate() {
                let obfuscated: Vec<u64> = values
                    .iter()
                    .enumerate()
                    .map(|(vote, &value)| add_mod(value, offsets[vote][row], modulus))
                    .collect();
                *values = pi.iter().map(|&source| obfuscated[source]).collect();
            }
            permutations.push(pi);
        }

        // Commitment: the last column draws a fresh representation for each
        // shuffled component and posts the commitment pairs.
        let committed: Vec<Vec<PlaintextSvr>> = row_values
            .iter()
            .map(|values| {
                values
                    .iter()
                    .map(|&value| PlaintextSvr::random(rng, value, modulus))
                    .collect()
            })
            .collect();

        let list: MixnetListRecord = (0..num_votes)
            .map(|vote| {
                committed
                    .iter()
                    .map(|row| ComPairRecord::from(&row[vote].commitments()))
                    .collect()
            })
            .collect();
        sbb.post_mixnet_list(&list)?;

        debug!(target = LOG_TARGET, round, "mix round complete");
        self.rounds.push(MixRound {
            permutations,
            committed,
        });
        Ok(())
    }

    /// Replay a round's column permutations in reverse to index its final
    /// representations by cast ballot.
    fn unmix_round(round: &MixRound) -> Vec<Vec<PlaintextSvr>> {
        let mut values = round.committed.clone();
        for pi in round.permutations.iter().rev() {
            let inverse = invert_permutation(pi);
            for row in values.iter_mut() {
                *row = inverse.iter().map(|&source| row[source].clone()).collect();
            }
        }
        values
    }

    /// Post the full `[round][row][vote]` t-value grid. Must happen before
    /// the challenge is drawn so the offsets cannot be tailored to it.
    pub fn publish_t_values(&self, sbb: &mut Sbb) -> Result<(), ProofServerError> {
        if self.unmixed.len() != self.params.rounds {
            return Err(ProofServerError::NotMixed);
        }
        let modulus = self.params.modulus;
        let grid: TValueGridRecord = self
            .unmixed
            .iter()
            .map(|rows| {
                rows.iter()
                    .zip(&self.initial)
                    .map(|(unmixed_row, initial_row)| {
                        unmixed_row
                            .iter()
                            .zip(initial_row)
                            .map(|(fin, init)| TValuePair {
                                tu: t_val(init.u, fin.u, modulus),
                                tv: t_val(init.v, fin.v, modulus),
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect();
        sbb.post_t_values(&grid)?;
        Ok(())
    }

    /// Open the challenged half of the rounds against the cast ballots: for
    /// every ballot position and row, reveal the selected side of the
    /// unmixed, initial, and final representations.
    pub fn publish_vote_consistency_proof(
        &self,
        sbb: &mut Sbb,
        proof_rounds: &BTreeSet<usize>,
        select_u_v: &[Side],
    ) -> Result<(), ProofServerError> {
        let num_votes = self.num_votes.ok_or(ProofServerError::NotMixed)?;
        self.check_challenge(proof_rounds)?;
        if select_u_v.len() != num_votes {
            return Err(ProofServerError::SelectorLength {
                expected: num_votes,
                actual: select_u_v.len(),
            });
        }

        let mut proof: ConsistencyProofRecord = Default::default();
        for &round in proof_rounds {
            let unmixed = &self.unmixed[round];
            let committed = &self.rounds[round].committed;
            let openings: Vec<Vec<ConsistencyOpeningRecord>> = (0..num_votes)
                .map(|vote| {
                    let side = select_u_v[vote];
                    (0..self.params.rows)
                        .map(|row| {
                            opening_record(
                                side,
                                &unmixed[row][vote],
                                &self.initial[row][vote],
                                &committed[row][vote],
                            )
                        })
                        .collect()
                })
                .collect();
            proof.insert(round.to_string(), openings);
        }
        info!(
            target = LOG_TARGET,
            rounds = proof_rounds.len(),
            "publishing consistency proof"
        );
        sbb.post_consistency_proof(&proof)?;
        Ok(())
    }

    /// Open the other half of the rounds in full, still shuffled, so the
    /// tally can be computed publicly.
    pub fn publish_election_outcome(
        &self,
        sbb: &mut Sbb,
        outcome_rounds: &BTreeSet<usize>,
    ) -> Result<(), ProofServerError> {
        let num_votes = self.num_votes.ok_or(ProofServerError::NotMixed)?;
        self.check_challenge(outcome_rounds)?;

        sbb.begin_election_outcome()?;
        for &round in outcome_rounds {
            let committed = &self.rounds[round].committed;
            let svrs: Vec<Vec<OpenedSvrRecord>> = (0..num_votes)
                .map(|vote| {
                    committed
                        .iter()
                        .map(|row| OpenedSvrRecord::from(&row[vote]))
                        .collect()
                })
                .collect();
            sbb.post_election_outcome(&OutcomeRecord {
                list_idx: round,
                svrs,
            })?;
        }
        sbb.end_election_outcome()?;
        info!(
            target = LOG_TARGET,
            rounds = outcome_rounds.len(),
            "published election outcome lists"
        );
        Ok(())
    }

    fn check_challenge(&self, rounds: &BTreeSet<usize>) -> Result<(), ProofServerError> {
        if self.rounds.len() != self.params.rounds {
            return Err(ProofServerError::NotMixed);
        }
        if rounds.len() != self.params.half_rounds() {
            return Err(ProofServerError::ChallengeSize {
                expected: self.params.half_rounds(),
                actual: rounds.len(),
            });
        }
        if let Some(&round) = rounds.iter().find(|&&round| round >= self.params.rounds) {
            return Err(ProofServerError::UnknownRound {
                round,
                rounds: self.params.rounds,
            });
        }
        Ok(())
    }
}

fn opening_record(
    side: Side,
    unmixed: &PlaintextSvr,
    initial: &PlaintextSvr,
    final_svr: &PlaintextSvr,
) -> ConsistencyOpeningRecord {
    let mut record = ConsistencyOpeningRecord {
        k: Some(unmixed.key(side).as_bytes().to_vec()),
        k_init: Some(initial.key(side).as_bytes().to_vec()),
        k_fin: Some(final_svr.key(side).as_bytes().to_vec()),
        ..Default::default()
    };
    match side {
        Side::U => {
            record.u = Some(unmixed.u);
            record.u_init = Some(initial.u);
            record.u_fin = Some(final_svr.u);
        }
        Side::V => {
            record.v = Some(unmixed.v);
            record.v_init = Some(initial.v);
            record.v_fin = Some(final_svr.v);
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballot::{BallotId, ComPair, EncryptedSvr, VoteMessage};
    use crate::crypto::{encrypt_secret, Channel, SecretKey};
    use crate::modular::interpolate_at_zero;
    use crate::params::ElectionParams;
    use crate::split_value::split_multiple;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Fixture {
        server: ProofServer,
        sbb: Sbb,
        cast: Vec<u64>,
    }

    fn sbb_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("sbb-mixing-{tag}-{}.txt", uuid::Uuid::new_v4()))
    }

    /// Stand up a server with one registered tablet and `votes` cast
    /// ballots, receipts posted.
    fn fixture(tag: &str, params: ElectionParams, votes: &[u64], rng: &mut StdRng) -> Fixture {
        let mut server = ProofServer::new(params, rng).unwrap();
        let mut sbb = Sbb::create(sbb_path(tag), votes.len(), params.rounds, params.rows).unwrap();

        let secret = SecretKey::random(rng);
        let channel = Channel::new(&secret);
        let encrypted = encrypt_secret(rng, server.public_key(), &secret).unwrap();
        server.register_tablet("tablet-0".into(), &encrypted).unwrap();

        for &vote in votes {
            let bid = BallotId::random(rng);
            let shares = split_multiple(rng, vote, params.rows, params.modulus);
            for (row, &share) in shares.iter().enumerate() {
                let svr = PlaintextSvr::random(rng, share, params.modulus);
                let commitment = svr.commitments();
                let enc = EncryptedSvr::seal(&channel, rng, &svr).unwrap();
                sbb.add_ballot_svr_commitment(row, &commitment).unwrap();
                server
                    .handle_vote(VoteMessage {
                        bid,
                        tablet_id: "tablet-0".into(),
                        row,
                        commitment,
                        enc,
                    })
                    .unwrap();
            }
            sbb.add_ballot_receipt(&bid, "receipt").unwrap();
        }
        sbb.post_ballots_and_commitments().unwrap();
        Fixture {
            server,
            sbb,
            cast: votes.to_vec(),
        }
    }

    fn ballot_value(rows: &[Vec<PlaintextSvr>], vote: usize, modulus: u64) -> u64 {
        rows.iter().fold(0u64, |acc, row| {
            add_mod(acc, row[vote].value(modulus), modulus)
        })
    }

    #[test]
    fn unmixing_restores_cast_order_and_values() {
        let mut rng = StdRng::seed_from_u64(81);
        let params = ElectionParams::new(5, 4, 3).unwrap();
        let votes = [3u64, 1, 4, 0, 2];
        let mut fx = fixture("unmix", params, &votes, &mut rng);
        fx.server.mix_votes(&mut fx.sbb, &mut rng).unwrap();

        for round in 0..params.rounds {
            let unmixed = &fx.server.unmixed[round];
            for (vote, &cast) in fx.cast.iter().enumerate() {
                assert_eq!(
                    ballot_value(unmixed, vote, params.modulus),
                    cast,
                    "round {round}, vote {vote}"
                );
            }
        }
    }

    #[test]
    fn shuffled_columns_hold_the_same_multiset() {
        let mut rng = StdRng::seed_from_u64(82);
        let params = ElectionParams::new(5, 2, 3).unwrap();
        let votes = [2u64, 2, 0, 1];
        let mut fx = fixture("multiset", params, &votes, &mut rng);
        fx.server.mix_votes(&mut fx.sbb, &mut rng).unwrap();

        for round in &fx.server.rounds {
            let mut values: Vec<u64> = (0..votes.len())
                .map(|vote| ballot_value(&round.committed, vote, params.modulus))
                .collect();
            values.sort_unstable();
            let mut expected = votes.to_vec();
            expected.sort_unstable();
            assert_eq!(values, expected);
        }
    }

    #[test]
    fn t_values_interpolate_to_zero() {
        let mut rng = StdRng::seed_from_u64(83);
        let params = ElectionParams::new(5, 2, 3).unwrap();
        let votes = [4u64, 1, 3];
        let mut fx = fixture("tvals", params, &votes, &mut rng);
        fx.server.mix_votes(&mut fx.sbb, &mut rng).unwrap();

        let modulus = params.modulus;
        for round in 0..params.rounds {
            for vote in 0..votes.len() {
                let sums: Vec<u64> = (0..params.rows)
                    .map(|row| {
                        let init = &fx.server.initial[row][vote];
                        let fin = &fx.server.unmixed[round][row][vote];
                        add_mod(
                            t_val(init.u, fin.u, modulus),
                            t_val(init.v, fin.v, modulus),
                            modulus,
                        )
                    })
                    .collect();
                assert_eq!(interpolate_at_zero(&sums, modulus), 0);
            }
        }
    }

    #[test]
    fn single_voter_round_trip() {
        let mut rng = StdRng::seed_from_u64(84);
        let params = ElectionParams::new(3, 2, 3).unwrap();
        let mut fx = fixture("single", params, &[1], &mut rng);
        fx.server.mix_votes(&mut fx.sbb, &mut rng).unwrap();
        for round in 0..params.rounds {
            assert_eq!(ballot_value(&fx.server.unmixed[round], 0, 3), 1);
        }
    }

    #[test]
    fn tampered_commitment_aborts_mixing() {
        let mut rng = StdRng::seed_from_u64(85);
        let params = ElectionParams::new(5, 2, 3).unwrap();
        let mut fx = fixture("tamper", params, &[2, 4], &mut rng);

        // Flip one committed byte between emission and mixing.
        let message = &mut fx.server.incoming[1][0];
        let mut bytes: [u8; 32] = message.commitment.com_u.as_bytes().try_into().unwrap();
        bytes[0] ^= 0x01;
        message.commitment = ComPair {
            com_u: crate::crypto::Commitment::from_bytes(bytes),
            com_v: message.commitment.com_v,
        };

        let err = fx.server.mix_votes(&mut fx.sbb, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            ProofServerError::CommitmentVerificationFailure {
                round: 0,
                row: 1,
                vote: 0,
                ..
            }
        ));
    }

    #[test]
    fn unequal_rows_are_rejected() {
        let mut rng = StdRng::seed_from_u64(86);
        let params = ElectionParams::new(5, 2, 3).unwrap();
        let mut fx = fixture("unequal", params, &[1, 2], &mut rng);
        fx.server.incoming[2].pop();
        let err = fx.server.mix_votes(&mut fx.sbb, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            ProofServerError::UnequalRowCardinality { .. }
        ));
    }

    #[test]
    fn out_of_range_row_is_rejected() {
        let mut rng = StdRng::seed_from_u64(87);
        let params = ElectionParams::new(5, 2, 3).unwrap();
        let mut fx = fixture("badrow", params, &[1], &mut rng);
        let mut message = fx.server.incoming[0][0].clone();
        message.row = params.rows;
        let err = fx.server.handle_vote(message).unwrap_err();
        assert!(matches!(
            err,
            ProofServerError::InvalidRowAssignment { row: 3, rows: 3 }
        ));
    }

    #[test]
    fn publishing_before_mixing_fails() {
        let mut rng = StdRng::seed_from_u64(88);
        let params = ElectionParams::new(5, 2, 3).unwrap();
        let mut fx = fixture("premature", params, &[1], &mut rng);
        let err = fx.server.publish_t_values(&mut fx.sbb).unwrap_err();
        assert!(matches!(err, ProofServerError::NotMixed));
    }

    #[test]
    fn posted_lists_mirror_retained_state() {
        // Reading the board back yields exactly the commitments the server
        // retained for each round.
        let mut rng = StdRng::seed_from_u64(89);
        let params = ElectionParams::new(5, 2, 3).unwrap();
        let votes: Vec<u64> = (0..6).map(|i| i % 5).collect();
        let mut fx = fixture("roundtrip", params, &votes, &mut rng);
        fx.server.mix_votes(&mut fx.sbb, &mut rng).unwrap();

        let contents = fx.sbb.contents().unwrap();
        assert_eq!(contents.vote_lists.len(), params.rounds);
        for (round, state) in fx.server.rounds.iter().enumerate() {
            for vote in 0..votes.len() {
                for row in 0..params.rows {
                    assert_eq!(
                        contents.vote_lists[round][vote][row],
                        state.committed[row][vote].commitments()
                    );
                }
            }
        }
    }
}
