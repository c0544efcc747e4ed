#![cfg(test)]
//! End-to-end election scenarios driven through the driver and component
//! APIs.

use std::collections::BTreeSet;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::ballot::{ComPair, PlaintextSvr};
use crate::crypto::Commitment;
use crate::error::ElectionError;
use crate::params::ElectionParams;
use crate::proof_server::{ProofServer, ProofServerError};
use crate::sbb::{Sbb, SbbContents};
use crate::split_value::split_multiple;
use crate::tablet::Tablet;
use crate::verifier::{Verifier, VerifyError};

use super::{Challenge, Election, ElectionConfig};

fn sbb_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("sbb-{tag}-{}.txt", uuid::Uuid::new_v4()))
}

fn config(tag: &str, params: ElectionParams, num_voters: usize) -> ElectionConfig {
    ElectionConfig {
        params,
        num_voters,
        num_tablets: 3,
        sbb_path: sbb_path(tag),
    }
}

#[test]
fn challenge_partitions_all_rounds() {
    let mut rng = StdRng::seed_from_u64(111);
    let params = ElectionParams::new(5, 6, 3).unwrap();
    let challenge = Challenge::draw(&mut rng, &params, 4);
    assert_eq!(challenge.proof_rounds.len(), 3);
    assert_eq!(challenge.outcome_rounds.len(), 3);
    assert!(challenge.proof_rounds.is_disjoint(&challenge.outcome_rounds));
    let union: BTreeSet<usize> = challenge
        .proof_rounds
        .union(&challenge.outcome_rounds)
        .copied()
        .collect();
    assert_eq!(union, (0..6).collect());
    assert_eq!(challenge.select_u_v.len(), 4);
}

#[test]
fn unanimous_election() {
    let mut rng = StdRng::seed_from_u64(1);
    let params = ElectionParams::new(5, 2, 3).unwrap();
    let report = Election::new(config("unanimous", params, 3))
        .run_with_choices(&[2, 2, 2], &mut rng)
        .unwrap();

    assert_eq!(report.tally.counts().get(&2), Some(&3));
    assert_eq!(report.tally.total_votes(), 3);
    assert_eq!(report.winners, vec![2]);
    assert_eq!(report.receipts.len(), 3);
}

#[test]
fn tied_election_reports_all_winners() {
    let mut rng = StdRng::seed_from_u64(2);
    let params = ElectionParams::new(5, 4, 3).unwrap();
    let report = Election::new(config("tie", params, 4))
        .run_with_choices(&[0, 1, 0, 1], &mut rng)
        .unwrap();

    assert_eq!(report.tally.counts().get(&0), Some(&2));
    assert_eq!(report.tally.counts().get(&1), Some(&2));
    assert_eq!(report.winners, vec![0, 1]);
    assert!(report.tally.is_tie());
}

#[test]
fn single_voter_election() {
    let mut rng = StdRng::seed_from_u64(3);
    let params = ElectionParams::new(3, 2, 3).unwrap();
    let report = Election::new(config("single", params, 1))
        .run_with_choices(&[1], &mut rng)
        .unwrap();

    assert_eq!(report.tally.counts().get(&1), Some(&1));
    assert_eq!(report.winners, vec![1]);
}

#[test]
fn random_choices_still_verify() {
    let mut rng = StdRng::seed_from_u64(4);
    let params = ElectionParams::new(7, 4, 3).unwrap();
    let report = Election::new(config("random", params, 8))
        .run(&mut rng)
        .unwrap();
    assert_eq!(report.tally.total_votes(), 8);
}

#[test]
fn preset_choice_count_must_match() {
    let mut rng = StdRng::seed_from_u64(5);
    let params = ElectionParams::new(5, 2, 3).unwrap();
    let err = Election::new(config("mismatch", params, 3))
        .run_with_choices(&[1, 2], &mut rng)
        .unwrap_err();
    assert!(matches!(
        err,
        ElectionError::ChoiceCount {
            expected: 3,
            actual: 2
        }
    ));
}

#[test]
fn tampered_tablet_commitment_aborts_mixing() {
    let mut rng = StdRng::seed_from_u64(6);
    let params = ElectionParams::new(5, 2, 3).unwrap();
    let mut sbb = Sbb::create(sbb_path("tampered-commitment"), 1, params.rounds, params.rows)
        .unwrap();
    let mut server = ProofServer::new(params, &mut rng).unwrap();
    let tablet = Tablet::register(&mut server, params.modulus, &mut rng).unwrap();

    let ballot = tablet.cast(2, &mut rng).unwrap();
    sbb.add_ballot_receipt(&ballot.receipt.bid, &ballot.receipt.hash)
        .unwrap();
    for mut message in ballot.messages {
        sbb.add_ballot_svr_commitment(message.row, &message.commitment)
            .unwrap();
        if message.row == 1 {
            // Flip one bit of the posted u-commitment in transit.
            let mut bytes: [u8; 32] = message.commitment.com_u.as_bytes().try_into().unwrap();
            bytes[7] ^= 0x10;
            message.commitment = ComPair {
                com_u: Commitment::from_bytes(bytes),
                com_v: message.commitment.com_v,
            };
        }
        server.handle_vote(message).unwrap();
    }
    sbb.post_ballots_and_commitments().unwrap();

    let err = server.mix_votes(&mut sbb, &mut rng).unwrap_err();
    assert!(matches!(
        err,
        ProofServerError::CommitmentVerificationFailure { row: 1, vote: 0, .. }
    ));
}

/// Drive the protocol through the outcome proof and return what a verifier
/// sees, so tests can tamper with the parsed transcript.
fn run_through_outcome(
    tag: &str,
    params: ElectionParams,
    votes: &[u64],
    rng: &mut StdRng,
) -> (SbbContents, Verifier) {
    let mut sbb = Sbb::create(sbb_path(tag), votes.len(), params.rounds, params.rows).unwrap();
    let mut server = ProofServer::new(params, rng).unwrap();
    let tablet = Tablet::register(&mut server, params.modulus, rng).unwrap();

    for &vote in votes {
        let ballot = tablet.cast(vote, rng).unwrap();
        for message in &ballot.messages {
            sbb.add_ballot_svr_commitment(message.row, &message.commitment)
                .unwrap();
        }
        for message in ballot.messages {
            server.handle_vote(message).unwrap();
        }
        sbb.add_ballot_receipt(&ballot.receipt.bid, &ballot.receipt.hash)
            .unwrap();
    }
    sbb.post_ballots_and_commitments().unwrap();

    server.mix_votes(&mut sbb, rng).unwrap();
    server.publish_t_values(&mut sbb).unwrap();

    let challenge = Challenge::draw(rng, &params, votes.len());
    server
        .publish_vote_consistency_proof(&mut sbb, &challenge.proof_rounds, &challenge.select_u_v)
        .unwrap();
    server
        .publish_election_outcome(&mut sbb, &challenge.outcome_rounds)
        .unwrap();

    let verifier = Verifier::new(params, votes.len());
    let contents = sbb.contents().unwrap();
    verifier.verify_challenge_partition(&contents).unwrap();
    verifier.verify_ballot_consistency(&contents).unwrap();
    (contents, verifier)
}

#[test]
fn honest_transcript_passes_all_checks() {
    let mut rng = StdRng::seed_from_u64(7);
    let params = ElectionParams::new(5, 4, 3).unwrap();
    let (contents, verifier) = run_through_outcome("honest", params, &[0, 3, 3, 1], &mut rng);
    let tally = verifier.tally_election_outcome(&contents).unwrap();
    assert_eq!(tally.counts().get(&3), Some(&2));
    assert_eq!(tally.winners(), vec![3]);
}

#[test]
fn tampered_outcome_opening_is_detected() {
    let mut rng = StdRng::seed_from_u64(8);
    let params = ElectionParams::new(5, 2, 3).unwrap();
    let (mut contents, verifier) =
        run_through_outcome("tampered-outcome", params, &[2, 4], &mut rng);

    // Mutate one opened split component in the posted outcome.
    let (&round, _) = contents.election_outcomes.iter().next().unwrap();
    let opened = contents.election_outcomes.get_mut(&round).unwrap();
    opened[0][0].u = (opened[0][0].u + 1) % params.modulus;

    let err = verifier.tally_election_outcome(&contents).unwrap_err();
    assert!(matches!(
        err,
        VerifyError::OutcomeCommitmentMismatch { vote: 0, row: 0, .. }
    ));
}

#[test]
fn disagreeing_outcome_lists_are_detected() {
    let mut rng = StdRng::seed_from_u64(9);
    // Four rounds so two lists are opened as outcomes.
    let params = ElectionParams::new(5, 4, 3).unwrap();
    let (mut contents, verifier) = run_through_outcome("tally-split", params, &[0, 0, 0], &mut rng);

    // Rewrite one ballot of one opened list to a different value, with
    // matching commitments, as a proof server that kept consistent books
    // for that round but tallied something else would have.
    let (&round, _) = contents.election_outcomes.iter().next().unwrap();
    let replacement: Vec<PlaintextSvr> = split_multiple(&mut rng, 1, params.rows, params.modulus)
        .into_iter()
        .map(|share| PlaintextSvr::random(&mut rng, share, params.modulus))
        .collect();
    for (row, svr) in replacement.iter().enumerate() {
        contents.vote_lists[round][0][row] = svr.commitments();
    }
    contents.election_outcomes.get_mut(&round).unwrap()[0] = replacement;

    let err = verifier.tally_election_outcome(&contents).unwrap_err();
    assert!(matches!(err, VerifyError::TallyDisagreement { .. }));
}

#[test]
fn consistency_rejects_wrong_t_values() {
    let mut rng = StdRng::seed_from_u64(10);
    let params = ElectionParams::new(5, 2, 3).unwrap();
    let (mut contents, verifier) = run_through_outcome("bad-tvalue", params, &[1, 2], &mut rng);

    let (&round, _) = contents.consistency_proof.iter().next().unwrap();
    contents.t_values[round][0][0].tu = (contents.t_values[round][0][0].tu + 1) % params.modulus;
    contents.t_values[round][0][0].tv = (contents.t_values[round][0][0].tv + 1) % params.modulus;

    let err = verifier.verify_ballot_consistency(&contents).unwrap_err();
    assert!(matches!(
        err,
        VerifyError::TValueMismatch { .. } | VerifyError::LagrangeRelationFailure { .. }
    ));
}

#[test]
fn transcript_round_trips_through_the_reader() {
    let mut rng = StdRng::seed_from_u64(11);
    let params = ElectionParams::new(5, 2, 3).unwrap();
    let path = sbb_path("round-trip");
    let cfg = ElectionConfig {
        params,
        num_voters: 4,
        num_tablets: 2,
        sbb_path: path.clone(),
    };
    let report = Election::new(cfg)
        .run_with_choices(&[4, 0, 4, 2], &mut rng)
        .unwrap();
    assert_eq!(report.winners, vec![4]);

    // An independent verifier re-reads the closed transcript from disk.
    let contents = crate::sbb::reader::parse_file(&path, 4, params.rounds).unwrap();
    let verifier = Verifier::new(params, 4);
    verifier.verify_challenge_partition(&contents).unwrap();
    verifier.verify_ballot_consistency(&contents).unwrap();
    let tally = verifier.tally_election_outcome(&contents).unwrap();
    assert_eq!(tally.counts(), report.tally.counts());

    for receipt in &report.receipts {
        let posted = contents
            .ballot_receipts
            .values()
            .any(|hash| hash == &receipt.receipt_hash);
        assert!(posted, "voter {} receipt missing", receipt.voter_id);
    }
}
