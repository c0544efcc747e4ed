use thiserror::Error;

use crate::ballot::Side;

/// Verification failures. Each carries the indices needed to reproduce the
/// check that failed; all abort the election.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(
        "initial commitment mismatch at round {round}, vote {vote}, row {row} ({side:?} side)"
    )]
    InitialCommitmentMismatch {
        round: usize,
        vote: usize,
        row: usize,
        side: Side,
    },
    #[error("final commitment mismatch at round {round}, vote {vote}, row {row} ({side:?} side)")]
    FinalCommitmentMismatch {
        round: usize,
        vote: usize,
        row: usize,
        side: Side,
    },
    #[error(
        "opened t-value disagrees with the posted value at round {round}, vote {vote}, \
         row {row} ({side:?} side)"
    )]
    TValueMismatch {
        round: usize,
        vote: usize,
        row: usize,
        side: Side,
    },
    #[error(
        "interpolated t-values do not cancel at round {round}, vote {vote}: \
         tu(0) = {tu0}, tv(0) = {tv0}"
    )]
    LagrangeRelationFailure {
        round: usize,
        vote: usize,
        tu0: u64,
        tv0: u64,
    },
    #[error(
        "outcome opening does not match the posted commitment at round {round}, vote {vote}, \
         row {row} ({side:?} side)"
    )]
    OutcomeCommitmentMismatch {
        round: usize,
        vote: usize,
        row: usize,
        side: Side,
    },
    #[error("outcome lists disagree: round {round} tallies differently from round {baseline}")]
    TallyDisagreement { baseline: usize, round: usize },
    #[error("consistency and outcome rounds do not partition the {rounds} mix rounds")]
    ChallengePartitionMismatch { rounds: usize },
    #[error("round {round} missing from the {section} section")]
    MissingRound {
        round: usize,
        section: &'static str,
    },
    #[error("expected {expected} consistency-proof rounds, found {actual}")]
    ProofListCount { expected: usize, actual: usize },
    #[error("expected {expected} opened outcome lists, found {actual}")]
    OutcomeListCount { expected: usize, actual: usize },
    #[error("transcript structure mismatch at round {round}: {context}")]
    ShapeMismatch {
        round: usize,
        context: &'static str,
    },
    #[error("opened side differs across rounds for vote {vote}")]
    SelectorInconsistent { vote: usize },
}
