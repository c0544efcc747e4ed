use thiserror::Error;

use crate::ballot::SvrOpenError;
use crate::crypto::TransportError;
use crate::sbb::SbbError;

/// Failures on the proof-server side. All are fatal for the election.
#[derive(Debug, Error)]
pub enum ProofServerError {
    #[error("vote names row {row}, but the mix-net has {rows} rows")]
    InvalidRowAssignment { row: usize, rows: usize },
    #[error("rows hold unequal vote counts at mix start: {counts:?}")]
    UnequalRowCardinality { counts: Vec<usize> },
    #[error(
        "commitment verification failed in round {round} for row {row}, vote {vote} \
         from tablet {tablet_id}"
    )]
    CommitmentVerificationFailure {
        round: usize,
        row: usize,
        vote: usize,
        tablet_id: String,
    },
    #[error("vote from unregistered tablet {tablet_id}")]
    UnknownTablet { tablet_id: String },
    #[error("failed to open row {row}, vote {vote} in round {round}: {source}")]
    VoteOpen {
        round: usize,
        row: usize,
        vote: usize,
        source: SvrOpenError,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("mixing has not run yet")]
    NotMixed,
    #[error("challenge names round {round}, but only {rounds} rounds were mixed")]
    UnknownRound { round: usize, rounds: usize },
    #[error("challenge must name {expected} rounds, got {actual}")]
    ChallengeSize { expected: usize, actual: usize },
    #[error("side selector covers {actual} ballots, expected {expected}")]
    SelectorLength { expected: usize, actual: usize },
    #[error(transparent)]
    Sbb(#[from] SbbError),
}
