//! Top-level election errors. Every failure is fatal: the protocol's point
//! is that misbehaviour is detected and stops the tally, not repaired.

use thiserror::Error;

use crate::params::ParamsError;
use crate::proof_server::ProofServerError;
use crate::sbb::SbbError;
use crate::tablet::TabletError;
use crate::verifier::VerifyError;

#[derive(Debug, Error)]
pub enum ElectionError {
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error(transparent)]
    Sbb(#[from] SbbError),
    #[error(transparent)]
    ProofServer(#[from] ProofServerError),
    #[error(transparent)]
    Tablet(#[from] TabletError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error("voter {voter_id} could not match their receipt hash on the bulletin board")]
    VoterVerification { voter_id: usize },
    #[error("election needs at least one tablet")]
    NoTablets,
    #[error("{expected} voters but {actual} preset choices")]
    ChoiceCount { expected: usize, actual: usize },
}
