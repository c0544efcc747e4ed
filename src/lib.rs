//! End-to-end verifiable electronic voting over a split-value mix-net.
//!
//! Voters cast numeric choices on tablets; the proof server obfuscates and
//! shuffles split-value shares of every ballot across 2m independent
//! rounds; a random challenge opens half the rounds against the cast
//! ballots and the other half as the tally. Everything a verifier needs is
//! posted to an append-only bulletin board.

pub mod ballot;
pub mod crypto;
pub mod election;
pub mod error;
pub mod json_num;
pub mod modular;
pub mod params;
pub mod proof_server;
pub mod sbb;
pub mod split_value;
pub mod tablet;
pub mod verifier;
pub mod voter;

pub use ballot::{BallotId, ComPair, PlaintextSvr, Receipt, Side, VoteMessage};
pub use election::{Challenge, Election, ElectionConfig, ElectionReport};
pub use error::ElectionError;
pub use params::ElectionParams;
pub use proof_server::ProofServer;
pub use sbb::{Sbb, SbbContents};
pub use tablet::Tablet;
pub use verifier::{Tally, Verifier};
pub use voter::Voter;
