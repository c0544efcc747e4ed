//! Election parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("modulus {0} is not prime")]
    NotPrime(u64),
    #[error("mix round count {0} must be even and at least 2")]
    BadRoundCount(usize),
    #[error("row count must be at least 1")]
    NoRows,
    #[error("row count {rows} exceeds modulus {modulus}; interpolation nodes would collide")]
    RowsExceedModulus { rows: usize, modulus: u64 },
}

/// Public parameters fixed before any ballot is cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionParams {
    /// Prime bound on the vote value space; ballots are integers in `[0, modulus)`.
    pub modulus: u64,
    /// Total number of independent mix rounds (`2m`). The challenge opens
    /// half for consistency and half for the outcome.
    pub rounds: usize,
    /// Mix-net width: rows of the server matrix and shares per ballot.
    pub rows: usize,
}

impl ElectionParams {
    pub fn new(modulus: u64, rounds: usize, rows: usize) -> Result<Self, ParamsError> {
        if !is_prime(modulus) {
            return Err(ParamsError::NotPrime(modulus));
        }
        if rounds < 2 || rounds % 2 != 0 {
            return Err(ParamsError::BadRoundCount(rounds));
        }
        if rows == 0 {
            return Err(ParamsError::NoRows);
        }
        if rows as u64 > modulus {
            return Err(ParamsError::RowsExceedModulus { rows, modulus });
        }
        Ok(Self {
            modulus,
            rounds,
            rows,
        })
    }

    /// `m`: the size of each half of the challenge.
    pub fn half_rounds(&self) -> usize {
        self.rounds / 2
    }
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3u64;
    while d.saturating_mul(d) <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}
