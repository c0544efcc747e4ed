//! Split-value algebra.
//!
//! A vote `x` is held as additive shares modulo the prime `M`: the basic
//! split is the pair `(u, v)` with `u + v ≡ x`, and an n-way split spreads
//! `x` across the mix-net rows. Obfuscation during mixing adds zero-sum
//! tuples that also vanish under Lagrange interpolation at zero, so the
//! published equality proof can interpolate t-value rows without learning
//! anything about the votes.

use rand::{CryptoRng, RngCore};

use crate::crypto::rand_mod;
use crate::modular::{add_mod, lagrange_zero_weights, mod_inv, mul_mod, sub_mod};

/// Randomized two-way split of `x` modulo `modulus`.
pub fn split_value<R: RngCore + CryptoRng>(rng: &mut R, x: u64, modulus: u64) -> (u64, u64) {
    let u = rand_mod(rng, modulus);
    let v = sub_mod(x, u, modulus);
    (u, v)
}

/// Randomized `n`-way additive split of `x` modulo `modulus`.
pub fn split_multiple<R: RngCore + CryptoRng>(
    rng: &mut R,
    x: u64,
    n: usize,
    modulus: u64,
) -> Vec<u64> {
    let mut shares: Vec<u64> = (0..n - 1).map(|_| rand_mod(rng, modulus)).collect();
    let total = shares
        .iter()
        .fold(0u64, |acc, &share| add_mod(acc, share, modulus));
    shares.push(sub_mod(x, total, modulus));
    shares
}

/// Recombine a two-way split.
pub fn val(u: u64, v: u64, modulus: u64) -> u64 {
    add_mod(u, v, modulus)
}

/// The additive offset turning `a` into `b`.
pub fn t_val(a: u64, b: u64, modulus: u64) -> u64 {
    sub_mod(b, a, modulus)
}

/// A `rows`-way obfuscation tuple: uniformly random subject to summing to
/// zero both plainly and under the Lagrange-at-zero weights for nodes
/// `1..=rows`.
///
/// The first constraint keeps every obfuscated ballot's value intact; the
/// second keeps the interpolated t-value relation at zero on honest
/// transcripts. When all weights coincide modulo `modulus` the second
/// constraint is implied by the first and a plain zero split is drawn.
pub fn obfuscation_tuple<R: RngCore + CryptoRng>(
    rng: &mut R,
    rows: usize,
    modulus: u64,
) -> Vec<u64> {
    let weights = lagrange_zero_weights(rows, modulus);
    let Some((i, j)) = distinct_weight_pair(&weights) else {
        return split_multiple(rng, 0, rows, modulus);
    };

    let mut tuple = vec![0u64; rows];
    let mut free_sum = 0u64;
    let mut free_weighted_sum = 0u64;
    for r in 0..rows {
        if r == i || r == j {
            continue;
        }
        let p = rand_mod(rng, modulus);
        tuple[r] = p;
        free_sum = add_mod(free_sum, p, modulus);
        free_weighted_sum = add_mod(free_weighted_sum, mul_mod(weights[r], p, modulus), modulus);
    }

    // Solve p_i + p_j = -S and w_i p_i + w_j p_j = -T for the two held-out
    // positions; the determinant w_j - w_i is nonzero by choice of (i, j).
    let det_inv = mod_inv(sub_mod(weights[j], weights[i], modulus), modulus);
    let p_j = mul_mod(
        sub_mod(
            mul_mod(weights[i], free_sum, modulus),
            free_weighted_sum,
            modulus,
        ),
        det_inv,
        modulus,
    );
    let p_i = sub_mod(0, add_mod(free_sum, p_j, modulus), modulus);
    tuple[i] = p_i;
    tuple[j] = p_j;
    tuple
}

fn distinct_weight_pair(weights: &[u64]) -> Option<(usize, usize)> {
    for i in 0..weights.len() {
        for j in i + 1..weights.len() {
            if weights[i] != weights[j] {
                return Some((i, j));
            }
        }
    }
    None
}
