//! Uniform sampling helpers.

use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};

/// Sample a uniform residue modulo `modulus` by reducing 16 uniform bytes.
///
/// The bias is negligible because `modulus` is tiny relative to 2^128.
pub fn rand_mod<R: RngCore + CryptoRng>(rng: &mut R, modulus: u64) -> u64 {
    debug_assert!(modulus > 0);
    let mut buf = [0u8; 16];
    rng.fill_bytes(&mut buf);
    (u128::from_le_bytes(buf) % u128::from(modulus)) as u64
}

/// A uniformly random permutation of `[0, n)`.
pub fn random_permutation<R: RngCore + CryptoRng>(rng: &mut R, n: usize) -> Vec<usize> {
    let mut pi: Vec<usize> = (0..n).collect();
    pi.shuffle(rng);
    pi
}

/// Invert a permutation given as `pi[new_index] = old_index`.
pub fn invert_permutation(pi: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0usize; pi.len()];
    for (new_index, &old_index) in pi.iter().enumerate() {
        inverse[old_index] = new_index;
    }
    inverse
}
