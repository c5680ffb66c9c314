//! Synthetic byte sequences for benchmarks and tests.
//!
//! All generators are seeded, so the same arguments always give the same bytes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Bytes drawn from a geometric distribution with success probability `p`,
/// reduced modulo 256.
///
/// Larger `p` gives a more skewed, more compressible sequence.
pub fn geometric_bytes(len: usize, p: f64, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let ln_q = (1.0 - p).ln();
    (0..len)
        .map(|_| {
            // Number of failures before the first success, by inversion.
            let u: f64 = rng.random();
            let k = ((1.0 - u).ln() / ln_q).floor();
            (k as u64 % 256) as u8
        })
        .collect()
}

/// Uniformly distributed bytes.
pub fn uniform_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random::<u8>()).collect()
}
