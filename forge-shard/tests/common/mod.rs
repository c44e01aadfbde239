#![allow(dead_code)]

use forge_shard::{Element, Inputs, Matrix};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// `n` values drawn uniformly from `[low, high]`.
pub fn random_vec(rng: &mut ChaCha8Rng, n: usize, low: Element, high: Element) -> Vec<Element> {
    (0..n).map(|_| rng.gen_range(low..=high)).collect()
}

pub fn random_matrix(rng: &mut ChaCha8Rng, dim: usize) -> Matrix {
    Matrix::from_vec(dim, random_vec(rng, dim * dim, 0, 10))
}

pub fn matmul_inputs(seed: u64, dim: usize) -> Inputs {
    let mut rng = seeded_rng(seed);
    Inputs::Matmul {
        a: random_matrix(&mut rng, dim),
        b: random_matrix(&mut rng, dim),
    }
}

pub fn sort_inputs(seed: u64, len: usize) -> Inputs {
    let mut rng = seeded_rng(seed);
    Inputs::Sort(random_vec(&mut rng, len, 0, 10))
}
