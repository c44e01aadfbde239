use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use forge_shard::{Element, Matrix};

/// Deterministic data generator seeded for reproducible benchmarks.
pub struct DataGenerator {
    rng: StdRng,
}

impl DataGenerator {
    /// Create a new generator with a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Fill `buf` with values drawn uniformly from `[low, high]`.
    pub fn fill(&mut self, buf: &mut [Element], low: Element, high: Element) {
        for v in buf.iter_mut() {
            *v = self.rng.gen_range(low..=high);
        }
    }

    /// Generate `count` values in `[low, high]`.
    pub fn uniform(&mut self, count: usize, low: Element, high: Element) -> Vec<Element> {
        let mut buf = vec![0; count];
        self.fill(&mut buf, low, high);
        buf
    }

    /// Generate a `dim x dim` matrix with entries in `[low, high]`.
    pub fn matrix(&mut self, dim: usize, low: Element, high: Element) -> Matrix {
        Matrix::from_vec(dim, self.uniform(dim * dim, low, high))
    }
}
