//! Shard planning: contiguous, load-balanced partition tables.
//!
//! For `n` items over `w` workers every worker gets `n / w` items and the
//! first `n % w` workers get one extra, so shard sizes never differ by more
//! than one. The table is a pure function of `(n, w)`; every worker can
//! recompute it instead of receiving it over the transport.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShardError};

/// Per-worker shard sizes and starting offsets for a fixed `(n, workers)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardTable {
    counts: Vec<usize>,
    offsets: Vec<usize>,
    total: usize,
}

impl ShardTable {
    /// Plan `n` items over `workers` workers.
    ///
    /// Fails with [`ShardError::InvalidPartition`] when `workers == 0`.
    /// When `n < workers` the trailing workers get empty shards.
    pub fn plan(n: usize, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(ShardError::InvalidPartition { workers });
        }

        let base = n / workers;
        let rem = n % workers;

        let mut counts = Vec::with_capacity(workers);
        let mut offsets = Vec::with_capacity(workers);
        let mut sum = 0;
        for w in 0..workers {
            let count = base + usize::from(w < rem);
            counts.push(count);
            offsets.push(sum);
            sum += count;
        }

        Ok(Self {
            counts,
            offsets,
            total: n,
        })
    }

    /// Multiply every count and offset by `stride`.
    ///
    /// Turns a row table into an element table for row-major matrices.
    pub fn scaled(&self, stride: usize) -> Self {
        Self {
            counts: self.counts.iter().map(|c| c * stride).collect(),
            offsets: self.offsets.iter().map(|o| o * stride).collect(),
            total: self.total * stride,
        }
    }

    pub fn workers(&self) -> usize {
        self.counts.len()
    }

    /// Total number of items covered by the table.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn count(&self, rank: usize) -> usize {
        self.counts[rank]
    }

    pub fn offset(&self, rank: usize) -> usize {
        self.offsets[rank]
    }

    /// Index range owned by `rank` in the canonical ordering.
    pub fn range(&self, rank: usize) -> Range<usize> {
        let start = self.offsets[rank];
        start..start + self.counts[rank]
    }

    /// Number of workers that own at least one item.
    pub fn non_empty(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Split `data` into the per-worker regions described by this table.
    ///
    /// # Panics
    /// Panics if `data.len() != self.total()`.
    pub fn regions<'a, T>(&self, data: &'a [T]) -> Vec<&'a [T]> {
        assert_eq!(
            data.len(),
            self.total,
            "data length {} does not match table total {}",
            data.len(),
            self.total
        );
        (0..self.workers()).map(|w| &data[self.range(w)]).collect()
    }
}
