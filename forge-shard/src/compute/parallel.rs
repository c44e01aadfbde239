//! Thread-pool backend: a dedicated rayon pool per worker.
//!
//! Multiplication fans out over output rows under a [`Schedule`]; every
//! output row belongs to exactly one task, so there is no shared
//! accumulator between threads. Sorting splits with `rayon::join` on a
//! three-way partition and falls back to the sequential quicksort below a
//! cutoff.

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::dataset::Element;
use crate::error::{Result, ShardError};

use super::sequential::{median_of_three, multiply_rows, partition3, quicksort};
use super::{LocalCompute, Schedule};

/// Ranges at or below this length are sorted on the current thread.
const PAR_SORT_CUTOFF: usize = 4096;

/// Rayon-backed compute for one worker.
pub struct ThreadPoolCompute {
    pool: ThreadPool,
    threads: usize,
    schedule: Schedule,
}

impl ThreadPoolCompute {
    /// Build a pool of `threads` threads named after the owning rank.
    pub fn new(rank: usize, threads: usize, schedule: Schedule) -> Result<Self> {
        if threads == 0 {
            return Err(ShardError::BackendSetupFailure(
                "thread pool needs at least one thread".to_string(),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("shard-{rank}-pool-{i}"))
            .build()
            .map_err(|e| ShardError::BackendSetupFailure(format!("rayon pool: {e}")))?;

        tracing::debug!(rank, threads, schedule = %schedule, "thread pool ready");
        Ok(Self {
            pool,
            threads,
            schedule,
        })
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }
}

impl LocalCompute for ThreadPoolCompute {
    fn name(&self) -> &'static str {
        "thread-pool"
    }

    fn threads(&self) -> usize {
        self.threads
    }

    fn multiply(&mut self, rows: &[Element], operand: &[Element], dim: usize) -> Result<Vec<Element>> {
        super::check_operand(operand, dim)?;
        let mut out = vec![0; rows.len()];
        let (threads, schedule) = (self.threads, self.schedule);
        self.pool
            .install(|| multiply_scheduled(rows, operand, dim, &mut out, schedule, threads));
        Ok(out)
    }

    fn sort(&mut self, shard: &mut [Element]) -> Result<()> {
        self.pool.install(|| par_quicksort(shard));
        Ok(())
    }
}

/// Row counts of successive guided chunks.
///
/// Each chunk takes `remaining / threads` rows, never fewer than
/// `min_chunk` (treated as at least 1) and never more than what is left.
pub fn guided_chunks(total_rows: usize, threads: usize, min_chunk: usize) -> Vec<usize> {
    let threads = threads.max(1);
    let min_chunk = min_chunk.max(1);
    let mut chunks = Vec::new();
    let mut remaining = total_rows;
    while remaining > 0 {
        let size = (remaining / threads).max(min_chunk).min(remaining);
        chunks.push(size);
        remaining -= size;
    }
    chunks
}

/// Row product over the current rayon pool under `schedule`.
///
/// Must be called from inside the target pool (`ThreadPool::install`).
pub fn multiply_scheduled(
    rows: &[Element],
    operand: &[Element],
    dim: usize,
    out: &mut [Element],
    schedule: Schedule,
    threads: usize,
) {
    if dim == 0 || out.is_empty() {
        return;
    }
    let n_rows = out.len() / dim;
    let threads = threads.max(1);

    match schedule {
        Schedule::Auto => {
            out.par_chunks_mut(dim)
                .zip(rows.par_chunks(dim))
                .for_each(|(c, a)| multiply_rows(a, operand, dim, c));
        }
        Schedule::Dynamic { chunk } => {
            let span = chunk.max(1) * dim;
            out.par_chunks_mut(span)
                .zip(rows.par_chunks(span))
                .with_max_len(1)
                .for_each(|(c, a)| multiply_rows(a, operand, dim, c));
        }
        Schedule::Static { chunk } => {
            let chunk_rows = if chunk == 0 {
                n_rows.div_ceil(threads)
            } else {
                chunk
            };
            let span = chunk_rows.max(1) * dim;

            let mut buckets: Vec<Vec<(&mut [Element], &[Element])>> =
                (0..threads).map(|_| Vec::new()).collect();
            for (i, pair) in out.chunks_mut(span).zip(rows.chunks(span)).enumerate() {
                buckets[i % threads].push(pair);
            }

            rayon::scope(|s| {
                for bucket in buckets {
                    s.spawn(move |_| {
                        for (c, a) in bucket {
                            multiply_rows(a, operand, dim, c);
                        }
                    });
                }
            });
        }
        Schedule::Guided { chunk } => {
            let mut pieces = Vec::new();
            let mut rest_out = out;
            let mut rest_in = rows;
            for len in guided_chunks(n_rows, threads, chunk) {
                let (c, tail_out) = std::mem::take(&mut rest_out).split_at_mut(len * dim);
                let (a, tail_in) = rest_in.split_at(len * dim);
                pieces.push((c, a));
                rest_out = tail_out;
                rest_in = tail_in;
            }
            pieces
                .into_par_iter()
                .with_max_len(1)
                .for_each(|(c, a)| multiply_rows(a, operand, dim, c));
        }
    }
}

/// Task-parallel quicksort on the current rayon pool.
pub fn par_quicksort<T: Ord + Copy + Send>(data: &mut [T]) {
    if data.len() <= PAR_SORT_CUTOFF {
        quicksort(data);
        return;
    }

    let pivot = median_of_three(data);
    let (lt, gt) = partition3(data, pivot);
    let (left, rest) = data.split_at_mut(lt);
    let right = &mut rest[gt - lt..];
    rayon::join(|| par_quicksort(left), || par_quicksort(right));
}
