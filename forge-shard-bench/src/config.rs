//! Sweep ranges and size parsing.
//!
//! Thread counts, worker counts and loop schedules are fixed here rather
//! than exposed as flags. Problem sizes form a ladder up to a configurable
//! top size, and chunk sizes follow each size's row count.

use serde::{Deserialize, Serialize};

use forge_shard::{Element, Schedule, WorkloadKind};

pub const DEFAULT_SEED: u64 = 42;

/// Default matrix side.
pub const DEFAULT_MATMUL_DIM: usize = 4;

/// Default number of elements to sort.
pub const DEFAULT_SORT_LEN: usize = 10_000;

/// Inclusive range of generated input values.
pub const VALUE_LOW: Element = 0;
pub const VALUE_HIGH: Element = 10;

/// Worker counts for the distributed variants.
pub const WORKER_COUNTS: [usize; 3] = [2, 3, 4];

/// Number of points on a size ladder: the top size and up to three halvings.
pub const LADDER_STEPS: u32 = 4;

/// The sweep for one workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepProfile {
    pub workload: WorkloadKind,
    /// Problem sizes, smallest first.
    pub sizes: Vec<usize>,
    /// Thread counts for the single-worker thread-pool variant.
    pub thread_counts: Vec<usize>,
    /// Sweep every loop schedule over a chunk ladder derived from the row
    /// count. Otherwise only [`Schedule::Auto`] runs.
    pub chunk_sweep: bool,
    /// Worker counts for the distributed variants.
    pub worker_counts: Vec<usize>,
    /// Include distributed accelerator runs.
    pub accelerator: bool,
}

impl SweepProfile {
    /// Threads per worker for the hybrid distributed + thread-pool variant:
    /// the host's threads shared across workers, at least two.
    pub fn hybrid_threads(&self, workers: usize, max_threads: usize) -> usize {
        (max_threads / workers.max(1)).max(2)
    }

    /// Loop schedules for the single-worker thread-pool variant at `size`.
    pub fn schedules(&self, size: usize) -> Vec<Schedule> {
        if !self.chunk_sweep {
            return vec![Schedule::Auto];
        }
        let chunks = chunk_ladder(size);
        let mut schedules = vec![Schedule::Auto, Schedule::Static { chunk: 0 }];
        schedules.extend(chunks.iter().map(|&chunk| Schedule::Static { chunk }));
        schedules.extend(chunks.iter().map(|&chunk| Schedule::Dynamic { chunk }));
        schedules.extend(chunks.iter().map(|&chunk| Schedule::Guided { chunk }));
        schedules
    }
}

/// Increasing sizes ending at `max`: `max / 8`, `max / 4`, `max / 2`, `max`,
/// without zeros or repeats.
pub fn size_ladder(max: usize) -> Vec<usize> {
    let mut sizes: Vec<usize> = (0..LADDER_STEPS)
        .rev()
        .map(|shift| max >> shift)
        .filter(|&n| n > 0)
        .collect();
    sizes.dedup();
    if sizes.is_empty() {
        sizes.push(max);
    }
    sizes
}

/// Chunk sizes in rows for `rows` rows: powers of two below `rows`, then
/// `rows` itself.
pub fn chunk_ladder(rows: usize) -> Vec<usize> {
    let mut chunks: Vec<usize> = std::iter::successors(Some(1usize), |c| c.checked_mul(2))
        .take_while(|&c| c < rows)
        .collect();
    if rows > 0 {
        chunks.push(rows);
    }
    chunks
}

/// Available hardware parallelism, never less than 2.
pub fn max_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .max(2)
}

/// Matmul sweep: every schedule and chunk at every thread count from 2 to
/// `max_threads`, for each matrix side in `dims`.
pub fn matmul_profile(dims: Vec<usize>, max_threads: usize, accelerator: bool) -> SweepProfile {
    SweepProfile {
        workload: WorkloadKind::Matmul,
        sizes: dims,
        thread_counts: (2..=max_threads.max(2)).collect(),
        chunk_sweep: true,
        worker_counts: WORKER_COUNTS.to_vec(),
        accelerator,
    }
}

/// Sort sweep: task-parallel sort at every thread count from 2 to
/// `max_threads`, for each length in `lens`.
pub fn sort_profile(lens: Vec<usize>, max_threads: usize, accelerator: bool) -> SweepProfile {
    SweepProfile {
        workload: WorkloadKind::Sort,
        sizes: lens,
        thread_counts: (2..=max_threads.max(2)).collect(),
        chunk_sweep: false,
        worker_counts: WORKER_COUNTS.to_vec(),
        accelerator,
    }
}

/// Profile for `kind` over a ladder ending at `size`, or the workload's
/// default size. With `fixed`, only the top size runs.
pub fn profile_for(
    kind: WorkloadKind,
    size: Option<usize>,
    fixed: bool,
    max_threads: usize,
    accelerator: bool,
) -> SweepProfile {
    let top = size.unwrap_or(match kind {
        WorkloadKind::Matmul => DEFAULT_MATMUL_DIM,
        WorkloadKind::Sort => DEFAULT_SORT_LEN,
    });
    let sizes = if fixed { vec![top] } else { size_ladder(top) };
    match kind {
        WorkloadKind::Matmul => matmul_profile(sizes, max_threads, accelerator),
        WorkloadKind::Sort => sort_profile(sizes, max_threads, accelerator),
    }
}

/// Parse a human-readable size string to a usize.
///
/// Supports:
/// - "1M" or "1m" -> 1_000_000
/// - "100K" or "100k" -> 100_000
/// - "10_000" -> 10_000
/// - "4" -> 4
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();

    // Handle suffix multipliers
    if let Some(prefix) = s.strip_suffix('M').or_else(|| s.strip_suffix('m')) {
        return scale_suffixed(s, prefix, 1_000_000.0);
    }

    if let Some(prefix) = s.strip_suffix('K').or_else(|| s.strip_suffix('k')) {
        return scale_suffixed(s, prefix, 1_000.0);
    }

    // Raw number (possibly with underscores)
    s.replace('_', "")
        .parse::<usize>()
        .map_err(|e| format!("Invalid size '{}': {}", s, e))
}

fn scale_suffixed(s: &str, prefix: &str, multiplier: f64) -> Result<usize, String> {
    let num: f64 = prefix
        .replace('_', "")
        .parse()
        .map_err(|e| format!("Invalid size '{}': {}", s, e))?;
    let value = num * multiplier;
    if !value.is_finite() || value < 0.0 || value > usize::MAX as f64 {
        return Err(format!("Invalid size '{}': out of range", s));
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("1M").unwrap(), 1_000_000);
        assert_eq!(parse_size("1m").unwrap(), 1_000_000);
        assert_eq!(parse_size("10K").unwrap(), 10_000);
        assert_eq!(parse_size("1.5k").unwrap(), 1_500);
    }

    #[test]
    fn test_parse_size_raw() {
        assert_eq!(parse_size("4").unwrap(), 4);
        assert_eq!(parse_size("10_000").unwrap(), 10_000);
        assert_eq!(parse_size("  64 ").unwrap(), 64);
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(parse_size("abc").is_err());
        assert!(parse_size("").is_err());
        assert!(parse_size("-3").is_err());
    }

    #[test]
    fn test_parse_size_suffix_out_of_range() {
        assert!(parse_size("-3k").is_err());
        assert!(parse_size("-0.5M").is_err());
        assert!(parse_size("1e30M").is_err());
        assert!(parse_size("infK").is_err());
        assert!(parse_size("NaNm").is_err());
    }

    #[test]
    fn test_size_ladder() {
        assert_eq!(size_ladder(4), vec![1, 2, 4]);
        assert_eq!(size_ladder(10_000), vec![1_250, 2_500, 5_000, 10_000]);
        assert_eq!(size_ladder(1), vec![1]);
        assert_eq!(size_ladder(0), vec![0]);
    }

    #[test]
    fn test_chunk_ladder() {
        assert_eq!(chunk_ladder(4), vec![1, 2, 4]);
        assert_eq!(chunk_ladder(5), vec![1, 2, 4, 5]);
        assert_eq!(chunk_ladder(1), vec![1]);
        assert!(chunk_ladder(0).is_empty());
    }

    #[test]
    fn test_profile_defaults() {
        let m = profile_for(WorkloadKind::Matmul, None, false, 4, false);
        assert_eq!(m.sizes, vec![1, 2, DEFAULT_MATMUL_DIM]);
        assert_eq!(m.thread_counts, vec![2, 3, 4]);
        assert_eq!(m.worker_counts, vec![2, 3, 4]);

        let s = profile_for(WorkloadKind::Sort, None, false, 4, true);
        assert_eq!(s.sizes.last(), Some(&DEFAULT_SORT_LEN));
        assert_eq!(s.sizes.len(), 4);
        assert_eq!(s.schedules(DEFAULT_SORT_LEN), vec![Schedule::Auto]);
        assert!(s.accelerator);
    }

    #[test]
    fn test_profile_size_override() {
        let p = profile_for(WorkloadKind::Sort, Some(800), false, 2, false);
        assert_eq!(p.sizes, vec![100, 200, 400, 800]);
        let p = profile_for(WorkloadKind::Sort, Some(800), true, 2, false);
        assert_eq!(p.sizes, vec![800]);
    }

    #[test]
    fn test_matmul_schedules_follow_row_count() {
        let p = matmul_profile(vec![4], 2, false);
        let schedules = p.schedules(4);
        // auto + even static + 3 chunks for each of static, dynamic, guided
        assert_eq!(schedules.len(), 2 + 3 * 3);
        assert!(schedules.contains(&Schedule::Dynamic { chunk: 4 }));
        assert!(schedules.contains(&Schedule::Guided { chunk: 2 }));
        assert_eq!(p.schedules(1).len(), 2 + 3);
    }

    #[test]
    fn test_single_core_host_still_sweeps_two_threads() {
        assert_eq!(matmul_profile(vec![4], 1, false).thread_counts, vec![2]);
    }

    #[test]
    fn test_hybrid_threads() {
        let p = sort_profile(vec![100], 8, false);
        assert_eq!(p.hybrid_threads(2, 8), 4);
        assert_eq!(p.hybrid_threads(4, 8), 2);
        assert_eq!(p.hybrid_threads(3, 4), 2);
    }

    #[test]
    fn test_profile_serializes() {
        let json = serde_json::to_string(&sort_profile(vec![10], 2, false)).unwrap();
        assert!(json.contains("\"workload\":\"sort\""));
        assert!(json.contains("\"sizes\":[10]"));
    }
}
