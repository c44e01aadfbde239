//! K-way merge of individually sorted runs.
//!
//! After the sort path gathers W locally sorted shards into their canonical
//! regions, one pass over a min-heap of run heads produces the globally
//! sorted sequence in O(N log W) comparisons. Equal values from different
//! runs come out in heap order; cross-shard stability is not preserved.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::plan::ShardTable;

/// Merge already-sorted runs into one ascending sequence.
///
/// Empty runs are skipped. If any run is not sorted ascending the output is
/// still a permutation of the inputs but is not guaranteed to be sorted.
pub fn merge_sorted_runs<T: Ord + Copy>(runs: &[&[T]]) -> Vec<T> {
    let total: usize = runs.iter().map(|r| r.len()).sum();
    let mut out = Vec::with_capacity(total);

    // (head value, run index, element index)
    let mut heap: BinaryHeap<Reverse<(T, usize, usize)>> = BinaryHeap::with_capacity(runs.len());
    for (run, data) in runs.iter().enumerate() {
        if let Some(&head) = data.first() {
            heap.push(Reverse((head, run, 0)));
        }
    }

    while let Some(Reverse((value, run, idx))) = heap.pop() {
        out.push(value);
        let next = idx + 1;
        if let Some(&v) = runs[run].get(next) {
            heap.push(Reverse((v, run, next)));
        }
    }

    out
}

/// Merge the sorted regions of `data` laid out by `table`.
///
/// # Panics
/// Panics if `data.len() != table.total()`.
pub fn merge_regions<T: Ord + Copy>(data: &[T], table: &ShardTable) -> Vec<T> {
    let regions = table.regions(data);
    merge_sorted_runs(&regions)
}
