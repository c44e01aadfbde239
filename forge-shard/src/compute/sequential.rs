//! Single-threaded kernels: row-block matrix product and iterative quicksort.
//!
//! These are also the leaf kernels of the thread-pool backend, which splits
//! work across threads and calls into here for each piece.

use std::cmp::Ordering;

use crate::dataset::Element;
use crate::error::Result;

use super::LocalCompute;

/// Ranges at or below this length are finished with insertion sort.
const INSERTION_CUTOFF: usize = 16;

/// Multiply a block of full rows by a `dim x dim` operand.
///
/// `rows` holds `k` rows of `dim` elements, `out` receives the `k` product
/// rows. Each output cell accumulates into a private scalar and is written
/// exactly once. Arithmetic wraps on overflow.
pub fn multiply_rows(rows: &[Element], operand: &[Element], dim: usize, out: &mut [Element]) {
    debug_assert_eq!(rows.len(), out.len());
    debug_assert_eq!(operand.len(), dim * dim);
    if dim == 0 {
        return;
    }

    for (a_row, c_row) in rows.chunks_exact(dim).zip(out.chunks_exact_mut(dim)) {
        for (col, cell) in c_row.iter_mut().enumerate() {
            let mut acc: Element = 0;
            for (k, &a) in a_row.iter().enumerate() {
                acc = acc.wrapping_add(a.wrapping_mul(operand[k * dim + col]));
            }
            *cell = acc;
        }
    }
}

/// Median of the first, middle and last elements.
pub(crate) fn median_of_three<T: Ord + Copy>(v: &[T]) -> T {
    let a = v[0];
    let b = v[v.len() / 2];
    let c = v[v.len() - 1];
    a.min(b).max(a.max(b).min(c))
}

/// Three-way partition around `pivot`.
///
/// Returns `(lt, gt)` such that `v[..lt] < pivot`, `v[lt..gt] == pivot`
/// and `v[gt..] > pivot`.
pub(crate) fn partition3<T: Ord + Copy>(v: &mut [T], pivot: T) -> (usize, usize) {
    let mut lt = 0;
    let mut i = 0;
    let mut gt = v.len();
    while i < gt {
        match v[i].cmp(&pivot) {
            Ordering::Less => {
                v.swap(lt, i);
                lt += 1;
                i += 1;
            }
            Ordering::Greater => {
                gt -= 1;
                v.swap(i, gt);
            }
            Ordering::Equal => i += 1,
        }
    }
    (lt, gt)
}

fn insertion_sort<T: Ord + Copy>(v: &mut [T]) {
    for i in 1..v.len() {
        let x = v[i];
        let mut j = i;
        while j > 0 && v[j - 1] > x {
            v[j] = v[j - 1];
            j -= 1;
        }
        v[j] = x;
    }
}

/// Iterative quicksort with an explicit range stack.
///
/// Median-of-three pivots and three-way partitioning keep low-cardinality
/// inputs (e.g. values drawn from `[0, 10]`) from degrading to quadratic
/// time. The smaller side is always processed first, bounding the stack at
/// O(log n).
pub fn quicksort<T: Ord + Copy>(data: &mut [T]) {
    let mut stack: Vec<(usize, usize)> = vec![(0, data.len())];

    while let Some((lo, hi)) = stack.pop() {
        let range = &mut data[lo..hi];
        if range.len() <= INSERTION_CUTOFF {
            insertion_sort(range);
            continue;
        }

        let pivot = median_of_three(range);
        let (lt, gt) = partition3(range, pivot);

        let left = (lo, lo + lt);
        let right = (lo + gt, hi);
        let (larger, smaller) = if left.1 - left.0 >= right.1 - right.0 {
            (left, right)
        } else {
            (right, left)
        };
        if larger.1 - larger.0 > 1 {
            stack.push(larger);
        }
        if smaller.1 - smaller.0 > 1 {
            stack.push(smaller);
        }
    }
}

/// Single-threaded compute backend.
#[derive(Debug, Default)]
pub struct SequentialCompute;

impl LocalCompute for SequentialCompute {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn threads(&self) -> usize {
        1
    }

    fn multiply(&mut self, rows: &[Element], operand: &[Element], dim: usize) -> Result<Vec<Element>> {
        super::check_operand(operand, dim)?;
        let mut out = vec![0; rows.len()];
        multiply_rows(rows, operand, dim, &mut out);
        Ok(out)
    }

    fn sort(&mut self, shard: &mut [Element]) -> Result<()> {
        quicksort(shard);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply_rows_identity() {
        let a = vec![1, 2, 3, 4];
        let id = vec![1, 0, 0, 1];
        let mut out = vec![0; 4];
        multiply_rows(&a, &id, 2, &mut out);
        assert_eq!(out, a);
    }

    #[test]
    fn test_multiply_rows_partial_block() {
        // Second row of [[1,2],[3,4]] times [[5,6],[7,8]]
        let row = vec![3, 4];
        let b = vec![5, 6, 7, 8];
        let mut out = vec![0; 2];
        multiply_rows(&row, &b, 2, &mut out);
        assert_eq!(out, vec![3 * 5 + 4 * 7, 3 * 6 + 4 * 8]);
    }

    #[test]
    fn test_multiply_rows_wraps() {
        let a = vec![i32::MAX];
        let b = vec![2];
        let mut out = vec![0; 1];
        multiply_rows(&a, &b, 1, &mut out);
        assert_eq!(out[0], i32::MAX.wrapping_mul(2));
    }

    #[test]
    fn test_quicksort_basic() {
        let mut v = vec![5, 3, 8, 1, 9, 2, 7, 4, 6, 0];
        quicksort(&mut v);
        assert_eq!(v, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_quicksort_empty_and_single() {
        let mut empty: Vec<i32> = vec![];
        quicksort(&mut empty);
        assert!(empty.is_empty());

        let mut one = vec![42];
        quicksort(&mut one);
        assert_eq!(one, vec![42]);
    }

    #[test]
    fn test_quicksort_low_cardinality() {
        let mut v: Vec<i32> = (0..10_000).map(|i| (i * 7919) % 11).collect();
        let mut expected = v.clone();
        expected.sort_unstable();
        quicksort(&mut v);
        assert_eq!(v, expected);
    }

    #[test]
    fn test_quicksort_reverse_and_negative() {
        let mut v: Vec<i32> = (-500..500).rev().collect();
        quicksort(&mut v);
        assert_eq!(v, (-500..500).collect::<Vec<_>>());
    }

    #[test]
    fn test_partition3_bands() {
        let mut v = vec![3, 1, 2, 3, 5, 3, 0];
        let (lt, gt) = partition3(&mut v, 3);
        assert!(v[..lt].iter().all(|&x| x < 3));
        assert!(v[lt..gt].iter().all(|&x| x == 3));
        assert!(v[gt..].iter().all(|&x| x > 3));
        assert_eq!(gt - lt, 3);
    }

    #[test]
    fn test_median_of_three() {
        assert_eq!(median_of_three(&[1, 9, 5]), 5);
        assert_eq!(median_of_three(&[9, 1, 5]), 5);
        assert_eq!(median_of_three(&[5, 5, 1]), 5);
    }

    #[test]
    fn test_sequential_backend_empty_shard() {
        let mut backend = SequentialCompute;
        let mut shard: Vec<i32> = vec![];
        backend.sort(&mut shard).unwrap();
        let out = backend.multiply(&[], &[1, 2, 3, 4], 2).unwrap();
        assert!(out.is_empty());
    }
}
