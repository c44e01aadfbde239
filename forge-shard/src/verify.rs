//! Result verification.
//!
//! Pure functions of their inputs: calling them twice gives the same
//! verdict, and a failed check is returned as data rather than an error.

use std::fmt;

use serde::Serialize;

use crate::dataset::Element;

/// Which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Check {
    /// Output length differs from the expected length.
    Length,
    /// Adjacent sort outputs are out of order.
    Order,
    /// Sort output is not a permutation of the input.
    Multiset,
    /// A product cell differs from the reference.
    Cell,
}

/// First point at which a result disagrees with what was expected.
///
/// `position` is an index into the output, except for [`Check::Multiset`]
/// where it indexes the sorted input and output side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectnessMismatch {
    pub check: Check,
    pub position: usize,
    pub expected: i64,
    pub actual: i64,
}

impl fmt::Display for CorrectnessMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.check {
            Check::Length => write!(
                f,
                "output has {} elements, expected {}",
                self.actual, self.expected
            ),
            Check::Order => write!(
                f,
                "out of order at {}: {} follows {}",
                self.position, self.actual, self.expected
            ),
            Check::Multiset => write!(
                f,
                "not a permutation of the input: sorted position {} holds {}, expected {}",
                self.position, self.actual, self.expected
            ),
            Check::Cell => write!(
                f,
                "cell {} is {}, expected {}",
                self.position, self.actual, self.expected
            ),
        }
    }
}

/// Outcome of verifying one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Correct,
    Mismatch(CorrectnessMismatch),
}

impl Verdict {
    pub fn is_correct(&self) -> bool {
        matches!(self, Verdict::Correct)
    }

    pub fn mismatch(&self) -> Option<&CorrectnessMismatch> {
        match self {
            Verdict::Correct => None,
            Verdict::Mismatch(m) => Some(m),
        }
    }
}

fn length_check(expected: usize, actual: usize) -> Option<CorrectnessMismatch> {
    (expected != actual).then(|| CorrectnessMismatch {
        check: Check::Length,
        position: 0,
        expected: expected as i64,
        actual: actual as i64,
    })
}

/// Index of the first element smaller than its predecessor.
pub fn first_unsorted(data: &[Element]) -> Option<usize> {
    data.windows(2).position(|w| w[0] > w[1]).map(|i| i + 1)
}

/// Check that `output` is non-decreasing and a permutation of `input`.
pub fn verify_sort(input: &[Element], output: &[Element]) -> Verdict {
    if let Some(m) = length_check(input.len(), output.len()) {
        return Verdict::Mismatch(m);
    }

    if let Some(i) = first_unsorted(output) {
        return Verdict::Mismatch(CorrectnessMismatch {
            check: Check::Order,
            position: i,
            expected: i64::from(output[i - 1]),
            actual: i64::from(output[i]),
        });
    }

    let mut reference = input.to_vec();
    reference.sort_unstable();
    // `output` is already sorted here, so a positional compare is a
    // multiset compare.
    match reference.iter().zip(output).position(|(r, o)| r != o) {
        None => Verdict::Correct,
        Some(i) => Verdict::Mismatch(CorrectnessMismatch {
            check: Check::Multiset,
            position: i,
            expected: i64::from(reference[i]),
            actual: i64::from(output[i]),
        }),
    }
}

/// Independent triple-loop product of two `dim x dim` row-major matrices.
pub fn reference_product(a: &[Element], b: &[Element], dim: usize) -> Vec<Element> {
    let mut c = vec![0; dim * dim];
    for i in 0..dim {
        for j in 0..dim {
            let mut sum: Element = 0;
            for k in 0..dim {
                sum = sum.wrapping_add(a[i * dim + k].wrapping_mul(b[k * dim + j]));
            }
            c[i * dim + j] = sum;
        }
    }
    c
}

/// Compare `product` with the reference product of `a` and `b`, cell by
/// cell.
pub fn verify_product(a: &[Element], b: &[Element], dim: usize, product: &[Element]) -> Verdict {
    if let Some(m) = length_check(dim * dim, product.len()) {
        return Verdict::Mismatch(m);
    }

    let reference = reference_product(a, b, dim);
    match reference.iter().zip(product).position(|(r, p)| r != p) {
        None => Verdict::Correct,
        Some(i) => Verdict::Mismatch(CorrectnessMismatch {
            check: Check::Cell,
            position: i,
            expected: i64::from(reference[i]),
            actual: i64::from(product[i]),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_correct() {
        let input = vec![3, 1, 2, 1];
        assert_eq!(verify_sort(&input, &[1, 1, 2, 3]), Verdict::Correct);
    }

    #[test]
    fn test_sort_out_of_order() {
        let verdict = verify_sort(&[1, 2, 3], &[1, 3, 2]);
        let m = verdict.mismatch().unwrap();
        assert_eq!(m.check, Check::Order);
        assert_eq!(m.position, 2);
        assert_eq!((m.expected, m.actual), (3, 2));
    }

    #[test]
    fn test_sort_not_permutation() {
        // Sorted, but a 2 was replaced by a 1.
        let verdict = verify_sort(&[2, 1, 3], &[1, 1, 3]);
        let m = verdict.mismatch().unwrap();
        assert_eq!(m.check, Check::Multiset);
        assert_eq!(m.position, 1);
        assert_eq!((m.expected, m.actual), (2, 1));
    }

    #[test]
    fn test_sort_length() {
        let verdict = verify_sort(&[1, 2, 3], &[1, 2]);
        assert_eq!(verdict.mismatch().unwrap().check, Check::Length);
    }

    #[test]
    fn test_sort_empty() {
        assert!(verify_sort(&[], &[]).is_correct());
    }

    #[test]
    fn test_reference_product() {
        let a = vec![1, 2, 3, 4];
        let b = vec![5, 6, 7, 8];
        assert_eq!(reference_product(&a, &b, 2), vec![19, 22, 43, 50]);
    }

    #[test]
    fn test_product_cell_mismatch() {
        let a = vec![1, 2, 3, 4];
        let b = vec![5, 6, 7, 8];
        let verdict = verify_product(&a, &b, 2, &[19, 22, 42, 50]);
        let m = verdict.mismatch().unwrap();
        assert_eq!(m.check, Check::Cell);
        assert_eq!(m.position, 2);
        assert_eq!(m.to_string(), "cell 2 is 42, expected 43");
    }

    #[test]
    fn test_verification_is_idempotent() {
        let input = vec![5, 4, 4, 9];
        let output = vec![4, 5, 4, 9];
        let first = verify_sort(&input, &output);
        let second = verify_sort(&input, &output);
        assert_eq!(first, second);
        assert!(!first.is_correct());

        let a = vec![2; 9];
        let b = vec![3; 9];
        let c = reference_product(&a, &b, 3);
        assert_eq!(verify_product(&a, &b, 3, &c), verify_product(&a, &b, 3, &c));
        assert!(verify_product(&a, &b, 3, &c).is_correct());
    }
}
