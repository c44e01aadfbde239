//! Flat datasets and row-major square matrices.

use serde::{Deserialize, Serialize};

/// Fixed-width integer carried by every dataset.
pub type Element = i32;

/// Square `dim x dim` matrix stored as one flat row-major buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    dim: usize,
    data: Vec<Element>,
}

impl Matrix {
    /// Zero-filled `dim x dim` matrix.
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            data: vec![0; dim * dim],
        }
    }

    /// Wrap an existing row-major buffer.
    ///
    /// # Panics
    /// Panics if `data.len() != dim * dim`.
    pub fn from_vec(dim: usize, data: Vec<Element>) -> Self {
        assert_eq!(
            data.len(),
            dim * dim,
            "Data length {} doesn't match {}x{} matrix",
            data.len(),
            dim,
            dim
        );
        Self { dim, data }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, row: usize, col: usize) -> Element {
        self.data[row * self.dim + col]
    }

    pub fn row(&self, row: usize) -> &[Element] {
        &self.data[row * self.dim..(row + 1) * self.dim]
    }

    pub fn as_slice(&self) -> &[Element] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Element] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<Element> {
        self.data
    }
}

/// Render a matrix one bracketed row per line, for debug logging.
pub fn format_matrix(m: &Matrix) -> String {
    let mut out = String::new();
    for r in 0..m.dim() {
        let row: Vec<String> = m.row(r).iter().map(|v| v.to_string()).collect();
        out.push('[');
        out.push_str(&row.join(", "));
        out.push_str("]\n");
    }
    out
}
