//! Compressed sparse column storage.
//!
//! Values are kept as a flat `f64` array with a per-matrix stride: one slot per
//! nonzero for real matrices, two interleaved slots (re, im) for complex ones.
//! Slot `k * stride` therefore belongs to the `k`-th entry of `row_idx`.

use crate::error::{MatrixError, Result};
use crate::scalar::Scalar;
use num_complex::Complex64;

#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix {
    n: usize,
    /// Column pointers, length n+1
    pub col_ptr: Vec<usize>,
    /// Row indices, length nnz, ascending within each column
    pub row_idx: Vec<usize>,
    /// Interleaved values, length nnz * stride
    pub values: Vec<f64>,
    stride: usize,
}

impl CscMatrix {
    pub(crate) fn from_parts(
        n: usize,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        stride: usize,
    ) -> Self {
        let values = vec![0.0; row_idx.len() * stride];
        Self {
            n,
            col_ptr,
            row_idx,
            values,
            stride,
        }
    }

    /// Build from raw arrays, checking the structural invariants.
    pub fn new(
        n: usize,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        values: Vec<f64>,
        stride: usize,
    ) -> Result<Self> {
        let matrix = Self {
            n,
            col_ptr,
            row_idx,
            values,
            stride,
        };
        if !(stride == 1 || stride == 2) || !matrix.is_valid() {
            return Err(MatrixError::DimensionMismatch {
                expected: matrix.row_idx.len() * stride,
                actual: matrix.values.len(),
            });
        }
        Ok(matrix)
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.row_idx.len()
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn is_complex(&self) -> bool {
        self.stride == 2
    }

    /// Value of entry `k` read as `T`. `T::STRIDE` must not exceed the
    /// storage stride; reading a complex matrix as `f64` yields real parts.
    #[inline]
    pub fn entry<T: Scalar>(&self, k: usize) -> T {
        T::load(&self.values[k * self.stride..])
    }

    pub fn entry_complex(&self, k: usize) -> Complex64 {
        if self.stride == 2 {
            Complex64::new(self.values[2 * k], self.values[2 * k + 1])
        } else {
            Complex64::new(self.values[k], 0.0)
        }
    }

    /// Check the structural invariants: `col_ptr` non-decreasing and ending at
    /// nnz, rows strictly increasing within each column and below n.
    pub fn is_valid(&self) -> bool {
        if self.col_ptr.len() != self.n + 1 || self.col_ptr[0] != 0 {
            return false;
        }
        if self.col_ptr[self.n] != self.row_idx.len() {
            return false;
        }
        if self.values.len() != self.row_idx.len() * self.stride {
            return false;
        }
        for col in 0..self.n {
            let (start, end) = (self.col_ptr[col], self.col_ptr[col + 1]);
            if start > end || end > self.row_idx.len() {
                return false;
            }
            let rows = &self.row_idx[start..end];
            if rows.iter().any(|&r| r >= self.n) {
                return false;
            }
            if rows.windows(2).any(|w| w[0] >= w[1]) {
                return false;
            }
        }
        true
    }

    /// Re-lay the value array for a new stride. Switching to complex zeroes the
    /// imaginary parts; switching to real drops them.
    pub(crate) fn set_stride(&mut self, stride: usize) {
        if stride == self.stride {
            return;
        }
        let nnz = self.nnz();
        let mut values = vec![0.0; nnz * stride];
        for k in 0..nnz {
            values[k * stride] = self.values[k * self.stride];
        }
        self.values = values;
        self.stride = stride;
    }

    pub fn clear_values(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0.0);
    }

    pub fn scale(&mut self, factor: f64) {
        self.values.iter_mut().for_each(|v| *v *= factor);
    }

    /// y = A·x with every operand in this matrix's own index space.
    pub fn multiply<T: Scalar>(&self, x: &[T]) -> Vec<T> {
        let mut y = vec![T::ZERO; self.n];
        for col in 0..self.n {
            let xc = x[col];
            for k in self.col_ptr[col]..self.col_ptr[col + 1] {
                y[self.row_idx[k]] += self.entry::<T>(k) * xc;
            }
        }
        y
    }
}
