//! COO → CSC index compression with element binding.
//!
//! Runs once per nonzero pattern. The output is a [`CompiledPattern`]: the CSC
//! structure plus a binding table mapping every [`ElementHandle`] to the slot of
//! its value in the CSC value array, so later stamps write straight into the
//! array the LU backend reads.
//!
//! # Algorithm
//!
//! ```text
//! 1. Collect (row, col, source) triples                O(nz)
//! 2. Sort by column, then row                           O(nz log nz)
//! 3. col_ptr[j] = first position whose column >= j      O(nz + n)
//! 4. Emit row indices and one binding per entry         O(nz)
//! 5. Sort bindings by source handle                     O(nz log nz)
//! ```
//!
//! Step 3 is a single monotone pass, so runs of empty columns get repeated
//! pointers and an empty pattern yields `col_ptr = [0; n + 1]`.

use crate::csc::CscMatrix;
use crate::element::ElementHandle;
use crate::error::{MatrixError, Result};

/// One declared nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinate {
    pub row: usize,
    pub col: usize,
    pub source: ElementHandle,
}

/// Element → CSC value slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub source: ElementHandle,
    /// Offset of the real part in `CscMatrix::values`; the imaginary part,
    /// when present, follows at `dest + 1`.
    pub dest: usize,
}

/// A frozen nonzero pattern with its value storage.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub csc: CscMatrix,
    /// Sorted by `source`.
    bindings: Vec<Binding>,
}

impl CompiledPattern {
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Binding of `handle`, if the element was part of the compiled pattern.
    pub fn binding(&self, handle: ElementHandle) -> Option<Binding> {
        match self.bindings.get(handle.index()) {
            Some(b) if b.source == handle => Some(*b),
            _ => self
                .bindings
                .binary_search_by_key(&handle, |b| b.source)
                .ok()
                .map(|pos| self.bindings[pos]),
        }
    }

    pub fn stride(&self) -> usize {
        self.csc.stride()
    }

    pub(crate) fn set_stride(&mut self, stride: usize) {
        if stride == self.csc.stride() {
            return;
        }
        for binding in &mut self.bindings {
            binding.dest = binding.dest / self.csc.stride() * stride;
        }
        self.csc.set_stride(stride);
    }
}

/// Build the CSC structure and binding table for an n×n pattern.
///
/// `stride` is 1 for real and 2 for complex value storage. Fails with
/// `PatternViolation` if two coordinates coincide and with `IndexOutOfRange`
/// if a coordinate lies outside the matrix.
pub fn compress(n: usize, mut coords: Vec<Coordinate>, stride: usize) -> Result<CompiledPattern> {
    if let Some(c) = coords.iter().find(|c| c.row >= n || c.col >= n) {
        return Err(MatrixError::IndexOutOfRange {
            index: c.row.max(c.col),
            size: n,
        });
    }

    coords.sort_by_key(|c| (c.col, c.row));

    if let Some(w) = coords
        .windows(2)
        .find(|w| w[0].col == w[1].col && w[0].row == w[1].row)
    {
        return Err(MatrixError::PatternViolation {
            row: w[0].row,
            col: w[0].col,
        });
    }

    let nz = coords.len();
    let mut col_ptr = vec![0usize; n + 1];
    let mut pos = 0usize;
    for (j, ptr) in col_ptr.iter_mut().enumerate() {
        while pos < nz && coords[pos].col < j {
            pos += 1;
        }
        *ptr = pos;
    }

    let mut row_idx = Vec::with_capacity(nz);
    let mut bindings = Vec::with_capacity(nz);
    for (k, c) in coords.iter().enumerate() {
        row_idx.push(c.row);
        bindings.push(Binding {
            source: c.source,
            dest: k * stride,
        });
    }
    bindings.sort_by_key(|b| b.source);

    log::debug!(
        "compressed {}x{} pattern: nnz={}, stride={}",
        n,
        n,
        nz,
        stride
    );

    Ok(CompiledPattern {
        csc: CscMatrix::from_parts(n, col_ptr, row_idx, stride),
        bindings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(row: usize, col: usize, source: usize) -> Coordinate {
        Coordinate {
            row,
            col,
            source: ElementHandle::from_index(source),
        }
    }

    #[test]
    fn test_compress_sorts_and_binds() {
        // Declared out of order on purpose
        let coords = vec![coord(2, 1, 0), coord(0, 0, 1), coord(1, 1, 2), coord(0, 2, 3)];
        let compiled = compress(3, coords, 1).unwrap();

        assert!(compiled.csc.is_valid());
        assert_eq!(compiled.csc.col_ptr, vec![0, 1, 3, 4]);
        assert_eq!(compiled.csc.row_idx, vec![0, 1, 2, 0]);

        // source 0 is (2, 1) → third entry
        assert_eq!(compiled.binding(ElementHandle::from_index(0)).unwrap().dest, 2);
        assert_eq!(compiled.binding(ElementHandle::from_index(1)).unwrap().dest, 0);
    }

    #[test]
    fn test_compress_empty_columns() {
        let coords = vec![coord(3, 3, 0), coord(0, 0, 1)];
        let compiled = compress(4, coords, 1).unwrap();
        assert_eq!(compiled.csc.col_ptr, vec![0, 1, 1, 1, 2]);
    }

    #[test]
    fn test_compress_nothing() {
        let compiled = compress(5, Vec::new(), 2).unwrap();
        assert_eq!(compiled.csc.col_ptr, vec![0; 6]);
        assert!(compiled.csc.is_valid());
    }

    #[test]
    fn test_complex_stride() {
        let coords = vec![coord(1, 0, 0), coord(0, 0, 1)];
        let compiled = compress(2, coords, 2).unwrap();
        assert_eq!(compiled.csc.values.len(), 4);
        assert_eq!(compiled.binding(ElementHandle::from_index(0)).unwrap().dest, 2);
        assert_eq!(compiled.binding(ElementHandle::from_index(1)).unwrap().dest, 0);
    }

    #[test]
    fn test_duplicate_rejected() {
        let coords = vec![coord(1, 1, 0), coord(1, 1, 1)];
        assert_eq!(
            compress(2, coords, 1).unwrap_err(),
            MatrixError::PatternViolation { row: 1, col: 1 }
        );
    }
}
