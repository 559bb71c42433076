//! Element store: the structural nonzero pattern and its values.
//!
//! Elements are kept in an arena and addressed by [`ElementHandle`], the
//! position of the element in that arena. Handles stay valid for the life of
//! the store; the pattern only grows.
//!
//! | Operation | Cost |
//! |-----------|------|
//! | `get_or_create()` | O(1) expected (per-column hash lookup) |
//! | `accumulate()` | O(1) |
//! | `diagonal()` | O(1) |
//! | `clear()` | O(nnz) |

use crate::error::{MatrixError, Result};
use num_complex::Complex64;
use std::collections::HashMap;

/// Stable identity of one structural nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(usize);

impl ElementHandle {
    /// Arena position. Handles are dense: `0..store.len()`.
    pub fn index(self) -> usize {
        self.0
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }
}

/// One structural nonzero in external coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub row: usize,
    pub col: usize,
    /// Imaginary part is kept at zero while the matrix is in real mode.
    pub value: Complex64,
}

/// Counters for monitoring stamping traffic.
#[derive(Debug, Clone, Default)]
pub struct ElementStoreStats {
    /// Number of elements created
    pub creates: usize,
    /// Number of `get_or_create()` calls that hit an existing element
    pub lookups: usize,
    /// Number of `clear()` calls
    pub clears: usize,
}

#[derive(Debug, Clone)]
pub struct ElementStore {
    size: usize,
    elements: Vec<Element>,
    /// index_map[col][row] = handle
    index_map: Vec<HashMap<usize, ElementHandle>>,
    diagonals: Vec<Option<ElementHandle>>,
    stats: ElementStoreStats,
}

impl ElementStore {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            elements: Vec::new(),
            index_map: vec![HashMap::new(); size],
            diagonals: vec![None; size],
            stats: ElementStoreStats::default(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of structural nonzeros.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn stats(&self) -> &ElementStoreStats {
        &self.stats
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.size {
            return Err(MatrixError::IndexOutOfRange {
                index,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Return the element at (row, col), creating a zero-valued one if absent.
    pub fn get_or_create(&mut self, row: usize, col: usize) -> Result<ElementHandle> {
        self.check_index(row)?;
        self.check_index(col)?;

        if let Some(&handle) = self.index_map[col].get(&row) {
            self.stats.lookups += 1;
            return Ok(handle);
        }

        let handle = ElementHandle(self.elements.len());
        self.elements.push(Element {
            row,
            col,
            value: Complex64::new(0.0, 0.0),
        });
        self.index_map[col].insert(row, handle);
        if row == col {
            self.diagonals[row] = Some(handle);
        }
        self.stats.creates += 1;
        Ok(handle)
    }

    pub fn find(&self, row: usize, col: usize) -> Option<ElementHandle> {
        self.index_map.get(col)?.get(&row).copied()
    }

    pub fn diagonal(&self, index: usize) -> Option<ElementHandle> {
        self.diagonals.get(index).copied().flatten()
    }

    pub fn element(&self, handle: ElementHandle) -> &Element {
        &self.elements[handle.0]
    }

    pub fn value(&self, handle: ElementHandle) -> Complex64 {
        self.elements[handle.0].value
    }

    pub fn set_value(&mut self, handle: ElementHandle, value: Complex64) {
        self.elements[handle.0].value = value;
    }

    pub fn accumulate(&mut self, handle: ElementHandle, value: Complex64) {
        self.elements[handle.0].value += value;
    }

    /// Zero every value; the pattern is untouched.
    pub fn clear(&mut self) {
        for element in &mut self.elements {
            element.value = Complex64::new(0.0, 0.0);
        }
        self.stats.clears += 1;
    }

    /// Drop the imaginary part of every value.
    pub fn discard_imaginary(&mut self) {
        for element in &mut self.elements {
            element.value.im = 0.0;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementHandle, &Element)> + '_ {
        self.elements
            .iter()
            .enumerate()
            .map(|(index, element)| (ElementHandle(index), element))
    }

    /// Handles of every element in external column `col`, in no particular order.
    pub fn column(&self, col: usize) -> impl Iterator<Item = ElementHandle> + '_ {
        self.index_map
            .get(col)
            .into_iter()
            .flat_map(|rows| rows.values().copied())
    }

    /// Handles of every element in external row `row`. O(nnz).
    pub fn row(&self, row: usize) -> impl Iterator<Item = ElementHandle> + '_ {
        self.iter()
            .filter(move |(_, element)| element.row == row)
            .map(|(handle, _)| handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut store = ElementStore::new(3);
        let a = store.get_or_create(0, 1).unwrap();
        let b = store.get_or_create(0, 1).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().creates, 1);
        assert_eq!(store.stats().lookups, 1);
    }

    #[test]
    fn test_out_of_range() {
        let mut store = ElementStore::new(2);
        assert_eq!(
            store.get_or_create(2, 0),
            Err(MatrixError::IndexOutOfRange { index: 2, size: 2 })
        );
    }

    #[test]
    fn test_accumulate_and_clear() {
        let mut store = ElementStore::new(2);
        let h = store.get_or_create(1, 1).unwrap();
        store.accumulate(h, Complex64::new(1.5, 0.0));
        store.accumulate(h, Complex64::new(2.0, -1.0));
        assert_eq!(store.value(h), Complex64::new(3.5, -1.0));

        store.clear();
        assert_eq!(store.value(h), Complex64::new(0.0, 0.0));
        assert_eq!(store.len(), 1, "clear must keep the pattern");
    }

    #[test]
    fn test_diagonal_lookup() {
        let mut store = ElementStore::new(3);
        store.get_or_create(0, 1).unwrap();
        let d = store.get_or_create(2, 2).unwrap();
        assert_eq!(store.diagonal(2), Some(d));
        assert_eq!(store.diagonal(0), None);
        assert_eq!(store.diagonal(7), None);
    }

    #[test]
    fn test_row_and_column_iteration() {
        let mut store = ElementStore::new(3);
        let a = store.get_or_create(0, 2).unwrap();
        let b = store.get_or_create(1, 2).unwrap();
        let c = store.get_or_create(1, 0).unwrap();

        let mut col: Vec<_> = store.column(2).collect();
        col.sort();
        assert_eq!(col, vec![a, b]);

        let row: Vec<_> = store.row(1).collect();
        assert_eq!(row, vec![b, c]);
    }
}
