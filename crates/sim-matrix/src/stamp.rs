//! Staging buffers for parallel device loading.
//!
//! A matrix is single-writer. Device evaluation can still run on several
//! threads: each worker stamps into its own `StampBuffer`, and the buffers are
//! merged into the matrix one after another with [`Matrix::merge`].
//!
//! [`Matrix::merge`]: crate::Matrix::merge

use crate::element::ElementHandle;
use num_complex::Complex64;

#[derive(Debug, Clone, Default)]
pub struct StampBuffer {
    entries: Vec<(ElementHandle, Complex64)>,
}

impl StampBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Stage a real contribution.
    pub fn add(&mut self, handle: ElementHandle, value: f64) {
        self.entries.push((handle, Complex64::new(value, 0.0)));
    }

    pub fn add_complex(&mut self, handle: ElementHandle, re: f64, im: f64) {
        self.entries.push((handle, Complex64::new(re, im)));
    }

    /// Four-point conductance stamp: `+g` into both `diag` elements, `-g`
    /// into both `off_diag` elements.
    pub fn add_conductance(
        &mut self,
        diag: [ElementHandle; 2],
        off_diag: [ElementHandle; 2],
        g: f64,
    ) {
        for h in diag {
            self.add(h, g);
        }
        for h in off_diag {
            self.add(h, -g);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop staged values, keeping the allocation for the next iteration.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementHandle, Complex64)> + '_ {
        self.entries.iter().copied()
    }
}
