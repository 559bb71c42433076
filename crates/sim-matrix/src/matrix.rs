//! The system matrix: element storage, index bookkeeping, backend dispatch,
//! solves and determinants.
//!
//! # Lifecycle
//!
//! ```text
//! get_or_create_element()  (topology setup, once)
//! preorder()               (optional, before the pattern is compiled)
//! loop per Newton iteration:
//!     clear_values()
//!     accumulate() / merge()
//!     add_to_all_diagonals(gmin)
//!     reorder() on the first pass, factorize() afterwards
//!     solve()
//! ```
//!
//! The precompiled backend freezes the pattern into CSC form at its first
//! factorization. From then on values are written straight into the CSC value
//! array through the binding table. Creating a new element afterwards thaws the
//! pattern: values are copied back, the compiled form is dropped and the next
//! factorization analyzes again.

use crate::backend::{create_backend, BackendKind, BackendStats, SolverBackend, SystemView};
use crate::compress::{compress, CompiledPattern, Coordinate};
use crate::determinant::{Base2Determinant, Determinant};
use crate::element::{ElementHandle, ElementStore, ElementStoreStats};
use crate::error::{FactorStatus, MatrixError, Result};
use crate::options::{MatrixConfig, MatrixOptions};
use crate::permutation::{mna_preorder, PermutationTracker};
use crate::scalar::Scalar;
use crate::stamp::StampBuffer;
use num_complex::Complex64;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FactorState {
    Unfactored,
    Factored,
    Empty,
    /// External coordinates of the failing pivot
    Singular { row: usize, col: usize },
}

/// Sparse n×n system matrix with 0-based external indices.
#[derive(Debug)]
pub struct Matrix {
    size: usize,
    is_complex: bool,
    config: MatrixConfig,
    elements: ElementStore,
    tracker: PermutationTracker,
    /// Present once the pattern is frozen; values then live in its CSC array.
    compiled: Option<CompiledPattern>,
    backend: Box<dyn SolverBackend>,
    state: FactorState,
}

impl Matrix {
    /// Real matrix with the default configuration.
    pub fn new(size: usize) -> Self {
        Self::with_config(size, false, MatrixConfig::default())
    }

    pub fn new_complex(size: usize) -> Self {
        Self::with_config(size, true, MatrixConfig::default())
    }

    pub fn with_backend(size: usize, is_complex: bool, backend: BackendKind) -> Self {
        Self::with_config(size, is_complex, MatrixConfig::with_backend(backend))
    }

    pub fn from_options(size: usize, is_complex: bool, options: &MatrixOptions) -> Self {
        Self::with_config(size, is_complex, MatrixConfig::from_options(options))
    }

    pub fn with_config(size: usize, is_complex: bool, config: MatrixConfig) -> Self {
        log::debug!(
            "new {} matrix: size={}, backend={}",
            if is_complex { "complex" } else { "real" },
            size,
            config.backend.name()
        );
        let backend = create_backend(&config);
        Self {
            size,
            is_complex,
            config,
            elements: ElementStore::new(size),
            tracker: PermutationTracker::new(size),
            compiled: None,
            backend,
            state: FactorState::Unfactored,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of structural nonzeros.
    pub fn nnz(&self) -> usize {
        self.elements.len()
    }

    pub fn is_complex(&self) -> bool {
        self.is_complex
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    pub fn tracker(&self) -> &PermutationTracker {
        &self.tracker
    }

    pub fn element_stats(&self) -> &ElementStoreStats {
        self.elements.stats()
    }

    /// Factorization counters of the active backend.
    pub fn backend_stats(&self) -> BackendStats {
        self.backend.stats()
    }

    pub fn compiled(&self) -> Option<&CompiledPattern> {
        self.compiled.as_ref()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Whether the last reorder/factorize succeeded.
    pub fn is_factored(&self) -> bool {
        matches!(self.state, FactorState::Factored | FactorState::Empty)
    }

    /// Switch between real and complex values. Real parts are kept; imaginary
    /// parts start at zero or are dropped. Any factorization is discarded.
    pub fn set_complex(&mut self, is_complex: bool) {
        if is_complex == self.is_complex {
            return;
        }
        self.is_complex = is_complex;
        if !is_complex {
            self.elements.discard_imaginary();
        }
        if let Some(compiled) = &mut self.compiled {
            compiled.set_stride(if is_complex { 2 } else { 1 });
        }
        self.backend.invalidate_numeric();
        self.state = FactorState::Unfactored;
    }

    // ------------------------------------------------------------------------
    // Elements
    // ------------------------------------------------------------------------

    /// Handle of the element at external (row, col), created zero-valued if
    /// absent. Creating one on a frozen pattern thaws it.
    pub fn get_or_create_element(&mut self, row: usize, col: usize) -> Result<ElementHandle> {
        let existed = self.elements.find(row, col).is_some();
        let handle = self.elements.get_or_create(row, col)?;
        if !existed && self.compiled.is_some() {
            log::warn!(
                "element ({}, {}) created after the pattern was compiled; recompiling",
                row,
                col
            );
            self.thaw();
        }
        Ok(handle)
    }

    pub fn find_element(&self, row: usize, col: usize) -> Option<ElementHandle> {
        self.elements.find(row, col)
    }

    pub fn accumulate(&mut self, handle: ElementHandle, value: f64) {
        self.add_value(handle, Complex64::new(value, 0.0));
    }

    /// The imaginary part is discarded in real mode.
    pub fn accumulate_complex(&mut self, handle: ElementHandle, re: f64, im: f64) {
        self.add_value(handle, Complex64::new(re, im));
    }

    /// Stamp by coordinate. Before the pattern is compiled a missing element is
    /// created; afterwards it is a `PatternViolation`.
    pub fn accumulate_at(&mut self, row: usize, col: usize, value: Complex64) -> Result<()> {
        self.check_index(row)?;
        self.check_index(col)?;
        let handle = match self.elements.find(row, col) {
            Some(handle) => handle,
            None if self.compiled.is_some() => {
                return Err(MatrixError::PatternViolation { row, col });
            }
            None => self.elements.get_or_create(row, col)?,
        };
        self.add_value(handle, value);
        Ok(())
    }

    pub fn set_value(&mut self, handle: ElementHandle, value: Complex64) {
        let value = self.mode_value(value);
        if let Some(compiled) = &mut self.compiled {
            if let Some(binding) = compiled.binding(handle) {
                let stride = compiled.stride();
                compiled.csc.values[binding.dest] = value.re;
                if stride == 2 {
                    compiled.csc.values[binding.dest + 1] = value.im;
                }
                return;
            }
        }
        self.elements.set_value(handle, value);
    }

    pub fn value(&self, handle: ElementHandle) -> Complex64 {
        match (&self.compiled, self.binding_dest(handle)) {
            (Some(compiled), Some((dest, stride))) => {
                let values = &compiled.csc.values;
                Complex64::new(values[dest], if stride == 2 { values[dest + 1] } else { 0.0 })
            }
            _ => self.elements.value(handle),
        }
    }

    /// Value at external (row, col); zero when structurally absent.
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.elements
            .find(row, col)
            .map(|h| self.value(h))
            .unwrap_or_default()
    }

    /// Zero every value, keeping the pattern.
    pub fn clear_values(&mut self) {
        self.elements.clear();
        if let Some(compiled) = &mut self.compiled {
            compiled.csc.clear_values();
        }
    }

    /// Apply staged contributions in order.
    pub fn merge(&mut self, buffer: &StampBuffer) -> Result<()> {
        for (handle, value) in buffer.iter() {
            if handle.index() >= self.elements.len() {
                return Err(MatrixError::IndexOutOfRange {
                    index: handle.index(),
                    size: self.elements.len(),
                });
            }
            self.add_value(handle, value);
        }
        Ok(())
    }

    fn mode_value(&self, value: Complex64) -> Complex64 {
        if self.is_complex {
            value
        } else {
            Complex64::new(value.re, 0.0)
        }
    }

    fn binding_dest(&self, handle: ElementHandle) -> Option<(usize, usize)> {
        let compiled = self.compiled.as_ref()?;
        compiled
            .binding(handle)
            .map(|b| (b.dest, compiled.stride()))
    }

    fn add_value(&mut self, handle: ElementHandle, value: Complex64) {
        let value = self.mode_value(value);
        if let Some(compiled) = &mut self.compiled {
            if let Some(binding) = compiled.binding(handle) {
                let stride = compiled.stride();
                compiled.csc.values[binding.dest] += value.re;
                if stride == 2 {
                    compiled.csc.values[binding.dest + 1] += value.im;
                }
                return;
            }
        }
        self.elements.accumulate(handle, value);
    }

    // ------------------------------------------------------------------------
    // Pattern
    // ------------------------------------------------------------------------

    /// Freeze the pattern into CSC form in the current internal order.
    pub fn compile(&mut self) -> Result<()> {
        if self.compiled.is_none() {
            self.compiled = Some(self.build_compiled()?);
        }
        Ok(())
    }

    fn build_compiled(&self) -> Result<CompiledPattern> {
        let coords = self
            .elements
            .iter()
            .map(|(source, e)| Coordinate {
                row: self.tracker.rows.to_internal(e.row),
                col: self.tracker.cols.to_internal(e.col),
                source,
            })
            .collect();
        let stride = if self.is_complex { 2 } else { 1 };
        let mut compiled = compress(self.size, coords, stride)?;
        for (source, e) in self.elements.iter() {
            if let Some(binding) = compiled.binding(source) {
                compiled.csc.values[binding.dest] = e.value.re;
                if stride == 2 {
                    compiled.csc.values[binding.dest + 1] = e.value.im;
                }
            }
        }
        Ok(compiled)
    }

    /// Copy compiled values back into the element store and drop the
    /// compiled form.
    fn restore_values(&mut self) {
        if let Some(compiled) = self.compiled.take() {
            let stride = compiled.stride();
            for binding in compiled.bindings() {
                let re = compiled.csc.values[binding.dest];
                let im = if stride == 2 {
                    compiled.csc.values[binding.dest + 1]
                } else {
                    0.0
                };
                self.elements.set_value(binding.source, Complex64::new(re, im));
            }
        }
    }

    fn thaw(&mut self) {
        self.restore_values();
        self.backend.invalidate_pattern();
        self.state = FactorState::Unfactored;
    }

    /// Swap columns so that voltage-source style unit twins land on the
    /// diagonal. Returns the number of swaps.
    pub fn preorder(&mut self) -> usize {
        if self.compiled.is_some() {
            log::warn!("preorder after the pattern was compiled; recompiling");
            self.thaw();
        }
        let swaps = mna_preorder(&mut self.tracker, &self.elements);
        if swaps > 0 {
            self.backend.invalidate_pattern();
            self.state = FactorState::Unfactored;
        }
        swaps
    }

    /// Fold a backend pivot sequence into the tracker. A compiled pattern is
    /// laid out in internal order, so it is rebuilt around the relabel.
    fn apply_pivots(&mut self, pivots: &[(usize, usize)]) -> Result<()> {
        let frozen = self.compiled.is_some();
        self.restore_values();
        self.tracker.apply_pivots(pivots);
        if frozen {
            self.compiled = Some(self.build_compiled()?);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Factorization
    // ------------------------------------------------------------------------

    /// Choose a pivot order and factor. `rel_tol`/`abs_tol` steer the
    /// classical backend's pivot search.
    pub fn reorder(&mut self, rel_tol: f64, abs_tol: f64) -> Result<FactorStatus> {
        if self.size == 0 {
            self.state = FactorState::Empty;
            return Ok(FactorStatus::EmptyMatrix);
        }
        if self.backend.needs_compiled_pattern() {
            self.compile()?;
        }

        let view = SystemView {
            size: self.size,
            is_complex: self.is_complex,
            elements: &self.elements,
            tracker: &self.tracker,
            compiled: self.compiled.as_ref(),
        };
        let reordered = match self.backend.order_and_factor(&view, rel_tol, abs_tol) {
            Ok(reordered) => reordered,
            Err(err) => return Err(self.fail(err)),
        };
        if let Some(pivots) = &reordered.pivots {
            self.apply_pivots(pivots)?;
        }
        self.state = FactorState::Factored;
        Ok(reordered.status)
    }

    /// `reorder` with the configured tolerances.
    pub fn reorder_default(&mut self) -> Result<FactorStatus> {
        self.reorder(self.config.pivot_rel_tol, self.config.pivot_abs_tol)
    }

    /// Factor reusing the previous pivot order (or, for the precompiled
    /// backend, the previous symbolic analysis).
    pub fn factorize(&mut self) -> Result<FactorStatus> {
        if self.size == 0 {
            self.state = FactorState::Empty;
            return Ok(FactorStatus::EmptyMatrix);
        }
        if self.backend.needs_compiled_pattern() {
            self.compile()?;
        }

        let view = SystemView {
            size: self.size,
            is_complex: self.is_complex,
            elements: &self.elements,
            tracker: &self.tracker,
            compiled: self.compiled.as_ref(),
        };
        match self.backend.factor(&view) {
            Ok(status) => {
                self.state = FactorState::Factored;
                Ok(status)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Record a failure, translating singular positions to external indices.
    fn fail(&mut self, err: MatrixError) -> MatrixError {
        match err {
            MatrixError::Singular { row, col } => {
                let row = self.tracker.rows.to_external(row);
                let col = self.tracker.cols.to_external(col);
                log::debug!("singular matrix at external ({}, {})", row, col);
                self.state = FactorState::Singular { row, col };
                MatrixError::Singular { row, col }
            }
            other => {
                self.state = FactorState::Unfactored;
                other
            }
        }
    }

    /// External (row, col) of the pivot that made the last factorization fail.
    pub fn locate_singularity(&self) -> Option<(usize, usize)> {
        match self.state {
            FactorState::Singular { row, col } => Some((row, col)),
            _ => None,
        }
    }

    /// Add `g` to every existing external diagonal element. Diagonals that
    /// are structurally absent are not created.
    pub fn add_to_all_diagonals(&mut self, g: f64) {
        if g == 0.0 {
            return;
        }
        for i in 0..self.size {
            if let Some(handle) = self.elements.diagonal(i) {
                self.add_value(handle, Complex64::new(g, 0.0));
            }
        }
    }

    /// `add_to_all_diagonals` with the configured gmin.
    pub fn load_gmin(&mut self) {
        self.add_to_all_diagonals(self.config.gmin);
    }

    // ------------------------------------------------------------------------
    // Solves
    // ------------------------------------------------------------------------

    fn check_solvable(&self, len: usize, complex: bool) -> Result<bool> {
        if len != self.size {
            return Err(MatrixError::DimensionMismatch {
                expected: self.size,
                actual: len,
            });
        }
        match self.state {
            FactorState::Empty => Ok(false),
            FactorState::Factored if complex == self.is_complex => Ok(true),
            _ => Err(MatrixError::NotFactored),
        }
    }

    /// Permute `rhs` into internal order, run `solve`, permute back.
    fn permuted_solve<T: Scalar>(
        &self,
        rhs: &mut [T],
        transposed: bool,
        solve: impl FnOnce(&dyn SolverBackend, &mut [T]) -> Result<()>,
    ) -> Result<()> {
        let (input, output) = if transposed {
            (self.tracker.cols.int_to_ext(), self.tracker.rows.int_to_ext())
        } else {
            (self.tracker.rows.int_to_ext(), self.tracker.cols.int_to_ext())
        };
        let mut scratch: Vec<T> = input.iter().map(|&ext| rhs[ext]).collect();
        solve(self.backend.as_ref(), &mut scratch)?;
        for i in (0..self.size).rev() {
            rhs[output[i]] = scratch[i];
        }
        Ok(())
    }

    /// Solve A·x = b in place: `rhs` holds b on entry and x on return.
    pub fn solve(&self, rhs: &mut [f64]) -> Result<()> {
        if !self.check_solvable(rhs.len(), false)? {
            return Ok(());
        }
        self.permuted_solve(rhs, false, |b, x| b.solve(x))
    }

    pub fn solve_complex(&self, rhs: &mut [Complex64]) -> Result<()> {
        if !self.check_solvable(rhs.len(), true)? {
            return Ok(());
        }
        self.permuted_solve(rhs, false, |b, x| b.solve_complex(x))
    }

    /// Solve Aᵀ·x = b in place.
    pub fn solve_transposed(&self, rhs: &mut [f64]) -> Result<()> {
        if !self.check_solvable(rhs.len(), false)? {
            return Ok(());
        }
        self.permuted_solve(rhs, true, |b, x| b.solve_transposed(x))
    }

    /// Solve Aᵀ·x = b in place. Plain transpose, not conjugate.
    pub fn solve_transposed_complex(&self, rhs: &mut [Complex64]) -> Result<()> {
        if !self.check_solvable(rhs.len(), true)? {
            return Ok(());
        }
        self.permuted_solve(rhs, true, |b, x| b.solve_transposed_complex(x))
    }

    // ------------------------------------------------------------------------
    // Determinant
    // ------------------------------------------------------------------------

    /// Determinant of the last factorization. Zero when it failed or never
    /// ran; one for the empty matrix.
    pub fn determinant(&self) -> Determinant {
        match self.state {
            FactorState::Factored => {}
            FactorState::Empty => return Determinant::ONE,
            _ => return Determinant::ZERO,
        }
        let Some(pivots) = self.backend.pivots() else {
            return Determinant::ZERO;
        };
        let odd = self.tracker.swap_parity() ^ self.backend.swap_parity();
        Determinant::from_pivots(&pivots, odd)
    }

    pub fn determinant_base2(&self) -> Base2Determinant {
        self.determinant().to_base2()
    }

    // ------------------------------------------------------------------------
    // Whole-matrix operations
    // ------------------------------------------------------------------------

    fn check_vector(&self, len: usize) -> Result<()> {
        if len != self.size {
            return Err(MatrixError::DimensionMismatch {
                expected: self.size,
                actual: len,
            });
        }
        Ok(())
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

    fn handles(&self) -> impl Iterator<Item = ElementHandle> {
        (0..self.elements.len()).map(ElementHandle::from_index)
    }

    /// y = A·x in external indices, using the real parts of the values.
    pub fn multiply(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.check_vector(x.len())?;
        let mut y = vec![0.0; self.size];
        for (handle, e) in self.elements.iter() {
            y[e.row] += self.value(handle).re * x[e.col];
        }
        Ok(y)
    }

    pub fn multiply_complex(&self, x: &[Complex64]) -> Result<Vec<Complex64>> {
        self.check_vector(x.len())?;
        let mut y = vec![Complex64::new(0.0, 0.0); self.size];
        for (handle, e) in self.elements.iter() {
            y[e.row] += self.value(handle) * x[e.col];
        }
        Ok(y)
    }

    /// Multiply every value by `factor`.
    pub fn scale(&mut self, factor: f64) {
        if let Some(compiled) = &mut self.compiled {
            compiled.csc.scale(factor);
            return;
        }
        for handle in self.handles() {
            let v = self.elements.value(handle);
            self.elements.set_value(handle, v * factor);
        }
    }

    pub fn zero_row(&mut self, row: usize) -> Result<()> {
        self.check_index(row)?;
        let handles: Vec<_> = self.elements.row(row).collect();
        for handle in handles {
            self.set_value(handle, Complex64::new(0.0, 0.0));
        }
        Ok(())
    }

    pub fn zero_col(&mut self, col: usize) -> Result<()> {
        self.check_index(col)?;
        let handles: Vec<_> = self.elements.column(col).collect();
        for handle in handles {
            self.set_value(handle, Complex64::new(0.0, 0.0));
        }
        Ok(())
    }

    /// Column `accum` += column `addend`, creating elements as needed.
    pub fn add_col(&mut self, accum: usize, addend: usize) -> Result<()> {
        self.check_index(accum)?;
        self.check_index(addend)?;
        let mut contributions: Vec<(usize, Complex64)> = self
            .elements
            .column(addend)
            .map(|h| (self.elements.element(h).row, self.value(h)))
            .collect();
        contributions.sort_by_key(|&(row, _)| row);
        for (row, value) in contributions {
            let handle = self.get_or_create_element(row, accum)?;
            self.add_value(handle, value);
        }
        Ok(())
    }
}

/// Dense dump in external order. `.` marks a structural zero.
impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} matrix {}x{}, {} nonzeros",
            if self.is_complex { "complex" } else { "real" },
            self.size,
            self.size,
            self.nnz()
        )?;
        for row in 0..self.size {
            for col in 0..self.size {
                match self.elements.find(row, col) {
                    Some(handle) => {
                        let v = self.value(handle);
                        if self.is_complex {
                            write!(f, " {:>11.4e}{:+.4e}j", v.re, v.im)?;
                        } else {
                            write!(f, " {:>11.4e}", v.re)?;
                        }
                    }
                    None if self.is_complex => write!(f, " {:>23}", ".")?,
                    None => write!(f, " {:>11}", ".")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(m: &mut Matrix, entries: &[(usize, usize, f64)]) {
        for &(r, c, v) in entries {
            let h = m.get_or_create_element(r, c).unwrap();
            m.accumulate(h, v);
        }
    }

    #[test]
    fn test_real_mode_discards_imaginary() {
        let mut m = Matrix::new(1);
        let h = m.get_or_create_element(0, 0).unwrap();
        m.accumulate_complex(h, 2.0, 5.0);
        assert_eq!(m.value(h), Complex64::new(2.0, 0.0));
    }

    #[test]
    fn test_compiled_writes_go_to_csc() {
        let mut m = Matrix::with_backend(2, false, BackendKind::Precompiled);
        stamp(&mut m, &[(0, 0, 1.0), (1, 1, 2.0), (0, 1, 3.0)]);
        m.compile().unwrap();
        let h = m.find_element(0, 1).unwrap();
        m.accumulate(h, 1.0);
        assert_eq!(m.get(0, 1), Complex64::new(4.0, 0.0));

        let compiled = m.compiled().unwrap();
        let dest = compiled.binding(h).unwrap().dest;
        assert_eq!(compiled.csc.values[dest], 4.0);
    }

    #[test]
    fn test_thaw_keeps_values() {
        let mut m = Matrix::with_backend(2, false, BackendKind::Precompiled);
        stamp(&mut m, &[(0, 0, 1.0), (1, 1, 2.0)]);
        m.factorize().unwrap();
        assert!(m.is_compiled());

        let h = m.get_or_create_element(1, 0).unwrap();
        assert!(!m.is_compiled());
        assert!(!m.is_factored());
        m.accumulate(h, 5.0);
        assert_eq!(m.get(0, 0), Complex64::new(1.0, 0.0));
        assert_eq!(m.get(1, 0), Complex64::new(5.0, 0.0));
    }

    #[test]
    fn test_set_complex_keeps_real_parts() {
        let mut m = Matrix::with_backend(2, false, BackendKind::Precompiled);
        stamp(&mut m, &[(0, 0, 1.0), (1, 1, 2.0)]);
        m.factorize().unwrap();
        m.set_complex(true);
        assert!(!m.is_factored());
        let h = m.find_element(1, 1).unwrap();
        m.accumulate_complex(h, 0.0, 3.0);
        assert_eq!(m.value(h), Complex64::new(2.0, 3.0));

        m.set_complex(false);
        assert_eq!(m.value(h), Complex64::new(2.0, 0.0));
    }

    #[test]
    fn test_solve_requires_matching_mode() {
        let mut m = Matrix::new(1);
        stamp(&mut m, &[(0, 0, 2.0)]);
        m.factorize().unwrap();
        let mut rhs = vec![Complex64::new(1.0, 0.0)];
        assert_eq!(m.solve_complex(&mut rhs), Err(MatrixError::NotFactored));
    }

    #[test]
    fn test_display() {
        let mut m = Matrix::new(2);
        stamp(&mut m, &[(0, 0, 1.0)]);
        let text = m.to_string();
        assert!(text.starts_with("real matrix 2x2, 1 nonzeros"));
        assert_eq!(text.lines().count(), 3);
    }
}
