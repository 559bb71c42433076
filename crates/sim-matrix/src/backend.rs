//! Solver backend interface.
//!
//! | Backend | Ordering | Per-iteration cost | Pattern |
//! |---------|----------|--------------------|---------|
//! | Classical | Markowitz, chosen during elimination | full elimination with stored pivot order | dynamic |
//! | Precompiled | AMD once, threshold partial pivoting on first factor | numeric refactor on fixed pattern | compiled CSC |
//!
//! The backend is chosen once, when the [`Matrix`](crate::Matrix) is built.
//! Backends work entirely in internal index space; the matrix owns the
//! permutation tracker and translates at the boundary.
//!
//! Singular errors returned by a backend carry internal indices. The matrix
//! maps them to external ones before they reach the caller.

use crate::classical::{ClassicalBackend, ClassicalStats};
use crate::compress::CompiledPattern;
use crate::element::ElementStore;
use crate::error::{FactorStatus, Result};
use crate::klu::{KluBackend, KluStats};
use crate::options::MatrixConfig;
use crate::permutation::PermutationTracker;
use num_complex::Complex64;
use std::fmt;

/// Backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Markowitz reordering on the dynamic element graph.
    Classical,
    /// One symbolic analysis, then numeric refactorizations of a compiled CSC pattern.
    #[default]
    Precompiled,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Classical => "sparse",
            BackendKind::Precompiled => "klu",
        }
    }
}

/// Read-only view of the system handed to a backend.
pub struct SystemView<'a> {
    pub size: usize,
    pub is_complex: bool,
    pub elements: &'a ElementStore,
    pub tracker: &'a PermutationTracker,
    /// Present once the pattern has been compiled; values then live here.
    pub compiled: Option<&'a CompiledPattern>,
}

impl SystemView<'_> {
    /// Visit every structural entry as (internal row, internal col, value).
    pub fn for_each_entry(&self, mut visit: impl FnMut(usize, usize, Complex64)) {
        match self.compiled {
            Some(compiled) => {
                let csc = &compiled.csc;
                for col in 0..csc.n() {
                    for k in csc.col_ptr[col]..csc.col_ptr[col + 1] {
                        visit(csc.row_idx[k], col, csc.entry_complex(k));
                    }
                }
            }
            None => {
                for (_, element) in self.elements.iter() {
                    visit(
                        self.tracker.rows.to_internal(element.row),
                        self.tracker.cols.to_internal(element.col),
                        element.value,
                    );
                }
            }
        }
    }
}

/// Result of a reorder.
#[derive(Debug, Clone, PartialEq)]
pub struct Reordered {
    pub status: FactorStatus,
    /// `pivots[k] = (row, col)` in the incoming internal space, to be folded
    /// into the tracker. `None` when the backend keeps its permutations itself.
    pub pivots: Option<Vec<(usize, usize)>>,
}

/// Counters reported by the active backend.
#[derive(Debug, Clone)]
pub enum BackendStats {
    Classical(ClassicalStats),
    Precompiled(KluStats),
}

impl BackendStats {
    /// Factorizations that reused the previous pivot order.
    pub fn refactor_count(&self) -> usize {
        match self {
            BackendStats::Classical(s) => s.factor_count,
            BackendStats::Precompiled(s) => s.refactor_count,
        }
    }
}

pub trait SolverBackend: Send + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Whether values must be compiled into CSC form before factoring.
    fn needs_compiled_pattern(&self) -> bool {
        false
    }

    /// Choose a pivot order and factor.
    fn order_and_factor(
        &mut self,
        system: &SystemView<'_>,
        rel_tol: f64,
        abs_tol: f64,
    ) -> Result<Reordered>;

    /// Factor reusing the previous ordering.
    fn factor(&mut self, system: &SystemView<'_>) -> Result<FactorStatus>;

    fn solve(&self, rhs: &mut [f64]) -> Result<()>;

    fn solve_complex(&self, rhs: &mut [Complex64]) -> Result<()>;

    fn solve_transposed(&self, rhs: &mut [f64]) -> Result<()>;

    fn solve_transposed_complex(&self, rhs: &mut [Complex64]) -> Result<()>;

    /// Effective pivot values of the last factorization in elimination order,
    /// including any row scaling. `None` if not factored.
    fn pivots(&self) -> Option<Vec<Complex64>>;

    /// Parity of the permutations the backend applies on top of the tracker.
    fn swap_parity(&self) -> bool;

    fn stats(&self) -> BackendStats;

    /// The nonzero pattern changed: drop symbolic and numeric state.
    fn invalidate_pattern(&mut self);

    /// Values or mode changed: drop numeric state only.
    fn invalidate_numeric(&mut self);
}

pub fn create_backend(config: &MatrixConfig) -> Box<dyn SolverBackend> {
    match config.backend {
        BackendKind::Classical => Box::new(ClassicalBackend::new(config.pivot_abs_tol)),
        BackendKind::Precompiled => Box::new(KluBackend::with_config(config.klu.clone())),
    }
}
