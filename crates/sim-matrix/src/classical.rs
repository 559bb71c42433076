//! Classical Markowitz LU (backend A).
//!
//! Right-looking Gaussian elimination on a dynamic sparse structure, in the
//! style of Sparse 1.3. Fill-ins are created as they appear.
//!
//! # Pivot selection
//!
//! A candidate `a_rc` of the active submatrix is acceptable when
//!
//! ```text
//! |a_rc| > abs_tol   and   |a_rc| >= rel_tol · max_i |a_ic|
//! ```
//!
//! Diagonal candidates are searched first; the whole submatrix only if no
//! diagonal is acceptable. Among acceptable candidates the smallest Markowitz
//! product `(r - 1)(c - 1)` wins (r, c = active row/column counts), ties going
//! to the larger magnitude.
//!
//! `factor()` reuses the pivot order of the last reorder. After a reorder the
//! matrix relabels its internal indices so that order is simply the diagonal,
//! and before any reorder the diagonal is the only order there is.

use crate::backend::{BackendKind, BackendStats, Reordered, SolverBackend, SystemView};
use crate::error::{FactorStatus, MatrixError, Result};
use crate::scalar::Scalar;
use num_complex::Complex64;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PivotRule {
    /// Markowitz search with threshold tests.
    Markowitz { rel_tol: f64, abs_tol: f64 },
    /// Pivot k is entry (k, k).
    Diagonal { abs_tol: f64 },
}

#[derive(Debug, Clone, Default)]
pub struct ClassicalStats {
    pub reorder_count: usize,
    pub factor_count: usize,
    /// Fill-ins created by the last elimination
    pub fillins: usize,
    /// Pivots taken off the diagonal by the last reorder
    pub off_diagonal_pivots: usize,
}

/// LU factors with unit lower triangle, stored in pivot order.
#[derive(Debug, Clone)]
pub struct MarkowitzLu<T: Scalar> {
    n: usize,
    /// l_cols[k] = (row, multiplier), row > k
    l_cols: Vec<Vec<(usize, T)>>,
    /// u_rows[k] = (col, value), col > k
    u_rows: Vec<Vec<(usize, T)>>,
    diag: Vec<T>,
}

/// Best pivot seen so far: least Markowitz product, then largest magnitude.
#[derive(Default)]
struct Candidate {
    product: usize,
    magnitude: f64,
    position: Option<(usize, usize)>,
}

impl Candidate {
    fn offer(&mut self, product: usize, magnitude: f64, r: usize, c: usize) {
        let better = self.position.is_none()
            || product < self.product
            || (product == self.product && magnitude > self.magnitude);
        if better {
            *self = Candidate {
                product,
                magnitude,
                position: Some((r, c)),
            };
        }
    }
}

/// Active submatrix during elimination.
struct ActiveMatrix<T: Scalar> {
    rows: Vec<BTreeMap<usize, T>>,
    cols: Vec<BTreeSet<usize>>,
    row_done: Vec<bool>,
    col_done: Vec<bool>,
    /// Largest magnitude per live column, refreshed for the columns each
    /// elimination step touches
    col_max: Vec<f64>,
}

impl<T: Scalar> ActiveMatrix<T> {
    fn new(n: usize, entries: impl IntoIterator<Item = (usize, usize, T)>) -> Self {
        let mut rows = vec![BTreeMap::new(); n];
        let mut cols = vec![BTreeSet::new(); n];
        for (r, c, v) in entries {
            *rows[r].entry(c).or_insert(T::ZERO) += v;
            cols[c].insert(r);
        }
        let mut active = Self {
            rows,
            cols,
            row_done: vec![false; n],
            col_done: vec![false; n],
            col_max: vec![0.0; n],
        };
        for c in 0..n {
            active.col_max[c] = active.column_max(c);
        }
        active
    }

    fn get(&self, r: usize, c: usize) -> T {
        self.rows[r].get(&c).copied().unwrap_or(T::ZERO)
    }

    fn column_max(&self, c: usize) -> f64 {
        self.cols[c]
            .iter()
            .map(|&r| self.get(r, c).magnitude())
            .fold(0.0, f64::max)
    }

    fn markowitz(&self, r: usize, c: usize) -> usize {
        (self.rows[r].len() - 1) * (self.cols[c].len() - 1)
    }

    fn search(&self, rel_tol: f64, abs_tol: f64) -> Option<(usize, usize)> {
        let n = self.rows.len();
        let acceptable = |mag: f64, c: usize| mag > abs_tol && mag >= rel_tol * self.col_max[c];

        let mut best = Candidate::default();
        for i in 0..n {
            if self.row_done[i] || self.col_done[i] {
                continue;
            }
            if let Some(v) = self.rows[i].get(&i) {
                let mag = v.magnitude();
                if acceptable(mag, i) {
                    best.offer(self.markowitz(i, i), mag, i, i);
                }
            }
        }
        if best.position.is_some() {
            return best.position;
        }

        for c in 0..n {
            if self.col_done[c] {
                continue;
            }
            for &r in &self.cols[c] {
                let mag = self.get(r, c).magnitude();
                if acceptable(mag, c) {
                    best.offer(self.markowitz(r, c), mag, r, c);
                }
            }
        }
        best.position
    }

    /// Position reported when no acceptable pivot remains.
    fn singular_position(&self, abs_tol: f64) -> (usize, usize) {
        let n = self.rows.len();
        let live_cols = (0..n).filter(|&c| !self.col_done[c]);
        let col = live_cols
            .clone()
            .find(|&c| self.col_max[c] <= abs_tol)
            .or_else(|| live_cols.clone().next())
            .unwrap_or(0);
        let row = if col < n && !self.row_done[col] {
            col
        } else {
            (0..n).find(|&r| !self.row_done[r]).unwrap_or(col)
        };
        (row, col)
    }

    /// Eliminate pivot (pr, pc). Returns (L column, U row, pivot, fill-ins).
    #[allow(clippy::type_complexity)]
    fn eliminate(&mut self, pr: usize, pc: usize) -> (Vec<(usize, T)>, Vec<(usize, T)>, T, usize) {
        let pivot = self.get(pr, pc);
        let u_row: Vec<(usize, T)> = self.rows[pr]
            .iter()
            .filter(|&(&c, _)| c != pc)
            .map(|(&c, &v)| (c, v))
            .collect();
        let below: Vec<usize> = self.cols[pc].iter().copied().filter(|&r| r != pr).collect();

        let rows = &mut self.rows;
        let cols = &mut self.cols;
        let mut fillins = 0;
        let mut l_col = Vec::with_capacity(below.len());
        for r in below {
            let a = rows[r].remove(&pc).unwrap_or(T::ZERO);
            let m = a / pivot;
            l_col.push((r, m));
            for &(c, u) in &u_row {
                match rows[r].get_mut(&c) {
                    Some(entry) => *entry -= m * u,
                    None => {
                        rows[r].insert(c, -(m * u));
                        cols[c].insert(r);
                        fillins += 1;
                    }
                }
            }
        }

        for &(c, _) in &u_row {
            cols[c].remove(&pr);
        }
        rows[pr].clear();
        cols[pc].clear();
        self.row_done[pr] = true;
        self.col_done[pc] = true;
        self.col_max[pc] = 0.0;
        for &(c, _) in &u_row {
            self.col_max[c] = self.column_max(c);
        }

        (l_col, u_row, pivot, fillins)
    }
}

impl<T: Scalar> MarkowitzLu<T> {
    /// Factor the n×n system given by internal-coordinate entries.
    ///
    /// Returns the factors relabelled into pivot order, the pivot sequence
    /// and the number of fill-ins. Singular errors carry incoming internal
    /// indices.
    pub fn factorize(
        n: usize,
        entries: impl IntoIterator<Item = (usize, usize, T)>,
        rule: PivotRule,
    ) -> Result<(Self, Vec<(usize, usize)>, usize)> {
        let mut active = ActiveMatrix::new(n, entries);
        let mut pivots = Vec::with_capacity(n);
        let mut l_raw = Vec::with_capacity(n);
        let mut u_raw = Vec::with_capacity(n);
        let mut diag = Vec::with_capacity(n);
        let mut fillins = 0;

        for k in 0..n {
            let (pr, pc) = match rule {
                PivotRule::Diagonal { abs_tol } => {
                    if active.get(k, k).magnitude() <= abs_tol {
                        return Err(MatrixError::Singular { row: k, col: k });
                    }
                    (k, k)
                }
                PivotRule::Markowitz { rel_tol, abs_tol } => {
                    match active.search(rel_tol, abs_tol) {
                        Some(rc) => rc,
                        None => {
                            let (row, col) = active.singular_position(abs_tol);
                            return Err(MatrixError::Singular { row, col });
                        }
                    }
                }
            };
            log::trace!("step {}: pivot ({}, {})", k, pr, pc);

            let (l_col, u_row, pivot, fill) = active.eliminate(pr, pc);
            fillins += fill;
            pivots.push((pr, pc));
            l_raw.push(l_col);
            u_raw.push(u_row);
            diag.push(pivot);
        }

        let mut row_pos = vec![0usize; n];
        let mut col_pos = vec![0usize; n];
        for (k, &(r, c)) in pivots.iter().enumerate() {
            row_pos[r] = k;
            col_pos[c] = k;
        }
        let l_cols = l_raw
            .into_iter()
            .map(|col| col.into_iter().map(|(r, m)| (row_pos[r], m)).collect())
            .collect();
        let u_rows = u_raw
            .into_iter()
            .map(|row| row.into_iter().map(|(c, u)| (col_pos[c], u)).collect())
            .collect();

        Ok((
            Self {
                n,
                l_cols,
                u_rows,
                diag,
            },
            pivots,
            fillins,
        ))
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn diagonal(&self) -> &[T] {
        &self.diag
    }

    /// Solve L·U·x = b in place.
    pub fn solve(&self, x: &mut [T]) {
        for k in 0..self.n {
            let xk = x[k];
            for &(r, m) in &self.l_cols[k] {
                x[r] -= m * xk;
            }
        }
        for k in (0..self.n).rev() {
            let mut sum = x[k];
            for &(c, u) in &self.u_rows[k] {
                sum -= u * x[c];
            }
            x[k] = sum / self.diag[k];
        }
    }

    /// Solve (L·U)ᵀ·x = b in place. Plain transpose, no conjugation.
    pub fn solve_transposed(&self, x: &mut [T]) {
        for k in 0..self.n {
            let zk = x[k] / self.diag[k];
            x[k] = zk;
            for &(c, u) in &self.u_rows[k] {
                x[c] -= u * zk;
            }
        }
        for k in (0..self.n).rev() {
            let mut sum = x[k];
            for &(r, m) in &self.l_cols[k] {
                sum -= m * x[r];
            }
            x[k] = sum;
        }
    }
}

// ============================================================================
// Backend
// ============================================================================

#[derive(Debug, Clone)]
enum Factors {
    Real(MarkowitzLu<f64>),
    Complex(MarkowitzLu<Complex64>),
}

#[derive(Debug)]
pub struct ClassicalBackend {
    abs_tol: f64,
    factors: Option<Factors>,
    stats: ClassicalStats,
}

impl ClassicalBackend {
    pub fn new(abs_tol: f64) -> Self {
        Self {
            abs_tol,
            factors: None,
            stats: ClassicalStats::default(),
        }
    }

    fn run(&mut self, system: &SystemView<'_>, rule: PivotRule) -> Result<Vec<(usize, usize)>> {
        self.factors = None;
        let n = system.size;
        let (factors, pivots, fillins) = if system.is_complex {
            let mut entries = Vec::with_capacity(system.elements.len());
            system.for_each_entry(|r, c, v| entries.push((r, c, v)));
            let (lu, pivots, fillins) = MarkowitzLu::<Complex64>::factorize(n, entries, rule)?;
            (Factors::Complex(lu), pivots, fillins)
        } else {
            let mut entries = Vec::with_capacity(system.elements.len());
            system.for_each_entry(|r, c, v| entries.push((r, c, v.re)));
            let (lu, pivots, fillins) = MarkowitzLu::<f64>::factorize(n, entries, rule)?;
            (Factors::Real(lu), pivots, fillins)
        };
        self.stats.fillins = fillins;
        self.factors = Some(factors);
        Ok(pivots)
    }
}

impl SolverBackend for ClassicalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Classical
    }

    fn stats(&self) -> BackendStats {
        BackendStats::Classical(self.stats.clone())
    }

    fn order_and_factor(
        &mut self,
        system: &SystemView<'_>,
        rel_tol: f64,
        abs_tol: f64,
    ) -> Result<Reordered> {
        self.abs_tol = abs_tol;
        if system.size == 0 {
            self.factors = None;
            return Ok(Reordered {
                status: FactorStatus::EmptyMatrix,
                pivots: None,
            });
        }

        let pivots = self.run(system, PivotRule::Markowitz { rel_tol, abs_tol })?;
        self.stats.reorder_count += 1;
        self.stats.off_diagonal_pivots = pivots.iter().filter(|(r, c)| r != c).count();
        log::debug!(
            "classical reorder: n={}, fill-ins={}, off-diagonal pivots={}",
            system.size,
            self.stats.fillins,
            self.stats.off_diagonal_pivots
        );
        Ok(Reordered {
            status: FactorStatus::Factored,
            pivots: Some(pivots),
        })
    }

    fn factor(&mut self, system: &SystemView<'_>) -> Result<FactorStatus> {
        if system.size == 0 {
            self.factors = None;
            return Ok(FactorStatus::EmptyMatrix);
        }
        self.run(system, PivotRule::Diagonal { abs_tol: self.abs_tol })?;
        self.stats.factor_count += 1;
        Ok(FactorStatus::Factored)
    }

    fn solve(&self, rhs: &mut [f64]) -> Result<()> {
        match &self.factors {
            Some(Factors::Real(lu)) => {
                lu.solve(rhs);
                Ok(())
            }
            _ => Err(MatrixError::NotFactored),
        }
    }

    fn solve_complex(&self, rhs: &mut [Complex64]) -> Result<()> {
        match &self.factors {
            Some(Factors::Complex(lu)) => {
                lu.solve(rhs);
                Ok(())
            }
            _ => Err(MatrixError::NotFactored),
        }
    }

    fn solve_transposed(&self, rhs: &mut [f64]) -> Result<()> {
        match &self.factors {
            Some(Factors::Real(lu)) => {
                lu.solve_transposed(rhs);
                Ok(())
            }
            _ => Err(MatrixError::NotFactored),
        }
    }

    fn solve_transposed_complex(&self, rhs: &mut [Complex64]) -> Result<()> {
        match &self.factors {
            Some(Factors::Complex(lu)) => {
                lu.solve_transposed(rhs);
                Ok(())
            }
            _ => Err(MatrixError::NotFactored),
        }
    }

    fn pivots(&self) -> Option<Vec<Complex64>> {
        match &self.factors {
            Some(Factors::Real(lu)) => Some(lu.diagonal().iter().map(|&d| d.to_complex()).collect()),
            Some(Factors::Complex(lu)) => Some(lu.diagonal().to_vec()),
            None => None,
        }
    }

    fn swap_parity(&self) -> bool {
        // Row and column exchanges are folded into the tracker.
        false
    }

    fn invalidate_pattern(&mut self) {
        self.factors = None;
    }

    fn invalidate_numeric(&mut self) {
        self.factors = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(a: &[&[f64]]) -> Vec<(usize, usize, f64)> {
        let mut entries = Vec::new();
        for (r, row) in a.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    entries.push((r, c, v));
                }
            }
        }
        entries
    }

    fn markowitz() -> PivotRule {
        PivotRule::Markowitz {
            rel_tol: 1e-3,
            abs_tol: 0.0,
        }
    }

    #[test]
    fn test_diagonal_rule_on_well_posed_system() {
        let a: &[&[f64]] = &[&[4.0, 1.0, 0.0], &[1.0, 5.0, 2.0], &[0.0, 2.0, 6.0]];
        let (lu, pivots, _) =
            MarkowitzLu::factorize(3, dense(a), PivotRule::Diagonal { abs_tol: 0.0 }).unwrap();
        assert_eq!(pivots, vec![(0, 0), (1, 1), (2, 2)]);

        let mut x = vec![5.0, 8.0, 8.0];
        lu.solve(&mut x);
        for (xi, expected) in x.iter().zip([1.0, 1.0, 1.0]) {
            assert!((xi - expected).abs() < 1e-12, "x = {:?}", x);
        }
    }

    #[test]
    fn test_markowitz_takes_off_diagonal_when_needed() {
        let a: &[&[f64]] = &[&[0.0, 1.0], &[1.0, 0.0]];
        let (lu, pivots, _) = MarkowitzLu::factorize(2, dense(a), markowitz()).unwrap();
        assert!(pivots.iter().all(|(r, c)| r != c));
        let d = lu.diagonal();
        assert_eq!((d[0] * d[1]).abs(), 1.0);
    }

    #[test]
    fn test_markowitz_prefers_sparse_pivot() {
        // Row/col 0 is dense; eliminating it first fills the whole matrix.
        let a: &[&[f64]] = &[
            &[10.0, 1.0, 1.0, 1.0],
            &[1.0, 4.0, 0.0, 0.0],
            &[1.0, 0.0, 4.0, 0.0],
            &[1.0, 0.0, 0.0, 4.0],
        ];
        let (_, pivots, fillins) = MarkowitzLu::factorize(4, dense(a), markowitz()).unwrap();
        assert_ne!(pivots[0], (0, 0));
        assert_eq!(fillins, 0);
    }

    #[test]
    fn test_threshold_rejects_tiny_diagonal() {
        // |a00| < rel_tol * colmax, so the diagonal is not acceptable
        let a: &[&[f64]] = &[&[1e-8, 1.0], &[1.0, 1.0]];
        let rule = PivotRule::Markowitz {
            rel_tol: 1e-3,
            abs_tol: 0.0,
        };
        let (lu, pivots, _) = MarkowitzLu::factorize(2, dense(a), rule).unwrap();
        assert_eq!(pivots[0], (1, 1));
        assert!(lu.diagonal().iter().all(|d| d.abs() > 1e-3));
    }

    #[test]
    fn test_column_maxima_follow_elimination() {
        let a: &[&[f64]] = &[
            &[2.0, 8.0, 0.0, 1.0],
            &[4.0, 1.0, 3.0, 0.0],
            &[0.0, 5.0, 7.0, 2.0],
            &[1.0, 0.0, 6.0, 9.0],
        ];
        let mut active = ActiveMatrix::new(4, dense(a));
        assert_eq!(active.col_max, vec![4.0, 8.0, 7.0, 9.0]);

        for _ in 0..3 {
            let (pr, pc) = active.search(1e-3, 0.0).unwrap();
            active.eliminate(pr, pc);
            for c in (0..4).filter(|&c| !active.col_done[c]) {
                assert_eq!(active.col_max[c], active.column_max(c), "column {}", c);
            }
        }
    }

    #[test]
    fn test_transposed_solve() {
        let a: &[&[f64]] = &[&[2.0, 1.0], &[0.0, 3.0]];
        let (lu, _, _) =
            MarkowitzLu::factorize(2, dense(a), PivotRule::Diagonal { abs_tol: 0.0 }).unwrap();
        // Aᵀ = [[2, 0], [1, 3]], Aᵀ·[1, 1] = [2, 4]
        let mut x = vec![2.0, 4.0];
        lu.solve_transposed(&mut x);
        assert!((x[0] - 1.0).abs() < 1e-14 && (x[1] - 1.0).abs() < 1e-14, "x = {:?}", x);
    }

    #[test]
    fn test_singular_reports_position() {
        let a: &[&[f64]] = &[&[1.0, 0.0, 0.0], &[0.0, 0.0, 0.0], &[0.0, 0.0, 1.0]];
        let err = MarkowitzLu::factorize(3, dense(a), markowitz()).unwrap_err();
        assert_eq!(err, MatrixError::Singular { row: 1, col: 1 });
    }

    #[test]
    fn test_complex_solve() {
        let j = Complex64::new(0.0, 1.0);
        let one = Complex64::new(1.0, 0.0);
        let entries = vec![(0, 0, one + j), (0, 1, one), (1, 0, one), (1, 1, one - j)];
        let (lu, _, _) =
            MarkowitzLu::factorize(2, entries, PivotRule::Diagonal { abs_tol: 0.0 }).unwrap();
        // x = [1, j]: row 0 = (1+j) + j = 1+2j, row 1 = 1 + (1-j)j = 2+j
        let mut x = vec![Complex64::new(1.0, 2.0), Complex64::new(2.0, 1.0)];
        lu.solve(&mut x);
        assert!((x[0] - one).norm() < 1e-12);
        assert!((x[1] - j).norm() < 1e-12);
    }
}
