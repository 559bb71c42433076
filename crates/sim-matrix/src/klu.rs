//! Precompiled-pattern LU (backend B), after KLU.
//!
//! # Algorithm
//!
//! 1. **Analyze**: fill-reducing column ordering `q` (AMD on `A + Aᵀ`) and a
//!    fill estimate from a symbolic elimination with diagonal pivots.
//! 2. **Factor**: Gilbert-Peierls left-looking LU with threshold partial
//!    pivoting. Column k of `L` and `U` is found by a sparse triangular solve
//!    whose nonzero pattern is the DFS reach of `A(:, q[k])` in the graph of
//!    `L`; the pivot row is then chosen among the non-pivotal rows, preferring
//!    the diagonal when it is within `pivot_tol` of the largest candidate.
//! 3. **Refactor**: same pattern, same pivots, new values. No searching.
//! 4. **Solve**: `A = R·Pᵀ·L·U·Qᵀ`, with `R` the row scale factors.
//!
//! Column `k` of `U` stores its off-diagonal rows in topological order with
//! the diagonal last; column `k` of `L` stores the unit diagonal first. After
//! factoring, all `L` row indices are in pivot order.
//!
//! # References
//!
//! - Davis, T.A., Palamadai Natarajan, E. "Algorithm 907: KLU" ACM TOMS, 2010.
//! - Gilbert, J.R., Peierls, T. "Sparse partial pivoting in time proportional to
//!   arithmetic operations" SIAM J. Sci. Stat. Comput., 1988.

use crate::amd::{amd_order, natural_order};
use crate::backend::{BackendKind, BackendStats, Reordered, SolverBackend, SystemView};
use crate::csc::CscMatrix;
use crate::error::{FactorStatus, MatrixError, Result};
use crate::permutation::permutation_parity;
use crate::scalar::Scalar;
use num_complex::Complex64;

const UNASSIGNED: usize = usize::MAX;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillOrdering {
    #[default]
    Amd,
    Natural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowScaling {
    None,
    /// Divide each row by its largest magnitude.
    #[default]
    Max,
}

#[derive(Debug, Clone)]
pub struct KluConfig {
    /// A non-pivotal row is kept as pivot when `|a_ik| >= tol * max|a_*k|`
    /// and it is the diagonal. Default: 0.001.
    pub pivot_tol: f64,
    pub ordering: FillOrdering,
    pub scaling: RowScaling,
}

impl Default for KluConfig {
    fn default() -> Self {
        Self {
            pivot_tol: 0.001,
            ordering: FillOrdering::Amd,
            scaling: RowScaling::Max,
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct KluStats {
    pub analyze_count: usize,
    pub factor_count: usize,
    pub refactor_count: usize,
    /// Predicted by analyze, assuming diagonal pivots
    pub lnz_estimate: usize,
    pub unz_estimate: usize,
    /// Actual, from the last factor (diagonals included)
    pub nnz_l: usize,
    pub nnz_u: usize,
    /// min|u_kk| / max|u_kk|
    pub rcond: f64,
}

// ============================================================================
// Symbolic analysis
// ============================================================================

/// Pattern-only analysis, reusable across any number of numeric factorizations
/// of the same pattern.
#[derive(Debug, Clone)]
pub struct Symbolic {
    n: usize,
    /// q[k] = column eliminated at step k
    q: Vec<usize>,
    nnz: usize,
    lnz_estimate: usize,
    unz_estimate: usize,
}

impl Symbolic {
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn lnz_estimate(&self) -> usize {
        self.lnz_estimate
    }

    pub fn unz_estimate(&self) -> usize {
        self.unz_estimate
    }
}

/// Order the columns of `csc` and predict the fill.
pub fn analyze(csc: &CscMatrix, config: &KluConfig) -> Symbolic {
    let n = csc.n();
    let ordering = match config.ordering {
        FillOrdering::Amd => amd_order(n, &csc.col_ptr, &csc.row_idx),
        FillOrdering::Natural => natural_order(n),
    };
    let q = ordering.inv_perm;
    let perm = ordering.perm;

    // Symbolic elimination of A(q, q) with diagonal pivots.
    let mut workspace = Workspace::new(n);
    let mut l_ptr = vec![0usize; n + 1];
    let mut l_idx: Vec<usize> = Vec::new();
    let mut pinv = vec![UNASSIGNED; n];
    let mut unz = 0usize;
    let mut seeds = Vec::new();

    for k in 0..n {
        let col = q[k];
        seeds.clear();
        seeds.extend(
            csc.row_idx[csc.col_ptr[col]..csc.col_ptr[col + 1]]
                .iter()
                .map(|&i| perm[i]),
        );
        workspace.reach(&l_ptr, &l_idx, &pinv, &seeds);

        l_idx.push(k);
        for &i in workspace.order.iter().rev() {
            if i < k {
                unz += 1;
            } else if i > k {
                l_idx.push(i);
            }
        }
        unz += 1;
        pinv[k] = k;
        l_ptr[k + 1] = l_idx.len();
    }

    log::debug!(
        "klu analyze: n={}, nnz={}, predicted lnz={}, unz={}",
        n,
        csc.nnz(),
        l_idx.len(),
        unz
    );

    Symbolic {
        n,
        q,
        nnz: csc.nnz(),
        lnz_estimate: l_idx.len(),
        unz_estimate: unz,
    }
}

/// DFS workspace for sparse reach computations.
struct Workspace {
    marked: Vec<bool>,
    stack: Vec<usize>,
    /// Next child position per stack level
    cursor: Vec<usize>,
    /// Finished nodes in post-order; reversed, a topological order
    order: Vec<usize>,
}

impl Workspace {
    fn new(n: usize) -> Self {
        Self {
            marked: vec![false; n],
            stack: Vec::with_capacity(n),
            cursor: Vec::with_capacity(n),
            order: Vec::with_capacity(n),
        }
    }

    /// Nodes reachable from `seeds` in the graph where pivotal node `i` points
    /// at the rows of `L(:, pinv[i])`. Result left in `self.order`.
    fn reach(&mut self, l_ptr: &[usize], l_idx: &[usize], pinv: &[usize], seeds: &[usize]) {
        for &i in &self.order {
            self.marked[i] = false;
        }
        self.order.clear();

        for &seed in seeds {
            if self.marked[seed] {
                continue;
            }
            self.marked[seed] = true;
            self.stack.push(seed);
            self.cursor.push(start_of(l_ptr, pinv, seed));

            while let Some(&node) = self.stack.last() {
                let end = end_of(l_ptr, pinv, node);
                let level = self.cursor.len() - 1;
                let mut next = None;
                while self.cursor[level] < end {
                    let child = l_idx[self.cursor[level]];
                    self.cursor[level] += 1;
                    if !self.marked[child] {
                        next = Some(child);
                        break;
                    }
                }
                match next {
                    Some(child) => {
                        self.marked[child] = true;
                        self.stack.push(child);
                        self.cursor.push(start_of(l_ptr, pinv, child));
                    }
                    None => {
                        self.stack.pop();
                        self.cursor.pop();
                        self.order.push(node);
                    }
                }
            }
        }
    }
}

fn start_of(l_ptr: &[usize], pinv: &[usize], node: usize) -> usize {
    match pinv[node] {
        UNASSIGNED => 0,
        j => l_ptr[j],
    }
}

fn end_of(l_ptr: &[usize], pinv: &[usize], node: usize) -> usize {
    match pinv[node] {
        UNASSIGNED => 0,
        j => l_ptr[j + 1],
    }
}

#[inline]
fn value_at<T: Scalar>(csc: &CscMatrix, k: usize) -> T {
    if csc.stride() == T::STRIDE {
        csc.entry::<T>(k)
    } else {
        T::from_complex(csc.entry_complex(k))
    }
}

// ============================================================================
// Numeric factorization
// ============================================================================

#[derive(Debug, Clone)]
pub struct Numeric<T: Scalar> {
    n: usize,
    l_ptr: Vec<usize>,
    l_idx: Vec<usize>,
    l_val: Vec<T>,
    u_ptr: Vec<usize>,
    u_idx: Vec<usize>,
    u_val: Vec<T>,
    /// p[k] = row pivoted at step k
    p: Vec<usize>,
    pinv: Vec<usize>,
    /// Row scale factors (all 1 when scaling is off)
    rs: Vec<f64>,
}

fn row_scale(csc: &CscMatrix, scaling: RowScaling) -> Vec<f64> {
    let n = csc.n();
    let mut rs = vec![1.0f64; n];
    if scaling == RowScaling::Max {
        rs.iter_mut().for_each(|r| *r = 0.0);
        for k in 0..csc.nnz() {
            let row = csc.row_idx[k];
            rs[row] = rs[row].max(csc.entry_complex(k).magnitude());
        }
        for r in &mut rs {
            if *r == 0.0 {
                *r = 1.0;
            }
        }
    }
    rs
}

impl<T: Scalar> Numeric<T> {
    /// Factor with fresh pivoting. Singular errors carry the column being
    /// eliminated, in the input's index space, as both row and column.
    pub fn factor(symbolic: &Symbolic, csc: &CscMatrix, config: &KluConfig) -> Result<Self> {
        let n = symbolic.n;
        if csc.n() != n || csc.nnz() != symbolic.nnz {
            return Err(MatrixError::DimensionMismatch {
                expected: symbolic.nnz,
                actual: csc.nnz(),
            });
        }

        let rs = row_scale(csc, config.scaling);
        let mut workspace = Workspace::new(n);
        let mut x = vec![T::ZERO; n];
        let mut pinv = vec![UNASSIGNED; n];
        let mut l_ptr = vec![0usize; n + 1];
        let mut u_ptr = vec![0usize; n + 1];
        let mut l_idx = Vec::with_capacity(symbolic.lnz_estimate);
        let mut l_val = Vec::with_capacity(symbolic.lnz_estimate);
        let mut u_idx = Vec::with_capacity(symbolic.unz_estimate);
        let mut u_val = Vec::with_capacity(symbolic.unz_estimate);

        for k in 0..n {
            let col = symbolic.q[k];
            let (start, end) = (csc.col_ptr[col], csc.col_ptr[col + 1]);
            workspace.reach(&l_ptr, &l_idx, &pinv, &csc.row_idx[start..end]);

            // x = L \ A(:, col), over the reach only
            for &i in &workspace.order {
                x[i] = T::ZERO;
            }
            for p in start..end {
                let i = csc.row_idx[p];
                x[i] = value_at::<T>(csc, p).unscale(rs[i]);
            }
            for &j in workspace.order.iter().rev() {
                let jj = pinv[j];
                if jj == UNASSIGNED {
                    continue;
                }
                let xj = x[j];
                for p in l_ptr[jj] + 1..l_ptr[jj + 1] {
                    x[l_idx[p]] -= l_val[p] * xj;
                }
            }

            // Split into U (pivotal rows) and pivot candidates
            let mut ipiv = UNASSIGNED;
            let mut best = -1.0f64;
            for &i in workspace.order.iter().rev() {
                if pinv[i] == UNASSIGNED {
                    let mag = x[i].magnitude();
                    if mag > best {
                        best = mag;
                        ipiv = i;
                    }
                } else {
                    u_idx.push(pinv[i]);
                    u_val.push(x[i]);
                }
            }
            if ipiv == UNASSIGNED || best <= 0.0 {
                return Err(MatrixError::Singular { row: col, col });
            }
            if pinv[col] == UNASSIGNED
                && workspace.marked[col]
                && x[col].magnitude() >= best * config.pivot_tol
            {
                ipiv = col;
            }

            let pivot = x[ipiv];
            u_idx.push(k);
            u_val.push(pivot);
            u_ptr[k + 1] = u_idx.len();
            pinv[ipiv] = k;

            l_idx.push(ipiv);
            l_val.push(T::ONE);
            for &i in workspace.order.iter().rev() {
                if pinv[i] == UNASSIGNED {
                    l_idx.push(i);
                    l_val.push(x[i] / pivot);
                }
                x[i] = T::ZERO;
            }
            l_ptr[k + 1] = l_idx.len();
        }

        for i in &mut l_idx {
            *i = pinv[*i];
        }
        let mut p = vec![0usize; n];
        for (row, &k) in pinv.iter().enumerate() {
            p[k] = row;
        }

        Ok(Self {
            n,
            l_ptr,
            l_idx,
            l_val,
            u_ptr,
            u_idx,
            u_val,
            p,
            pinv,
            rs,
        })
    }

    /// Recompute values on the existing pattern and pivot sequence.
    pub fn refactor(&mut self, symbolic: &Symbolic, csc: &CscMatrix, config: &KluConfig) -> Result<()> {
        let n = self.n;
        if csc.n() != n || csc.nnz() != symbolic.nnz {
            return Err(MatrixError::DimensionMismatch {
                expected: symbolic.nnz,
                actual: csc.nnz(),
            });
        }

        self.rs = row_scale(csc, config.scaling);
        let mut x = vec![T::ZERO; n];

        for k in 0..n {
            let col = symbolic.q[k];
            for p in csc.col_ptr[col]..csc.col_ptr[col + 1] {
                let i = csc.row_idx[p];
                x[self.pinv[i]] += value_at::<T>(csc, p).unscale(self.rs[i]);
            }

            let diag = self.u_ptr[k + 1] - 1;
            for up in self.u_ptr[k]..diag {
                let j = self.u_idx[up];
                let ujk = x[j];
                x[j] = T::ZERO;
                self.u_val[up] = ujk;
                for lp in self.l_ptr[j] + 1..self.l_ptr[j + 1] {
                    x[self.l_idx[lp]] -= self.l_val[lp] * ujk;
                }
            }

            let ukk = x[k];
            x[k] = T::ZERO;
            self.u_val[diag] = ukk;
            if ukk.is_zero() {
                for lp in self.l_ptr[k] + 1..self.l_ptr[k + 1] {
                    x[self.l_idx[lp]] = T::ZERO;
                }
                return Err(MatrixError::Singular { row: col, col });
            }
            for lp in self.l_ptr[k] + 1..self.l_ptr[k + 1] {
                let i = self.l_idx[lp];
                self.l_val[lp] = x[i] / ukk;
                x[i] = T::ZERO;
            }
        }
        Ok(())
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nnz_l(&self) -> usize {
        self.l_idx.len()
    }

    pub fn nnz_u(&self) -> usize {
        self.u_idx.len()
    }

    fn u_diag(&self, k: usize) -> T {
        self.u_val[self.u_ptr[k + 1] - 1]
    }

    /// u_kk · rs[p[k]] for every step. Their product is ±det(A).
    pub fn pivot_values(&self) -> Vec<T> {
        (0..self.n)
            .map(|k| self.u_diag(k).scale(self.rs[self.p[k]]))
            .collect()
    }

    /// Parity of the row pivoting combined with the column order (true when odd).
    pub fn parity(&self, symbolic: &Symbolic) -> bool {
        permutation_parity(&self.p) ^ permutation_parity(&symbolic.q)
    }

    pub fn rcond(&self) -> f64 {
        let mut min_diag = f64::MAX;
        let mut max_diag = 0.0f64;
        for k in 0..self.n {
            let a = self.u_diag(k).magnitude();
            min_diag = min_diag.min(a);
            max_diag = max_diag.max(a);
        }
        if max_diag > 0.0 {
            min_diag / max_diag
        } else {
            0.0
        }
    }

    /// Solve A·x = b in place.
    pub fn solve(&self, symbolic: &Symbolic, b: &mut [T]) {
        let n = self.n;
        let mut x: Vec<T> = (0..n)
            .map(|k| b[self.p[k]].unscale(self.rs[self.p[k]]))
            .collect();

        for j in 0..n {
            let xj = x[j];
            for lp in self.l_ptr[j] + 1..self.l_ptr[j + 1] {
                x[self.l_idx[lp]] -= self.l_val[lp] * xj;
            }
        }
        for j in (0..n).rev() {
            let diag = self.u_ptr[j + 1] - 1;
            x[j] = x[j] / self.u_val[diag];
            let xj = x[j];
            for up in self.u_ptr[j]..diag {
                x[self.u_idx[up]] -= self.u_val[up] * xj;
            }
        }

        for (k, &col) in symbolic.q.iter().enumerate() {
            b[col] = x[k];
        }
    }

    /// Solve Aᵀ·x = b in place. Plain transpose, no conjugation.
    pub fn solve_transposed(&self, symbolic: &Symbolic, b: &mut [T]) {
        let n = self.n;
        let mut c: Vec<T> = symbolic.q.iter().map(|&col| b[col]).collect();

        for j in 0..n {
            let diag = self.u_ptr[j + 1] - 1;
            let mut sum = c[j];
            for up in self.u_ptr[j]..diag {
                sum -= self.u_val[up] * c[self.u_idx[up]];
            }
            c[j] = sum / self.u_val[diag];
        }
        for j in (0..n).rev() {
            let mut sum = c[j];
            for lp in self.l_ptr[j] + 1..self.l_ptr[j + 1] {
                sum -= self.l_val[lp] * c[self.l_idx[lp]];
            }
            c[j] = sum;
        }

        for k in 0..n {
            let row = self.p[k];
            b[row] = c[k].unscale(self.rs[row]);
        }
    }
}

// ============================================================================
// Backend
// ============================================================================

#[derive(Debug, Clone)]
enum NumericFactors {
    Real(Numeric<f64>),
    Complex(Numeric<Complex64>),
}

impl NumericFactors {
    fn is_complex(&self) -> bool {
        matches!(self, NumericFactors::Complex(_))
    }
}

/// Owns the symbolic and numeric handles. Replacing either drops the old one.
#[derive(Debug)]
pub struct KluBackend {
    config: KluConfig,
    symbolic: Option<Symbolic>,
    numeric: Option<NumericFactors>,
    stats: KluStats,
}

impl KluBackend {
    pub fn new() -> Self {
        Self::with_config(KluConfig::default())
    }

    pub fn with_config(config: KluConfig) -> Self {
        Self {
            config,
            symbolic: None,
            numeric: None,
            stats: KluStats::default(),
        }
    }

    pub fn has_symbolic(&self) -> bool {
        self.symbolic.is_some()
    }

    fn ensure_symbolic(&mut self, csc: &CscMatrix) -> Result<&Symbolic> {
        let stale = match &self.symbolic {
            Some(sym) => sym.n != csc.n() || sym.nnz != csc.nnz(),
            None => true,
        };
        if stale {
            let sym = analyze(csc, &self.config);
            self.stats.analyze_count += 1;
            self.stats.lnz_estimate = sym.lnz_estimate;
            self.stats.unz_estimate = sym.unz_estimate;
            self.symbolic = Some(sym);
        }
        self.symbolic.as_ref().ok_or(MatrixError::NotFactored)
    }

    fn fresh_factor(&mut self, system: &SystemView<'_>) -> Result<()> {
        self.numeric = None;
        let compiled = system.compiled.ok_or(MatrixError::NotFactored)?;
        let csc = &compiled.csc;
        let config = self.config.clone();
        let symbolic = self.ensure_symbolic(csc)?;
        let numeric = if system.is_complex {
            NumericFactors::Complex(Numeric::factor(symbolic, csc, &config)?)
        } else {
            NumericFactors::Real(Numeric::factor(symbolic, csc, &config)?)
        };
        self.stats.factor_count += 1;
        self.record(&numeric);
        self.numeric = Some(numeric);
        Ok(())
    }

    fn record(&mut self, numeric: &NumericFactors) {
        let (nnz_l, nnz_u, rcond) = match numeric {
            NumericFactors::Real(f) => (f.nnz_l(), f.nnz_u(), f.rcond()),
            NumericFactors::Complex(f) => (f.nnz_l(), f.nnz_u(), f.rcond()),
        };
        self.stats.nnz_l = nnz_l;
        self.stats.nnz_u = nnz_u;
        self.stats.rcond = rcond;
    }

    fn with_factors<R>(
        &self,
        f: impl FnOnce(&Symbolic, &NumericFactors) -> Result<R>,
    ) -> Result<R> {
        match (&self.symbolic, &self.numeric) {
            (Some(sym), Some(num)) => f(sym, num),
            _ => Err(MatrixError::NotFactored),
        }
    }
}

impl Default for KluBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverBackend for KluBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Precompiled
    }

    fn stats(&self) -> BackendStats {
        BackendStats::Precompiled(self.stats.clone())
    }

    fn needs_compiled_pattern(&self) -> bool {
        true
    }

    fn order_and_factor(
        &mut self,
        system: &SystemView<'_>,
        _rel_tol: f64,
        _abs_tol: f64,
    ) -> Result<Reordered> {
        if system.size == 0 {
            self.numeric = None;
            return Ok(Reordered {
                status: FactorStatus::EmptyMatrix,
                pivots: None,
            });
        }
        self.fresh_factor(system)?;
        log::debug!(
            "klu factor: n={}, nnz(L)={}, nnz(U)={}, rcond={:.2e}",
            system.size,
            self.stats.nnz_l,
            self.stats.nnz_u,
            self.stats.rcond
        );
        Ok(Reordered {
            status: FactorStatus::Factored,
            pivots: None,
        })
    }

    fn factor(&mut self, system: &SystemView<'_>) -> Result<FactorStatus> {
        if system.size == 0 {
            self.numeric = None;
            return Ok(FactorStatus::EmptyMatrix);
        }

        let reusable = matches!(
            (&self.symbolic, &self.numeric),
            (Some(_), Some(num)) if num.is_complex() == system.is_complex
        );
        if !reusable {
            self.fresh_factor(system)?;
            return Ok(FactorStatus::Factored);
        }

        let compiled = system.compiled.ok_or(MatrixError::NotFactored)?;
        let result = match (&self.symbolic, &mut self.numeric) {
            (Some(sym), Some(NumericFactors::Real(num))) => {
                num.refactor(sym, &compiled.csc, &self.config)
            }
            (Some(sym), Some(NumericFactors::Complex(num))) => {
                num.refactor(sym, &compiled.csc, &self.config)
            }
            _ => Err(MatrixError::NotFactored),
        };
        match result {
            Ok(()) => {
                self.stats.refactor_count += 1;
                if let Some(num) = self.numeric.take() {
                    self.record(&num);
                    self.numeric = Some(num);
                }
                Ok(FactorStatus::Factored)
            }
            Err(err) => {
                self.numeric = None;
                Err(err)
            }
        }
    }

    fn solve(&self, rhs: &mut [f64]) -> Result<()> {
        self.with_factors(|sym, num| match num {
            NumericFactors::Real(f) => {
                f.solve(sym, rhs);
                Ok(())
            }
            NumericFactors::Complex(_) => Err(MatrixError::NotFactored),
        })
    }

    fn solve_complex(&self, rhs: &mut [Complex64]) -> Result<()> {
        self.with_factors(|sym, num| match num {
            NumericFactors::Complex(f) => {
                f.solve(sym, rhs);
                Ok(())
            }
            NumericFactors::Real(_) => Err(MatrixError::NotFactored),
        })
    }

    fn solve_transposed(&self, rhs: &mut [f64]) -> Result<()> {
        self.with_factors(|sym, num| match num {
            NumericFactors::Real(f) => {
                f.solve_transposed(sym, rhs);
                Ok(())
            }
            NumericFactors::Complex(_) => Err(MatrixError::NotFactored),
        })
    }

    fn solve_transposed_complex(&self, rhs: &mut [Complex64]) -> Result<()> {
        self.with_factors(|sym, num| match num {
            NumericFactors::Complex(f) => {
                f.solve_transposed(sym, rhs);
                Ok(())
            }
            NumericFactors::Real(_) => Err(MatrixError::NotFactored),
        })
    }

    fn pivots(&self) -> Option<Vec<Complex64>> {
        match self.numeric.as_ref()? {
            NumericFactors::Real(f) => Some(f.pivot_values().into_iter().map(|d| d.to_complex()).collect()),
            NumericFactors::Complex(f) => Some(f.pivot_values()),
        }
    }

    fn swap_parity(&self) -> bool {
        match (&self.symbolic, &self.numeric) {
            (Some(sym), Some(NumericFactors::Real(f))) => f.parity(sym),
            (Some(sym), Some(NumericFactors::Complex(f))) => f.parity(sym),
            _ => false,
        }
    }

    fn invalidate_pattern(&mut self) {
        self.symbolic = None;
        self.numeric = None;
    }

    fn invalidate_numeric(&mut self) {
        self.numeric = None;
    }
}
