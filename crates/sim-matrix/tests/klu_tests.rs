//! Precompiled-pattern backend tests.
//!
//! The classical Markowitz factorization serves as the reference: both must
//! produce the same solutions for the same matrix.

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sim_matrix::classical::{MarkowitzLu, PivotRule};
use sim_matrix::klu::{analyze, KluBackend, Numeric};
use sim_matrix::{CscMatrix, FillOrdering, KluConfig, MatrixError, RowScaling, SolverBackend};

// ============================================================================
// Helper Functions
// ============================================================================

/// Random sparse n×n CSC with a dominant diagonal.
fn random_csc(rng: &mut StdRng, n: usize, density: f64) -> CscMatrix {
    let mut col_ptr = vec![0usize];
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    for col in 0..n {
        for row in 0..n {
            if row == col {
                row_idx.push(row);
                values.push(rng.gen_range(4.0..8.0) * n as f64 * density);
            } else if rng.gen_bool(density) {
                row_idx.push(row);
                values.push(rng.gen_range(-1.0..1.0));
            }
        }
        col_ptr.push(row_idx.len());
    }
    CscMatrix::new(n, col_ptr, row_idx, values, 1).unwrap()
}

/// Resistor ladder of n nodes, each also tied to ground.
fn ladder_csc(n: usize, g: f64) -> CscMatrix {
    let mut col_ptr = vec![0usize];
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    for col in 0..n {
        if col > 0 {
            row_idx.push(col - 1);
            values.push(-g);
        }
        row_idx.push(col);
        values.push(2.0 * g + 1e-3);
        if col + 1 < n {
            row_idx.push(col + 1);
            values.push(-g);
        }
        col_ptr.push(row_idx.len());
    }
    CscMatrix::new(n, col_ptr, row_idx, values, 1).unwrap()
}

fn entries(csc: &CscMatrix) -> Vec<(usize, usize, f64)> {
    let mut out = Vec::with_capacity(csc.nnz());
    for col in 0..csc.n() {
        for k in csc.col_ptr[col]..csc.col_ptr[col + 1] {
            out.push((csc.row_idx[k], col, csc.values[k]));
        }
    }
    out
}

/// Solve with the classical factorization, mapping back through its pivots.
fn reference_solve(csc: &CscMatrix, b: &[f64]) -> Vec<f64> {
    let n = csc.n();
    let rule = PivotRule::Markowitz {
        rel_tol: 1e-3,
        abs_tol: 0.0,
    };
    let (lu, pivots, _) = MarkowitzLu::<f64>::factorize(n, entries(csc), rule).unwrap();
    let mut y: Vec<f64> = pivots.iter().map(|&(r, _)| b[r]).collect();
    lu.solve(&mut y);
    let mut x = vec![0.0; n];
    for (k, &(_, c)) in pivots.iter().enumerate() {
        x[c] = y[k];
    }
    x
}

fn assert_close(a: &[f64], b: &[f64], tol: f64) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert!((x - y).abs() < tol, "x[{}]: {} vs {}", i, x, y);
    }
}

// ============================================================================
// Factor / solve
// ============================================================================

#[test]
fn test_ladder_matches_classical() {
    let a = ladder_csc(50, 1e-2);
    let config = KluConfig::default();
    let sym = analyze(&a, &config);
    let num = Numeric::<f64>::factor(&sym, &a, &config).unwrap();

    let b: Vec<f64> = (0..50).map(|i| if i == 0 { 1e-3 } else { 0.0 }).collect();
    let mut x = b.clone();
    num.solve(&sym, &mut x);
    assert_close(&x, &reference_solve(&a, &b), 1e-10);

    // Tridiagonal in natural order: no fill beyond the pattern
    let natural = KluConfig {
        ordering: FillOrdering::Natural,
        ..KluConfig::default()
    };
    let sym = analyze(&a, &natural);
    assert_eq!(sym.lnz_estimate() + sym.unz_estimate(), a.nnz() + 50);
    let num = Numeric::<f64>::factor(&sym, &a, &natural).unwrap();
    assert_eq!(num.nnz_l() + num.nnz_u(), a.nnz() + 50);
}

#[test]
fn test_analyze_once_factor_many() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut a = random_csc(&mut rng, 30, 0.1);
    let config = KluConfig::default();
    let sym = analyze(&a, &config);
    let mut num = Numeric::<f64>::factor(&sym, &a, &config).unwrap();

    for iteration in 0..8 {
        for v in &mut a.values {
            *v *= rng.gen_range(0.95..1.05);
        }
        num.refactor(&sym, &a, &config).unwrap();

        let b: Vec<f64> = (0..30).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut x = b.clone();
        num.solve(&sym, &mut x);
        let ax = a.multiply(&x);
        for i in 0..30 {
            assert!(
                (ax[i] - b[i]).abs() < 1e-10,
                "iteration {}: residual at {}",
                iteration,
                i
            );
        }
        assert_close(&x, &reference_solve(&a, &b), 1e-9);
    }
}

#[test]
fn test_orderings_and_scaling_agree() {
    let mut rng = StdRng::seed_from_u64(17);
    let a = random_csc(&mut rng, 25, 0.15);
    let b: Vec<f64> = (0..25).map(|i| (i as f64).sin()).collect();
    let expected = reference_solve(&a, &b);

    for ordering in [FillOrdering::Amd, FillOrdering::Natural] {
        for scaling in [RowScaling::None, RowScaling::Max] {
            let config = KluConfig {
                pivot_tol: 0.001,
                ordering,
                scaling,
            };
            let sym = analyze(&a, &config);
            let num = Numeric::<f64>::factor(&sym, &a, &config).unwrap();
            let mut x = b.clone();
            num.solve(&sym, &mut x);
            assert_close(&x, &expected, 1e-9);
        }
    }
}

#[test]
fn test_transposed_matches_explicit_transpose() {
    let mut rng = StdRng::seed_from_u64(23);
    let a = random_csc(&mut rng, 20, 0.2);
    let config = KluConfig::default();
    let sym = analyze(&a, &config);
    let num = Numeric::<f64>::factor(&sym, &a, &config).unwrap();

    let b: Vec<f64> = (0..20).map(|i| 1.0 / (i + 1) as f64).collect();
    let mut x = b.clone();
    num.solve_transposed(&sym, &mut x);

    // Aᵀ·x computed column by column
    for col in 0..20 {
        let dot: f64 = (a.col_ptr[col]..a.col_ptr[col + 1])
            .map(|k| a.values[k] * x[a.row_idx[k]])
            .sum();
        assert!((dot - b[col]).abs() < 1e-10, "column {}", col);
    }
}

#[test]
fn test_complex_factor() {
    // [ 2+1j   1    ]
    // [  1j   3-2j  ]
    let a = CscMatrix::new(
        2,
        vec![0, 2, 4],
        vec![0, 1, 0, 1],
        vec![2.0, 1.0, 0.0, 1.0, 1.0, 0.0, 3.0, -2.0],
        2,
    )
    .unwrap();
    let config = KluConfig::default();
    let sym = analyze(&a, &config);
    let num = Numeric::<Complex64>::factor(&sym, &a, &config).unwrap();

    let b = vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 1.0)];
    let mut x = b.clone();
    num.solve(&sym, &mut x);
    let ax = a.multiply(&x);
    for i in 0..2 {
        assert!((ax[i] - b[i]).norm() < 1e-13, "row {}", i);
    }

    // det = (2+1j)(3-2j) - (1)(1j) = 8 - 1j - 1j = 8 - 2j
    let det = num
        .pivot_values()
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, &p| acc * p);
    let det = if num.parity(&sym) { -det } else { det };
    assert!((det - Complex64::new(8.0, -2.0)).norm() < 1e-12, "det = {}", det);
}

// ============================================================================
// Failure modes
// ============================================================================

#[test]
fn test_structurally_singular() {
    // Two rows that only touch column 0
    let a = CscMatrix::new(3, vec![0, 2, 2, 3], vec![0, 1, 2], vec![1.0, 1.0, 1.0], 1).unwrap();
    let config = KluConfig::default();
    let sym = analyze(&a, &config);
    let err = Numeric::<f64>::factor(&sym, &a, &config).unwrap_err();
    assert_eq!(err, MatrixError::Singular { row: 1, col: 1 });
}

#[test]
fn test_pattern_mismatch() {
    let a = ladder_csc(4, 1.0);
    let b = ladder_csc(5, 1.0);
    let config = KluConfig::default();
    let sym = analyze(&a, &config);
    assert!(matches!(
        Numeric::<f64>::factor(&sym, &b, &config),
        Err(MatrixError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_backend_default_state() {
    let backend = KluBackend::new();
    assert!(!backend.has_symbolic());
    assert_eq!(backend.stats().refactor_count(), 0);
}
