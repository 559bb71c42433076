//! Sparse system matrix for circuit simulation.
//!
//! Device models stamp conductances into a [`Matrix`] once per Newton
//! iteration through stable [`ElementHandle`]s; the matrix is then factored
//! and solved by one of two LU backends chosen at construction:
//!
//! - [`BackendKind::Classical`]: Markowitz pivoting on the element graph,
//!   reordered on demand, refactored in the stored pivot order otherwise.
//! - [`BackendKind::Precompiled`]: the pattern is compressed to CSC once,
//!   analyzed once (AMD), and numerically refactored every iteration.
//!
//! Both work on real and complex values, solve `A·x = b` and `Aᵀ·x = b`,
//! and expose an overflow-safe determinant.
//!
//! ```
//! use sim_matrix::{BackendKind, Matrix};
//!
//! let mut m = Matrix::with_backend(2, false, BackendKind::Precompiled);
//! for (r, c, v) in [(0, 0, 2.0), (0, 1, -1.0), (1, 0, -1.0), (1, 1, 2.0)] {
//!     let h = m.get_or_create_element(r, c)?;
//!     m.accumulate(h, v);
//! }
//! m.reorder(1e-3, 1e-13)?;
//! let mut x = vec![1.0, 0.0];
//! m.solve(&mut x)?;
//! assert!((x[0] - 2.0 / 3.0).abs() < 1e-12);
//! # Ok::<(), sim_matrix::MatrixError>(())
//! ```

pub mod amd;
pub mod backend;
pub mod classical;
pub mod compress;
pub mod csc;
pub mod determinant;
pub mod element;
pub mod error;
pub mod klu;
pub mod matrix;
pub mod options;
pub mod permutation;
pub mod scalar;
pub mod stamp;

pub use backend::{BackendKind, BackendStats, SolverBackend};
pub use compress::{compress, Binding, CompiledPattern, Coordinate};
pub use csc::CscMatrix;
pub use determinant::{Base2Determinant, Determinant};
pub use element::{Element, ElementHandle};
pub use error::{FactorStatus, MatrixError, Result};
pub use klu::{FillOrdering, KluConfig, RowScaling};
pub use matrix::Matrix;
pub use options::{MatrixConfig, MatrixOptions};
pub use permutation::PermutationTracker;
pub use stamp::StampBuffer;
