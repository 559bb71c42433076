//! Real/complex value abstraction shared by both LU backends.
//!
//! Matrix values are always stored as `Complex64` in the element store and as
//! an interleaved `f64` array in compiled CSC form. The factorization kernels are
//! generic over `Scalar` so the same elimination code serves the real (DC,
//! transient) and complex (AC, pole-zero) analyses.

use num_complex::Complex64;
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

pub trait Scalar:
    Copy
    + Debug
    + Default
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
{
    const ZERO: Self;
    const ONE: Self;
    /// Number of `f64` slots one value occupies in a CSC value array.
    const STRIDE: usize;

    /// Pivot magnitude. `|x|` for reals, `|re| + |im|` for complex values.
    fn magnitude(self) -> f64;

    fn from_complex(value: Complex64) -> Self;

    fn to_complex(self) -> Complex64;

    /// Read the value starting at `slot[0]`.
    fn load(slot: &[f64]) -> Self;

    fn scale(self, factor: f64) -> Self;

    /// Divide by a positive real. Stays finite where `scale(1.0 / divisor)`
    /// would not (subnormal divisors).
    fn unscale(self, divisor: f64) -> Self;

    fn is_zero(self) -> bool {
        self.magnitude() == 0.0
    }
}

impl Scalar for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const STRIDE: usize = 1;

    #[inline]
    fn magnitude(self) -> f64 {
        self.abs()
    }

    #[inline]
    fn from_complex(value: Complex64) -> Self {
        value.re
    }

    #[inline]
    fn to_complex(self) -> Complex64 {
        Complex64::new(self, 0.0)
    }

    #[inline]
    fn load(slot: &[f64]) -> Self {
        slot[0]
    }

    #[inline]
    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    #[inline]
    fn unscale(self, divisor: f64) -> Self {
        self / divisor
    }
}

impl Scalar for Complex64 {
    const ZERO: Self = Complex64::new(0.0, 0.0);
    const ONE: Self = Complex64::new(1.0, 0.0);
    const STRIDE: usize = 2;

    #[inline]
    fn magnitude(self) -> f64 {
        self.re.abs() + self.im.abs()
    }

    #[inline]
    fn from_complex(value: Complex64) -> Self {
        value
    }

    #[inline]
    fn to_complex(self) -> Complex64 {
        self
    }

    #[inline]
    fn load(slot: &[f64]) -> Self {
        Complex64::new(slot[0], slot[1])
    }

    #[inline]
    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    #[inline]
    fn unscale(self, divisor: f64) -> Self {
        self / divisor
    }
}
