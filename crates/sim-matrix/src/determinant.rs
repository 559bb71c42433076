//! Overflow-safe determinant from LU pivots.
//!
//! The product of the pivots of a circuit matrix easily leaves the range of
//! `f64` (hundreds of conductances around 1e-3, or capacitive AC terms around
//! 1e+9). The running product is therefore kept as `mantissa * 10^exponent`
//! and rescaled by 1e12 after every factor, then normalized so that the
//! mantissa magnitude lies in [1, 10).

use num_complex::Complex64;
use std::f64::consts::{LN_10, LN_2};
use std::fmt;

const RESCALE: f64 = 1e12;
const RESCALE_EXP: i32 = 12;

/// `mantissa * 10^exponent`. Real determinants have a zero imaginary part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Determinant {
    pub mantissa: Complex64,
    pub exponent: i32,
}

/// `mantissa * 2^exponent`, with mantissa components in [1, 2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Base2Determinant {
    pub mantissa: Complex64,
    pub exponent: i32,
}

/// Magnitude used for scaling decisions: the larger component.
fn norm(z: Complex64) -> f64 {
    z.re.abs().max(z.im.abs())
}

/// `value = factor * 10^exp` with `norm(factor)` in [1e-12, 1e12). Values
/// already in that range are returned unchanged.
fn split(value: Complex64) -> (Complex64, i32) {
    let size = norm(value);
    if size == 0.0 || (1.0 / RESCALE..RESCALE).contains(&size) {
        return (value, 0);
    }
    // Two half steps: 10^±exp alone over- or underflows for extreme values.
    let exp = size.log10().floor() as i32;
    let half = exp / 2;
    let factor = value * 10f64.powi(-half) * 10f64.powi(-(exp - half));
    (factor, exp)
}

impl Determinant {
    pub const ZERO: Determinant = Determinant {
        mantissa: Complex64::new(0.0, 0.0),
        exponent: 0,
    };

    pub const ONE: Determinant = Determinant {
        mantissa: Complex64::new(1.0, 0.0),
        exponent: 0,
    };

    /// Product of `pivots`, negated when `odd_parity` is set.
    ///
    /// The running mantissa stays within [1e-12, 1e12) and every factor is
    /// brought into that range before it is multiplied in, so no intermediate
    /// product can leave the `f64` range. A non-finite pivot yields a NaN
    /// mantissa.
    pub fn from_pivots(pivots: &[Complex64], odd_parity: bool) -> Self {
        let mut mantissa = Complex64::new(1.0, 0.0);
        let mut exponent = 0i32;

        for &pivot in pivots {
            if !(pivot.re.is_finite() && pivot.im.is_finite()) {
                log::warn!("non-finite pivot {} in determinant", pivot);
                return Self {
                    mantissa: Complex64::new(f64::NAN, f64::NAN),
                    exponent: 0,
                };
            }
            let (factor, factor_exp) = split(pivot);
            if norm(factor) == 0.0 {
                return Self::ZERO;
            }
            mantissa *= factor;
            exponent += factor_exp;

            let mut size = norm(mantissa);
            while size >= RESCALE {
                mantissa /= RESCALE;
                exponent += RESCALE_EXP;
                size = norm(mantissa);
            }
            while size < 1.0 / RESCALE {
                mantissa *= RESCALE;
                exponent -= RESCALE_EXP;
                size = norm(mantissa);
            }
        }

        let mut size = norm(mantissa);
        while size >= 10.0 {
            mantissa /= 10.0;
            exponent += 1;
            size = norm(mantissa);
        }
        while size < 1.0 {
            mantissa *= 10.0;
            exponent -= 1;
            size = norm(mantissa);
        }

        if odd_parity {
            mantissa = -mantissa;
        }
        Self { mantissa, exponent }
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.re == 0.0 && self.mantissa.im == 0.0
    }

    /// The determinant as a plain number. Overflows to infinity or
    /// underflows to zero outside the `f64` range.
    pub fn value(&self) -> Complex64 {
        self.mantissa * 10f64.powi(self.exponent)
    }

    /// Re-express as a power of two.
    pub fn to_base2(&self) -> Base2Determinant {
        if self.is_zero() {
            return Base2Determinant {
                mantissa: Complex64::new(0.0, 0.0),
                exponent: 0,
            };
        }

        let y = f64::from(self.exponent) * LN_10 / LN_2;
        let whole = y.trunc();
        let mantissa = self.mantissa * 2f64.powf(y - whole);

        let shift = [mantissa.re, mantissa.im]
            .iter()
            .filter(|c| **c != 0.0)
            .map(|c| c.abs().log2().floor() as i32)
            .max()
            .unwrap_or(0);

        Base2Determinant {
            mantissa: mantissa * 2f64.powi(-shift),
            exponent: whole as i32 + shift,
        }
    }
}

impl fmt::Display for Determinant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mantissa.im == 0.0 {
            write!(f, "{}e{}", self.mantissa.re, self.exponent)
        } else {
            write!(
                f,
                "({}, {})e{}",
                self.mantissa.re, self.mantissa.im, self.exponent
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real(values: &[f64]) -> Vec<Complex64> {
        values.iter().map(|&v| Complex64::new(v, 0.0)).collect()
    }

    #[test]
    fn test_diagonal_two_by_five() {
        let det = Determinant::from_pivots(&real(&[2.0, 5.0]), false);
        assert_eq!(det.mantissa, Complex64::new(1.0, 0.0));
        assert_eq!(det.exponent, 1);
    }

    #[test]
    fn test_odd_parity_negates() {
        let det = Determinant::from_pivots(&real(&[2.0, 5.0]), true);
        assert_eq!(det.mantissa, Complex64::new(-1.0, 0.0));
        assert_eq!(det.exponent, 1);
    }

    #[test]
    fn test_no_overflow_on_long_products() {
        // 400 pivots of 1e9 would be 1e3600
        let det = Determinant::from_pivots(&real(&[1e9; 400]), false);
        assert_eq!(det.exponent, 3600);
        assert!((det.mantissa.re - 1.0).abs() < 1e-9);

        // 2^-12000
        let det = Determinant::from_pivots(&real(&[2f64.powi(-30); 400]), false);
        let log10 = f64::from(det.exponent) + det.mantissa.re.log10();
        assert!((log10 + 12000.0 * 2f64.log10()).abs() < 1e-9);
        assert!(det.mantissa.re >= 1.0 && det.mantissa.re < 10.0);
    }

    fn log10_of(det: &Determinant) -> f64 {
        f64::from(det.exponent) + det.mantissa.re.abs().log10()
    }

    #[test]
    fn test_pivots_near_f64_limits() {
        let det = Determinant::from_pivots(&real(&[1e11, 1e300]), false);
        assert!((log10_of(&det) - 311.0).abs() < 1e-9, "{}", det);

        let det = Determinant::from_pivots(&real(&[1e300, 1e300, 1e-300, 1e11]), false);
        assert!((log10_of(&det) - 311.0).abs() < 1e-9, "{}", det);

        // Subnormal pivot
        let det = Determinant::from_pivots(&real(&[1e-11, 1e-320]), true);
        assert!(det.mantissa.re < 0.0);
        assert!((log10_of(&det) + 331.0).abs() < 1e-3, "{}", det);
    }

    #[test]
    fn test_non_finite_pivot_terminates() {
        let det = Determinant::from_pivots(&real(&[2.0, f64::INFINITY, 3.0]), false);
        assert!(det.mantissa.re.is_nan());
        assert!(!det.is_zero());
    }

    #[test]
    fn test_zero_pivot() {
        let det = Determinant::from_pivots(&real(&[3.0, 0.0, 4.0]), false);
        assert!(det.is_zero());
        assert_eq!(det.exponent, 0);
    }

    #[test]
    fn test_complex_uses_larger_component() {
        // (0 + 20j) * 1 -> norm 20 -> (0 + 2j) * 10^1
        let det = Determinant::from_pivots(&[Complex64::new(0.0, 20.0), Complex64::new(1.0, 0.0)], false);
        assert_eq!(det.exponent, 1);
        assert!((det.mantissa.im - 2.0).abs() < 1e-15);
        assert_eq!(det.mantissa.re, 0.0);
    }

    #[test]
    fn test_base2() {
        let det = Determinant::from_pivots(&real(&[2.0, 5.0]), false);
        let b2 = det.to_base2();
        // 10 = 1.25 * 2^3
        assert_eq!(b2.exponent, 3);
        assert!((b2.mantissa.re - 1.25).abs() < 1e-12);

        let value = b2.mantissa.re * 2f64.powi(b2.exponent);
        assert!((value - det.value().re).abs() < 1e-9);
    }

    #[test]
    fn test_base2_zero() {
        let b2 = Determinant::ZERO.to_base2();
        assert_eq!(b2.exponent, 0);
        assert_eq!(b2.mantissa, Complex64::new(0.0, 0.0));
    }
}
