//! Reference polynomial fitting and evaluation
//!
//! The reference path arrives as a list of waypoints, but the optimiser
//! needs a curve it can evaluate (and differentiate) at arbitrary points.
//! This module provides the least squares polynomial fit which bridges the
//! two, along with the evaluation functions used by the kinematic model.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs while fitting the reference polynomial.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("Polynomial degree must be at least 1, got {0}")]
    DegreeTooLow(usize),

    #[error("Mismatched sample lengths: {0} x values but {1} y values")]
    MismatchedSamples(usize, usize),

    #[error("Need at least {0} points to fit a degree {1} polynomial, got {2}")]
    TooFewPoints(usize, usize, usize),

    /// The design matrix has no unique least squares solution, for example
    /// because the waypoints share x coordinates.
    #[error("The design matrix is singular")]
    SingularDesignMatrix
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Fit a polynomial of the given degree to the sample points.
///
/// Returns the coefficients in ascending degree order, so the result has
/// `degree + 1` entries and the curve is `sum(c[i] * x^i)`.
///
/// The least squares problem is solved through a QR decomposition of the
/// Vandermonde design matrix rather than the normal equations, which keeps
/// the solve numerically stable for the short, closely spaced waypoint runs
/// this module sees.
pub fn fit(xs: &[f64], ys: &[f64], degree: usize)
    -> Result<Vec<f64>, FitError>
{
    if degree < 1 {
        return Err(FitError::DegreeTooLow(degree))
    }
    if xs.len() != ys.len() {
        return Err(FitError::MismatchedSamples(xs.len(), ys.len()))
    }
    if xs.len() < degree + 1 {
        return Err(FitError::TooFewPoints(degree + 1, degree, xs.len()))
    }

    // Vandermonde design matrix, column j is x^j
    let design = DMatrix::from_fn(
        xs.len(),
        degree + 1,
        |i, j| xs[i].powi(j as i32)
    );

    // Multiply the samples by Q^T in place, then back substitute through R
    let qr = design.qr();
    let mut rhs = DVector::from_column_slice(ys);
    qr.q_tr_mul(&mut rhs);

    let coeffs = match qr.r().solve_upper_triangular(&rhs.rows(0, degree + 1)) {
        Some(c) => c,
        None => return Err(FitError::SingularDesignMatrix)
    };

    // A rank deficient system can also surface as non-finite coefficients
    if coeffs.iter().any(|c| !c.is_finite()) {
        return Err(FitError::SingularDesignMatrix)
    }

    Ok(coeffs.as_slice().to_vec())
}

/// Evaluate the polynomial at `x` using Horner's scheme.
pub fn eval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Evaluate the first derivative of the polynomial at `x`.
pub fn eval_diff(coeffs: &[f64], x: f64) -> f64 {
    let mut result = 0.0;

    for (i, c) in coeffs.iter().enumerate().skip(1) {
        result += i as f64 * c * x.powi(i as i32 - 1);
    }

    result
}

/// Evaluate the second derivative of the polynomial at `x`.
pub fn eval_diff2(coeffs: &[f64], x: f64) -> f64 {
    let mut result = 0.0;

    for (i, c) in coeffs.iter().enumerate().skip(2) {
        result += (i * (i - 1)) as f64 * c * x.powi(i as i32 - 2);
    }

    result
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// Points lying exactly on a polynomial should be recovered exactly.
    #[test]
    fn test_fit_exact() {
        let truth = [1.0, -0.5, 0.25, 0.05];
        let xs: Vec<f64> = (-3..=3).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| eval(&truth, x)).collect();

        let coeffs = fit(&xs, &ys, 3).unwrap();

        assert_eq!(coeffs.len(), 4);
        for (&x, &y) in xs.iter().zip(ys.iter()) {
            assert!((eval(&coeffs, x) - y).abs() < 1e-6);
        }
    }

    /// A lower degree curve fitted with a higher degree polynomial should
    /// still reproduce the samples.
    #[test]
    fn test_fit_overdetermined() {
        let xs: Vec<f64> = (0..8).map(|i| i as f64 * 0.5).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 2.0 - 0.3 * x).collect();

        let coeffs = fit(&xs, &ys, 3).unwrap();

        for (&x, &y) in xs.iter().zip(ys.iter()) {
            assert!((eval(&coeffs, x) - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_fit_errors() {
        assert!(matches!(
            fit(&[0.0, 1.0], &[0.0, 1.0], 0),
            Err(FitError::DegreeTooLow(0))
        ));
        assert!(matches!(
            fit(&[0.0, 1.0], &[0.0], 1),
            Err(FitError::MismatchedSamples(2, 1))
        ));
        assert!(matches!(
            fit(&[0.0, 1.0], &[0.0, 1.0], 2),
            Err(FitError::TooFewPoints(3, 2, 2))
        ));
        // Coincident x values leave the second column of the design matrix
        // linearly dependent on the first
        assert!(matches!(
            fit(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0], 1),
            Err(FitError::SingularDesignMatrix)
        ));
    }

    /// The analytic derivatives should match a central finite difference.
    #[test]
    fn test_derivative_consistency() {
        let coeffs = [0.3, -1.2, 0.8, -0.1];
        let h = 1e-6;

        for i in -10..=10 {
            let x = i as f64 * 0.37;

            let num_diff = (eval(&coeffs, x + h) - eval(&coeffs, x - h))
                / (2.0 * h);
            assert!((eval_diff(&coeffs, x) - num_diff).abs() < 1e-5);

            let num_diff2 =
                (eval_diff(&coeffs, x + h) - eval_diff(&coeffs, x - h))
                / (2.0 * h);
            assert!((eval_diff2(&coeffs, x) - num_diff2).abs() < 1e-5);
        }
    }
}
