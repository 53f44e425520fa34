//! # Covariance Matrix Calculations
//!
//! Functions for estimating the parameter covariance matrix from the Jacobian
//! at the solution of a least-squares fit.

use crate::error::{Result, WellTestError};
use crate::utils::matrix_convert::{diagonal, nalgebra_to_ndarray, ndarray_to_nalgebra};
use ndarray::{Array1, Array2};

/// Calculate the covariance matrix from a Jacobian.
///
/// For nonlinear least-squares problems the covariance matrix is estimated as
///
/// ```text
/// covar = redchi * inv(JᵀJ)
/// ```
///
/// where `redchi` is the reduced chi-square (SSE / degrees of freedom).
///
/// # Errors
///
/// * `SingularMatrix` if `JᵀJ` cannot be inverted
pub fn calculate_covariance(jacobian: &Array2<f64>, redchi: f64) -> Result<Array2<f64>> {
    let jtj = ndarray_to_nalgebra(&jacobian.t().dot(jacobian));
    let inverse = jtj.try_inverse().ok_or(WellTestError::SingularMatrix)?;
    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(WellTestError::SingularMatrix);
    }
    Ok(nalgebra_to_ndarray(&inverse) * redchi)
}

/// Calculate the correlation matrix from a covariance matrix.
///
/// `correl[i,j] = covar[i,j] / sqrt(covar[i,i] * covar[j,j])`, with 1 on the
/// diagonal and 0 where a variance is not positive.
pub fn calculate_correlation(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            return 1.0;
        }
        let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
        if denom > 0.0 {
            covar[[i, j]] / denom
        } else {
            0.0
        }
    })
}

/// Extract standard errors (square roots of the diagonal) from a covariance
/// matrix. Negative variances, which only round-off produces, map to 0.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Result<Array1<f64>> {
    Ok(diagonal(covar)?.mapv(|v| if v > 0.0 { v.sqrt() } else { 0.0 }))
}
