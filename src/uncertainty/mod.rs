//! # Uncertainty Calculation
//!
//! Standard errors of fitted parameters from the Jacobian at the solution:
//!
//! - Covariance matrix estimation, `σ² (JᵀJ)⁻¹` with `σ² = SSE / (m − n)`
//! - Correlation matrix
//! - Standard errors keyed by parameter name

mod covariance;

pub use covariance::{calculate_correlation, calculate_covariance, standard_errors_from_covariance};

use crate::error::{Result, WellTestError};
use log::debug;
use ndarray::Array2;
use std::collections::BTreeMap;

/// Standard errors of the fitted parameters.
///
/// # Arguments
///
/// * `names` - Names of the fitted parameters, one per Jacobian column
/// * `jacobian` - Jacobian of the residuals at the solution
/// * `sse` - Sum of squared residuals at the solution
///
/// # Returns
///
/// * A name → standard error map, or an error when there are no degrees of
///   freedom left or `JᵀJ` is singular
pub fn standard_errors(
    names: &[String],
    jacobian: &Array2<f64>,
    sse: f64,
) -> Result<BTreeMap<String, f64>> {
    let (m, n) = jacobian.dim();
    if names.len() != n {
        return Err(WellTestError::DimensionMismatch(format!(
            "{} parameter names for {} Jacobian columns",
            names.len(),
            n
        )));
    }
    if m <= n {
        return Err(WellTestError::InvalidInput(format!(
            "{} residuals leave no degrees of freedom for {} parameters",
            m, n
        )));
    }

    let redchi = sse / (m - n) as f64;
    let covar = calculate_covariance(jacobian, redchi)?;
    let errors = standard_errors_from_covariance(&covar)?;
    debug!("Standard errors from {} residuals, reduced chi-square {:.6e}", m, redchi);

    Ok(names.iter().cloned().zip(errors.iter().copied()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn test_standard_errors_by_name() {
        // straight line through 4 points: J = [1, x]
        let jacobian = arr2(&[[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]]);
        let names = vec!["a".to_string(), "b".to_string()];
        let errors = standard_errors(&names, &jacobian, 0.2).unwrap();

        // JᵀJ = [[4, 6], [6, 14]], det = 20; σ² = 0.1
        assert_relative_eq!(errors["a"], (0.1 * 14.0 / 20.0_f64).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(errors["b"], (0.1 * 4.0 / 20.0_f64).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_no_degrees_of_freedom() {
        let jacobian = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        let names = vec!["a".to_string(), "b".to_string()];
        assert!(standard_errors(&names, &jacobian, 1.0).is_err());
        assert!(standard_errors(&names[..1], &jacobian, 1.0).is_err());
    }
}
