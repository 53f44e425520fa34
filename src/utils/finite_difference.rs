//! Finite difference methods for numerical differentiation.
//!
//! This module provides the forward-difference Jacobian used by the
//! Levenberg-Marquardt optimizer. Steps are relative to the parameter
//! magnitude and respect the problem's upper bounds.
//!
//! The magnitude of a parameter is floored by the smallest non-zero magnitude
//! of its bounds, so a parameter that passes through zero (skin) keeps a step
//! comparable to its physical range instead of collapsing with its value.

use crate::error::{Result, WellTestError};
use crate::parameters::Bounds;
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Default relative step for finite differences.
///
/// Large compared to machine epsilon because the models are themselves
/// numerical approximations (Laplace inversion) with ~1e-8 relative noise.
pub const DEFAULT_RELATIVE_STEP: f64 = 1e-6;

/// Smallest non-zero finite magnitude of the bounds, or 0 when there is none.
pub fn bound_scale(bounds: &Bounds) -> f64 {
    [bounds.min.abs(), bounds.max.abs()]
        .into_iter()
        .filter(|b| b.is_finite() && *b > 0.0)
        .fold(None, |acc: Option<f64>, b| Some(acc.map_or(b, |a| a.min(b))))
        .unwrap_or(0.0)
}

/// Step used to perturb parameter `value`: `rel·max(|value|, scale)`, or
/// `rel` when both are zero.
pub fn step_size(value: f64, scale: f64, relative_step: f64) -> f64 {
    let magnitude = value.abs().max(scale);
    if magnitude > 0.0 {
        magnitude * relative_step
    } else {
        relative_step
    }
}

/// Compute the Jacobian matrix using forward finite differences.
///
/// The Jacobian is the matrix of partial derivatives of the residuals with
/// respect to the parameters: J[i,j] = ∂residual[i]/∂param[j].
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `relative_step` - The relative step size (optional)
///
/// # Returns
///
/// * `Result<Array2<f64>>` - The Jacobian matrix
pub fn jacobian<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    relative_step: Option<f64>,
) -> Result<Array2<f64>> {
    let residuals = problem.eval(params)?;
    jacobian_with_residuals(problem, params, &residuals, relative_step)
}

/// Forward-difference Jacobian reusing residuals already evaluated at `params`.
///
/// When `params[j] + h` would exceed the upper bound of parameter `j`, a
/// backward difference is taken instead so the problem is never evaluated
/// outside its bounds.
pub fn jacobian_with_residuals<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    residuals: &Array1<f64>,
    relative_step: Option<f64>,
) -> Result<Array2<f64>> {
    let rel = relative_step.unwrap_or(DEFAULT_RELATIVE_STEP);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    // Check residual dimensions
    if residuals.len() != n_residuals {
        return Err(WellTestError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            n_residuals,
            residuals.len()
        )));
    }

    let bounds = problem.bounds();
    let mut jac = Array2::zeros((n_residuals, n_params));

    for j in 0..n_params {
        let scale = bounds.get(j).map_or(0.0, bound_scale);
        let mut h = step_size(params[j], scale, rel);
        if let Some(b) = bounds.get(j) {
            if params[j] + h > b.max {
                h = -h;
            }
        }

        let mut params_perturbed = params.clone();
        params_perturbed[j] += h;
        let residuals_perturbed = problem.eval(&params_perturbed)?;
        if residuals_perturbed.len() != n_residuals {
            return Err(WellTestError::DimensionMismatch(format!(
                "Expected {} residuals, got {}",
                n_residuals,
                residuals_perturbed.len()
            )));
        }

        // the actual increment, not h, after floating-point rounding
        let dx = params_perturbed[j] - params[j];
        let mut column = jac.column_mut(j);
        for i in 0..n_residuals {
            column[i] = (residuals_perturbed[i] - residuals[i]) / dx;
        }
    }

    Ok(jac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Bounds;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// r = [a·x² - y, exp(b) - z]
    struct Curved {
        upper: f64,
    }

    impl Problem for Curved {
        fn eval(&self, p: &Array1<f64>) -> Result<Array1<f64>> {
            if p[0] > self.upper {
                return Err(WellTestError::FunctionEvaluation(
                    "evaluated above the upper bound".to_string(),
                ));
            }
            Ok(array![3.0 * p[0] * p[0] - 1.0, p[1].exp() - 2.0])
        }

        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            2
        }

        fn bounds(&self) -> Vec<Bounds> {
            vec![Bounds::new(0.0, self.upper).unwrap(), Bounds::unbounded()]
        }
    }

    #[test]
    fn test_step_size() {
        assert_eq!(step_size(0.0, 0.0, 1e-6), 1e-6);
        assert_relative_eq!(step_size(-200.0, 0.0, 1e-6), 2e-4);
        // small values keep a step relative to themselves
        assert_relative_eq!(step_size(1e-8, 1e-10, 1e-6), 1e-14);
        // values near zero are floored by the bound scale
        assert_relative_eq!(step_size(1e-9, 5.0, 1e-6), 5e-6);
    }

    #[test]
    fn test_bound_scale() {
        assert_eq!(bound_scale(&Bounds::new(-5.0, 100.0).unwrap()), 5.0);
        assert_eq!(bound_scale(&Bounds::new(0.0, 2.0).unwrap()), 2.0);
        assert_eq!(bound_scale(&Bounds::new(1e-10, 1e-2).unwrap()), 1e-10);
        assert_eq!(bound_scale(&Bounds::unbounded()), 0.0);
    }

    #[test]
    fn test_forward_jacobian() {
        let problem = Curved { upper: 10.0 };
        let params = array![2.0, 0.5];
        let jac = jacobian(&problem, &params, None).unwrap();
        assert_relative_eq!(jac[[0, 0]], 12.0, max_relative = 1e-5);
        assert_relative_eq!(jac[[1, 1]], 0.5_f64.exp(), max_relative = 1e-5);
        assert_eq!(jac[[0, 1]], 0.0);
        assert_eq!(jac[[1, 0]], 0.0);
    }

    #[test]
    fn test_backward_difference_at_upper_bound() {
        let problem = Curved { upper: 2.0 };
        let params = array![2.0, 0.0];
        // a forward step would fail: the problem refuses points above 2.0
        let jac = jacobian(&problem, &params, Some(1e-7)).unwrap();
        assert_relative_eq!(jac[[0, 0]], 12.0, max_relative = 1e-5);
    }

    #[test]
    fn test_residual_length_checked() {
        let problem = Curved { upper: 10.0 };
        let err = jacobian_with_residuals(&problem, &array![1.0, 1.0], &array![0.0], None)
            .unwrap_err();
        assert!(matches!(err, WellTestError::DimensionMismatch(_)));
    }
}
