//! Convergence criteria for the optimizer.
//!
//! This module defines why an optimization stopped and the criteria used to
//! decide that it has converged.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Why an optimization run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A convergence criterion was met, or no step could lower the residuals further.
    Converged,

    /// The iteration cap was reached.
    MaxIterations,

    /// The run was cancelled through its cancel token.
    Cancelled,

    /// The damped normal equations could not be solved.
    SingularJacobian,
}

impl StopReason {
    /// Returns true if the optimization has converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, StopReason::Converged)
    }

    /// Returns a description of the stop reason.
    pub fn description(&self) -> String {
        match self {
            StopReason::Converged => "Converged".to_string(),
            StopReason::MaxIterations => "Terminated: maximum iterations reached".to_string(),
            StopReason::Cancelled => "Terminated: cancelled".to_string(),
            StopReason::SingularJacobian => "Failed: singular Jacobian".to_string(),
        }
    }
}

/// Criteria for determining when an optimization algorithm has converged.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    /// Tolerance for relative change in parameter values.
    pub xtol: f64,

    /// Tolerance for relative change in the sum of squared residuals.
    pub ftol: f64,

    /// Maximum number of iterations.
    pub max_iterations: usize,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            xtol: 1e-8,
            ftol: 1e-8,
            max_iterations: 100,
        }
    }
}

impl ConvergenceCriteria {
    /// Creates a new set of convergence criteria with the given tolerances.
    pub fn new(xtol: f64, ftol: f64, max_iterations: usize) -> Self {
        Self {
            xtol,
            ftol,
            max_iterations,
        }
    }

    /// Checks the state after an accepted step.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values before the step
    /// * `new_params` - The parameter values after the step
    /// * `cost` - The sum of squared residuals before the step
    /// * `new_cost` - The sum of squared residuals after the step
    /// * `iterations` - The number of accepted iterations so far
    ///
    /// # Returns
    ///
    /// * `Some(reason)` if the run should stop, `None` to continue
    pub fn check(
        &self,
        params: &Array1<f64>,
        new_params: &Array1<f64>,
        cost: f64,
        new_cost: f64,
        iterations: usize,
    ) -> Option<StopReason> {
        if new_cost == 0.0 {
            return Some(StopReason::Converged);
        }

        let improvement = (cost - new_cost) / cost;
        if improvement < self.ftol {
            return Some(StopReason::Converged);
        }

        if relative_step(params, new_params) < self.xtol {
            return Some(StopReason::Converged);
        }

        if iterations >= self.max_iterations {
            return Some(StopReason::MaxIterations);
        }

        None
    }
}

/// Largest relative parameter change `|new - old| / |old|` over all parameters.
pub fn relative_step(params: &Array1<f64>, new_params: &Array1<f64>) -> f64 {
    new_params
        .iter()
        .zip(params.iter())
        .map(|(a, b)| {
            let change = (a - b).abs();
            if change == 0.0 {
                0.0
            } else {
                change / b.abs().max(f64::MIN_POSITIVE)
            }
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_stop_reason() {
        assert!(StopReason::Converged.is_converged());
        assert!(!StopReason::Cancelled.is_converged());
        assert!(StopReason::SingularJacobian.description().contains("singular"));
        assert_eq!(
            serde_json::to_string(&StopReason::MaxIterations).unwrap(),
            "\"max_iterations\""
        );
    }

    #[test]
    fn test_relative_step_uses_parameter_scale() {
        // small parameters are not declared converged by absolute changes
        let old = array![1e-6, 10.0];
        let new = array![1.1e-6, 10.0];
        assert!((relative_step(&old, &new) - 0.1).abs() < 1e-9);
        assert_eq!(relative_step(&old, &old), 0.0);
    }

    #[test]
    fn test_check() {
        let criteria = ConvergenceCriteria::new(1e-8, 1e-8, 5);
        let a = array![1.0, 2.0];
        let b = array![1.5, 2.0];

        assert_eq!(criteria.check(&a, &b, 10.0, 5.0, 1), None);
        assert_eq!(criteria.check(&a, &b, 10.0, 0.0, 1), Some(StopReason::Converged));
        assert_eq!(
            criteria.check(&a, &b, 10.0, 10.0 - 1e-9, 1),
            Some(StopReason::Converged)
        );
        let tiny = array![1.0 + 1e-10, 2.0];
        assert_eq!(criteria.check(&a, &tiny, 10.0, 5.0, 1), Some(StopReason::Converged));
        assert_eq!(criteria.check(&a, &b, 10.0, 5.0, 5), Some(StopReason::MaxIterations));
    }
}
