//! Step calculation for the Levenberg-Marquardt algorithm.
//!
//! The step solves the damped normal equations
//! `(JᵀJ + λ·diag(JᵀJ)) Δ = −Jᵀr`. The system is symmetrically scaled by
//! `diag(JᵀJ)^{-1/2}` before elimination so that parameters of very different
//! magnitude (permeability against interporosity coefficient) do not trip the
//! relative pivot test.

use crate::error::{Result, WellTestError};
use crate::lm::solver;
use ndarray::{Array1, Array2};

/// Result of a Levenberg-Marquardt step calculation.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The calculated step vector
    pub step: Array1<f64>,
}

/// Handles step calculation for the Levenberg-Marquardt algorithm.
pub struct LmStep;

impl LmStep {
    /// Calculates the Levenberg-Marquardt step.
    ///
    /// # Arguments
    ///
    /// * `jacobian` - The Jacobian matrix at the current position
    /// * `residuals` - The residuals at the current position
    /// * `lambda` - The damping parameter
    ///
    /// # Returns
    ///
    /// * The step result, or `SingularMatrix` when a parameter has no
    ///   influence on the residuals or the scaled system is singular
    pub fn calculate_step(
        jacobian: &Array2<f64>,
        residuals: &Array1<f64>,
        lambda: f64,
    ) -> Result<StepResult> {
        let j_t_j = jacobian.t().dot(jacobian);
        let j_t_r = jacobian.t().dot(residuals);
        let n = j_t_j.nrows();

        let diag: Array1<f64> = j_t_j.diag().to_owned();
        if diag.iter().any(|d| !(d.is_finite() && *d > 0.0)) {
            return Err(WellTestError::SingularMatrix);
        }
        let scale = diag.mapv(|d| 1.0 / d.sqrt());

        // D^{-1/2} (JᵀJ + λ diag) D^{-1/2} has ones (plus λ) on the diagonal
        let mut scaled = Array2::zeros((n, n));
        for i in 0..n {
            for j in 0..n {
                scaled[[i, j]] = j_t_j[[i, j]] * scale[i] * scale[j];
            }
            scaled[[i, i]] += lambda;
        }
        let rhs = Array1::from_shape_fn(n, |i| -j_t_r[i] * scale[i]);

        let scaled_step = solver::solve(&scaled, &rhs)?;
        let step = &scaled_step * &scale;

        Ok(StepResult { step })
    }
}
