//! Configuration options for the Levenberg-Marquardt algorithm.
//!
//! This module defines the configuration options and parameter settings for the
//! Levenberg-Marquardt algorithm: convergence criteria, damping schedule and the
//! finite-difference step.

use crate::error::{Result, WellTestError};
use crate::utils::finite_difference::DEFAULT_RELATIVE_STEP;
use serde::{Deserialize, Serialize};

/// Configuration options for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Maximum number of accepted iterations. Default: 100
    pub max_iterations: usize,

    /// Maximum number of rejected steps (with increasing damping) tried
    /// before giving up on an iteration. Default: 10
    pub max_step_retries: usize,

    /// Tolerance for relative change in the sum of squared residuals. Default: 1e-8
    pub ftol: f64,

    /// Tolerance for relative change in parameter values. Default: 1e-8
    pub xtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-12
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e12
    pub max_lambda: f64,

    /// Relative finite-difference step for the Jacobian. Default: 1e-6
    pub fd_relative_step: f64,

    /// Whether to return the Jacobian at the solution. Default: false
    pub calc_jacobian: bool,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_step_retries: 10,
            ftol: 1e-8,
            xtol: 1e-8,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e12,
            fd_relative_step: DEFAULT_RELATIVE_STEP,
            calc_jacobian: false,
        }
    }
}

impl LmConfig {
    /// Check that the settings describe a usable damping schedule.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` naming the first offending setting
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("ftol", self.ftol),
            ("xtol", self.xtol),
            ("initial_lambda", self.initial_lambda),
            ("min_lambda", self.min_lambda),
            ("max_lambda", self.max_lambda),
            ("fd_relative_step", self.fd_relative_step),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return Err(WellTestError::InvalidInput(format!(
                "{} must be positive and finite, got {}",
                name, value
            )));
        }
        if !(self.lambda_up_factor > 1.0 && self.lambda_up_factor.is_finite()) {
            return Err(WellTestError::InvalidInput(format!(
                "lambda_up_factor must be greater than 1, got {}",
                self.lambda_up_factor
            )));
        }
        if !(self.lambda_down_factor > 0.0 && self.lambda_down_factor < 1.0) {
            return Err(WellTestError::InvalidInput(format!(
                "lambda_down_factor must lie in (0, 1), got {}",
                self.lambda_down_factor
            )));
        }
        if self.min_lambda > self.max_lambda {
            return Err(WellTestError::InvalidInput(format!(
                "min_lambda ({}) exceeds max_lambda ({})",
                self.min_lambda, self.max_lambda
            )));
        }
        if self.max_step_retries == 0 {
            return Err(WellTestError::InvalidInput(
                "max_step_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Damping after an accepted step.
    pub(crate) fn decrease_lambda(&self, lambda: f64) -> f64 {
        (lambda * self.lambda_down_factor).clamp(self.min_lambda, self.max_lambda)
    }

    /// Damping after a rejected step.
    pub(crate) fn increase_lambda(&self, lambda: f64) -> f64 {
        (lambda * self.lambda_up_factor).clamp(self.min_lambda, self.max_lambda)
    }
}
