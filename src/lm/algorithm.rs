//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! This module contains the bounded Levenberg-Marquardt loop used for every
//! fit: Marquardt-scaled damping, hard clamping of trial points into the
//! parameter bounds, a bounded number of damping retries per iteration and
//! cooperative cancellation.

use ndarray::{Array1, Array2};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::error::{Result, WellTestError};
use crate::parameters::Bounds;
use crate::problem::Problem;
use crate::utils::finite_difference;

use super::config::LmConfig;
use super::convergence::{ConvergenceCriteria, StopReason};
use super::step::LmStep;

/// Shared cancellation flag.
///
/// Clones share the same flag; the optimizer checks it before every iteration
/// and before every damping retry.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Snapshot handed to the observer after every accepted iteration.
#[derive(Debug, Clone)]
pub struct LmIteration {
    /// Accepted iteration number, starting at 1
    pub iteration: usize,

    /// Sum of squared residuals after the step
    pub sse: f64,

    /// Damping parameter after the step
    pub lambda: f64,

    /// Parameter values after the step
    pub params: Array1<f64>,
}

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Best parameter values found
    pub params: Array1<f64>,

    /// Residuals at the best parameters
    pub residuals: Array1<f64>,

    /// Sum of squared residuals at the best parameters
    pub cost: f64,

    /// Number of accepted iterations
    pub iterations: usize,

    /// Number of function evaluations (Jacobian evaluations included)
    pub func_evals: usize,

    /// Why the run stopped
    pub stop_reason: StopReason,

    /// The Jacobian matrix at the solution (if requested)
    pub jacobian: Option<Array2<f64>>,
}

impl LmResult {
    /// Whether the run converged.
    pub fn success(&self) -> bool {
        self.stop_reason.is_converged()
    }
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success())?;
        writeln!(f, "  Message: {}", self.stop_reason.description())?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// Outcome of one iteration's search for an acceptable step.
enum StepSearch {
    Accepted {
        params: Array1<f64>,
        residuals: Array1<f64>,
        cost: f64,
    },
    Exhausted {
        singular: bool,
    },
    Cancelled,
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self {
            config: LmConfig::default(),
        }
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    /// The current configuration.
    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the maximum number of damping retries per iteration.
    pub fn with_max_step_retries(mut self, retries: usize) -> Self {
        self.config.max_step_retries = retries;
        self
    }

    /// Set the tolerance for change in the sum of squared residuals.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    /// Set the tolerance for change in parameter values.
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    /// Set the factor by which to increase lambda.
    pub fn with_lambda_up_factor(mut self, factor: f64) -> Self {
        self.config.lambda_up_factor = factor;
        self
    }

    /// Set the factor by which to decrease lambda.
    pub fn with_lambda_down_factor(mut self, factor: f64) -> Self {
        self.config.lambda_down_factor = factor;
        self
    }

    /// Set the relative finite-difference step.
    pub fn with_fd_relative_step(mut self, step: f64) -> Self {
        self.config.fd_relative_step = step;
        self
    }

    /// Set whether to return the Jacobian at the solution.
    pub fn with_calc_jacobian(mut self, calc_jacobian: bool) -> Self {
        self.config.calc_jacobian = calc_jacobian;
        self
    }

    /// Minimize the sum of squared residuals of `problem` from `initial_params`.
    ///
    /// # Errors
    ///
    /// * `DimensionMismatch` if `initial_params` does not match the problem
    /// * `InvalidInput` if the configuration is invalid
    /// * any error of the first residual evaluation, or `FunctionEvaluation`
    ///   if its sum of squares is not finite
    pub fn minimize<P: Problem + ?Sized>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
    ) -> Result<LmResult> {
        self.minimize_with(problem, initial_params, &CancelToken::new(), |_| {})
    }

    /// Minimize with a cancel token and an observer called after every
    /// accepted iteration.
    ///
    /// Numerical failures after the first evaluation (non-finite residuals,
    /// evaluation errors, singular systems) never abort the run: they count
    /// as rejected steps.
    pub fn minimize_with<P, F>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
        cancel: &CancelToken,
        mut observer: F,
    ) -> Result<LmResult>
    where
        P: Problem + ?Sized,
        F: FnMut(&LmIteration),
    {
        self.config.validate()?;
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(WellTestError::DimensionMismatch(format!(
                "Expected {} initial parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let bounds = problem.bounds();
        let mut params = clamp_to_bounds(initial_params, &bounds);
        let mut residuals = problem.eval(&params)?;
        let mut cost = sum_of_squares(&residuals);
        let mut func_evals = 1;
        if !cost.is_finite() {
            return Err(WellTestError::FunctionEvaluation(
                "Initial residuals are not finite".to_string(),
            ));
        }

        let criteria = ConvergenceCriteria::new(
            self.config.xtol,
            self.config.ftol,
            self.config.max_iterations,
        );
        let mut lambda = self
            .config
            .initial_lambda
            .clamp(self.config.min_lambda, self.config.max_lambda);
        let mut iterations = 0;

        debug!("LM start: {} parameters, initial SSE {:.6e}", n_params, cost);

        let stop_reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if n_params == 0 || cost == 0.0 {
                break StopReason::Converged;
            }
            if iterations >= self.config.max_iterations {
                break StopReason::MaxIterations;
            }

            let jacobian = match self.jacobian(problem, &params, &residuals) {
                Ok(jacobian) => jacobian,
                Err(e) => {
                    warn!("Jacobian evaluation failed: {}", e);
                    break StopReason::SingularJacobian;
                }
            };
            func_evals += n_params;

            let search = self.search_step(
                problem,
                &bounds,
                &params,
                &residuals,
                cost,
                &jacobian,
                &mut lambda,
                &mut func_evals,
                cancel,
            );

            match search {
                StepSearch::Cancelled => break StopReason::Cancelled,
                StepSearch::Exhausted { singular: true } => {
                    warn!("No solvable damped system after {} retries", self.config.max_step_retries);
                    break StopReason::SingularJacobian;
                }
                StepSearch::Exhausted { singular: false } => {
                    debug!("No step lowers SSE {:.6e}; local minimum reached", cost);
                    break StopReason::Converged;
                }
                StepSearch::Accepted {
                    params: new_params,
                    residuals: new_residuals,
                    cost: new_cost,
                } => {
                    iterations += 1;
                    lambda = self.config.decrease_lambda(lambda);
                    let status = criteria.check(&params, &new_params, cost, new_cost, iterations);

                    params = new_params;
                    residuals = new_residuals;
                    cost = new_cost;

                    debug!(
                        "LM iteration {}: SSE {:.6e}, lambda {:.1e}",
                        iterations, cost, lambda
                    );
                    observer(&LmIteration {
                        iteration: iterations,
                        sse: cost,
                        lambda,
                        params: params.clone(),
                    });

                    if let Some(reason) = status {
                        break reason;
                    }
                }
            }
        };

        let jacobian = if self.config.calc_jacobian && n_params > 0 {
            match self.jacobian(problem, &params, &residuals) {
                Ok(jacobian) => Some(jacobian),
                Err(e) => {
                    warn!("Jacobian at the solution could not be evaluated: {}", e);
                    None
                }
            }
        } else {
            None
        };

        debug!(
            "LM finished after {} iterations: {} (SSE {:.6e})",
            iterations,
            stop_reason.description(),
            cost
        );

        Ok(LmResult {
            params,
            residuals,
            cost,
            iterations,
            func_evals,
            stop_reason,
            jacobian,
        })
    }

    fn jacobian<P: Problem + ?Sized>(
        &self,
        problem: &P,
        params: &Array1<f64>,
        residuals: &Array1<f64>,
    ) -> Result<Array2<f64>> {
        let jacobian = if problem.has_custom_jacobian() {
            problem.jacobian(params)?
        } else {
            finite_difference::jacobian_with_residuals(
                problem,
                params,
                residuals,
                Some(self.config.fd_relative_step),
            )?
        };
        if jacobian.iter().any(|v| !v.is_finite()) {
            return Err(WellTestError::FunctionEvaluation(
                "Jacobian contains non-finite values".to_string(),
            ));
        }
        Ok(jacobian)
    }

    /// Try damped steps with increasing lambda until one lowers the cost.
    #[allow(clippy::too_many_arguments)]
    fn search_step<P: Problem + ?Sized>(
        &self,
        problem: &P,
        bounds: &[Bounds],
        params: &Array1<f64>,
        residuals: &Array1<f64>,
        cost: f64,
        jacobian: &Array2<f64>,
        lambda: &mut f64,
        func_evals: &mut usize,
        cancel: &CancelToken,
    ) -> StepSearch {
        let mut singular = false;

        for attempt in 0..self.config.max_step_retries {
            if attempt > 0 && cancel.is_cancelled() {
                return StepSearch::Cancelled;
            }

            let step = match LmStep::calculate_step(jacobian, residuals, *lambda) {
                Ok(step) => step,
                Err(_) => {
                    trace!("Singular damped system at lambda {:.1e}", lambda);
                    singular = true;
                    *lambda = self.config.increase_lambda(*lambda);
                    continue;
                }
            };
            singular = false;

            let candidate = clamp_to_bounds(params + &step.step, bounds);
            *func_evals += 1;
            match problem.eval(&candidate) {
                Ok(new_residuals) => {
                    let new_cost = sum_of_squares(&new_residuals);
                    if new_cost.is_finite() && new_cost < cost {
                        return StepSearch::Accepted {
                            params: candidate,
                            residuals: new_residuals,
                            cost: new_cost,
                        };
                    }
                    trace!(
                        "Rejected step at lambda {:.1e}: SSE {:.6e} >= {:.6e}",
                        lambda,
                        new_cost,
                        cost
                    );
                }
                Err(e) => trace!("Rejected step at lambda {:.1e}: {}", lambda, e),
            }
            *lambda = self.config.increase_lambda(*lambda);
        }

        StepSearch::Exhausted { singular }
    }
}

fn sum_of_squares(residuals: &Array1<f64>) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

fn clamp_to_bounds(mut params: Array1<f64>, bounds: &[Bounds]) -> Array1<f64> {
    for (value, b) in params.iter_mut().zip(bounds) {
        *value = b.clamp(*value);
    }
    params
}
