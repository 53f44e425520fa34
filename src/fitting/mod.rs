//! # Model Fitting
//!
//! Fits a well-test model to an observed dataset with the Levenberg-Marquardt
//! optimizer. A [`FitRequest`] bundles everything one run needs; [`fit_model`]
//! runs it on the calling thread and reports progress through a callback.
//! [`crate::controller::FitController`] runs the same function on a worker
//! thread.
//!
//! ## Example
//!
//! ```rust
//! use welltest_fit::data::ObservedDataset;
//! use welltest_fit::fitting::{fit_blocking, FitRequest};
//! use welltest_fit::models::{evaluate, ModelId, ModelRegistry};
//! use welltest_fit::parameters::ParameterSet;
//!
//! // Synthetic fractured-well response from the default parameters
//! let truth = ParameterSet::from_model(ModelId::LinearFlow);
//! let time: Vec<f64> = (0..30).map(|i| 0.01 * 1.3_f64.powi(i)).collect();
//! let curve = evaluate(ModelId::LinearFlow, &truth.values(), &time).unwrap();
//! let dataset = ObservedDataset::new(time, curve.pressure)
//!     .unwrap()
//!     .with_derivative(curve.derivative)
//!     .unwrap();
//!
//! let mut start = truth.clone();
//! start.set_value("k", 14.0).unwrap();
//! start.set_value("xf", 80.0).unwrap();
//!
//! let request = FitRequest::new(ModelId::LinearFlow, dataset, start);
//! let result = fit_blocking(&ModelRegistry::default(), &request).unwrap();
//! assert!(result.converged);
//! assert!((result.parameters["xf"] - 100.0).abs() < 0.1);
//! ```

pub mod problem;
pub mod result;

pub use problem::{ResidualScale, WellTestProblem};
pub use result::{FitResult, IterationEvent};

use std::sync::Arc;

use log::{debug, info, warn};

use crate::data::ObservedDataset;
use crate::derivative::DerivativeOptions;
use crate::error::Result;
use crate::lm::{CancelToken, LevenbergMarquardt, LmConfig, StopReason};
use crate::models::{ModelId, ModelRegistry};
use crate::parameters::ParameterSet;
use crate::uncertainty;

/// Default weight of the derivative residuals.
pub const DEFAULT_DERIVATIVE_WEIGHT: f64 = 1.0;

/// Everything one fit run needs.
#[derive(Debug, Clone)]
pub struct FitRequest {
    /// Model to fit
    pub model: ModelId,
    /// Observed data, shared read-only with the worker
    pub dataset: Arc<ObservedDataset>,
    /// Starting values, bounds and fit flags
    pub parameters: ParameterSet,
    /// Weight of derivative residuals relative to pressure residuals
    pub weight: f64,
    /// Linear or logarithmic residuals
    pub residual_scale: ResidualScale,
    /// Derivative settings used when the dataset carries no derivative
    pub derivative_options: DerivativeOptions,
    /// Optimizer settings
    pub lm_config: LmConfig,
}

impl FitRequest {
    /// Create a request with default weight, scale and optimizer settings.
    pub fn new(
        model: ModelId,
        dataset: impl Into<Arc<ObservedDataset>>,
        parameters: ParameterSet,
    ) -> Self {
        Self {
            model,
            dataset: dataset.into(),
            parameters,
            weight: DEFAULT_DERIVATIVE_WEIGHT,
            residual_scale: ResidualScale::default(),
            derivative_options: DerivativeOptions::default(),
            lm_config: LmConfig::default(),
        }
    }

    /// Set the derivative weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the residual scale.
    pub fn with_residual_scale(mut self, scale: ResidualScale) -> Self {
        self.residual_scale = scale;
        self
    }

    /// Set the derivative options for datasets without a derivative.
    pub fn with_derivative_options(mut self, options: DerivativeOptions) -> Self {
        self.derivative_options = options;
        self
    }

    /// Set the optimizer configuration.
    pub fn with_lm_config(mut self, config: LmConfig) -> Self {
        self.lm_config = config;
        self
    }

    /// Validate the request and build its residual problem.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` for an invalid optimizer configuration or any of the
    ///   conditions listed on [`WellTestProblem::new`]
    pub fn build_problem(&self, registry: &ModelRegistry) -> Result<WellTestProblem> {
        self.lm_config.validate()?;
        WellTestProblem::new(
            registry.clone(),
            self.model,
            Arc::clone(&self.dataset),
            &self.parameters,
            self.weight,
            self.residual_scale,
            &self.derivative_options,
        )
    }
}

/// Run a fit on the calling thread.
///
/// `on_iteration` receives an [`IterationEvent`] after every accepted
/// iteration, in order. Setting `cancel` stops the run at the next iteration
/// boundary with [`StopReason::Cancelled`] and the best parameters so far.
///
/// # Errors
///
/// * `InvalidInput` if the request is invalid
/// * the model's evaluation error if the starting point cannot be evaluated
pub fn fit_model<F>(
    registry: &ModelRegistry,
    request: &FitRequest,
    cancel: &CancelToken,
    on_iteration: F,
) -> Result<FitResult>
where
    F: FnMut(IterationEvent),
{
    let problem = request.build_problem(registry)?;
    run_fit(&problem, &request.lm_config, cancel, on_iteration)
}

/// Run a fit on the calling thread without progress reporting.
pub fn fit_blocking(registry: &ModelRegistry, request: &FitRequest) -> Result<FitResult> {
    fit_model(registry, request, &CancelToken::new(), |_| {})
}

/// Optimize an already validated problem.
pub(crate) fn run_fit<F>(
    problem: &WellTestProblem,
    config: &LmConfig,
    cancel: &CancelToken,
    mut on_iteration: F,
) -> Result<FitResult>
where
    F: FnMut(IterationEvent),
{
    let mut config = config.clone();
    config.calc_jacobian = true;
    let max_iterations = config.max_iterations;
    let optimizer = LevenbergMarquardt::with_config(config);

    let lm_result = optimizer.minimize_with(problem, problem.initial_values(), cancel, |it| {
        let snapshot = problem
            .parameter_values(&it.params)
            .and_then(|parameters| Ok((parameters, problem.model_curve(&it.params)?)));
        match snapshot {
            Ok((parameters, curve)) => on_iteration(IterationEvent {
                iteration: it.iteration,
                max_iterations,
                sum_squared_error: it.sse,
                lambda: it.lambda,
                parameters,
                curve,
            }),
            Err(e) => warn!("Skipping progress event {}: {}", it.iteration, e),
        }
    })?;

    let fitted = problem.fitted_names().to_vec();
    let standard_errors = match (&lm_result.jacobian, lm_result.stop_reason) {
        (Some(jacobian), StopReason::Converged | StopReason::MaxIterations) => {
            uncertainty::standard_errors(&fitted, jacobian, lm_result.cost).unwrap_or_else(|e| {
                debug!("Standard errors unavailable: {}", e);
                Default::default()
            })
        }
        _ => Default::default(),
    };

    info!(
        "{} fit finished: {} after {} iterations, SSE {:.6e}",
        problem.model(),
        lm_result.stop_reason.description(),
        lm_result.iterations,
        lm_result.cost
    );

    Ok(FitResult {
        model: problem.model(),
        parameters: problem.parameter_values(&lm_result.params)?,
        fitted_parameters: fitted,
        sum_squared_error: lm_result.cost,
        iteration_count: lm_result.iterations,
        converged: lm_result.stop_reason.is_converged(),
        stopped_reason: lm_result.stop_reason,
        standard_errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn request(model: ModelId) -> FitRequest {
        let truth = ParameterSet::from_model(model);
        let time: Vec<f64> = (0..36).map(|i| 1e-3 * 10f64.powf(i as f64 / 6.0)).collect();
        let curve = crate::models::evaluate(model, &truth.values(), &time).unwrap();
        let dataset = ObservedDataset::new(time, curve.pressure)
            .unwrap()
            .with_derivative(curve.derivative)
            .unwrap();
        FitRequest::new(model, dataset, truth)
    }

    #[test]
    fn test_fit_from_truth_is_immediate() {
        let request = request(ModelId::HomogeneousRadial);
        let result = fit_blocking(&ModelRegistry::default(), &request).unwrap();
        assert!(result.converged);
        assert_eq!(result.iteration_count, 0);
        assert_eq!(result.sum_squared_error, 0.0);
        assert_eq!(result.parameters, request.parameters.values());
    }

    #[test]
    fn test_bilinear_conductivity_recovered() {
        let mut request = request(ModelId::BilinearFlow);
        request.parameters.set_value("kfw", 150.0).unwrap();

        let mut events = Vec::new();
        let result = fit_model(
            &ModelRegistry::default(),
            &request,
            &CancelToken::new(),
            |event| events.push(event),
        )
        .unwrap();

        assert!(result.converged, "{}", result);
        assert_relative_eq!(result.parameters["kfw"], 500.0, max_relative = 1e-3);
        assert_eq!(events.len(), result.iteration_count);
        assert!(events.iter().all(|e| e.curve.len() == 36));

        let limit = request.lm_config.max_iterations;
        assert!(events.iter().all(|e| e.max_iterations == limit));
        let progress: Vec<f64> = events.iter().map(IterationEvent::progress).collect();
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        assert!(progress.iter().all(|p| *p > 0.0 && *p <= 1.0));
    }

    #[test]
    fn test_invalid_request() {
        let request = request(ModelId::LinearFlow).with_weight(f64::INFINITY);
        assert!(fit_blocking(&ModelRegistry::default(), &request).is_err());

        let bad_config = LmConfig {
            ftol: 0.0,
            ..LmConfig::default()
        };
        let request = self::request(ModelId::LinearFlow).with_lm_config(bad_config);
        assert!(fit_blocking(&ModelRegistry::default(), &request).is_err());
    }
}
