//! Residuals of a well-test model against observed data.
//!
//! [`WellTestProblem`] adapts a model, an observed dataset and a parameter set
//! to the [`Problem`] trait. The residual vector holds one pressure residual
//! per sample followed by one weighted derivative residual per sample, so the
//! weight sets how strongly the derivative curve drives the fit.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::data::ObservedDataset;
use crate::derivative::DerivativeOptions;
use crate::error::{Result, WellTestError};
use crate::models::{ModelCurve, ModelId, ModelRegistry};
use crate::parameters::{Bounds, ParameterSet};
use crate::problem::Problem;

/// Smallest model value taken to the logarithm on the log scale.
const LOG_FLOOR: f64 = 1e-12;

/// How model and observed values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualScale {
    /// `model − observed`, in psi.
    #[default]
    Linear,
    /// `log10(model) − log10(observed)`, matching the log-log diagnostic plot.
    /// Observed derivative samples that are not positive contribute zero.
    Log10,
}

impl ResidualScale {
    fn difference(self, model: f64, observed: f64) -> f64 {
        match self {
            ResidualScale::Linear => model - observed,
            ResidualScale::Log10 => {
                if observed > 0.0 {
                    model.max(LOG_FLOOR).log10() - observed.log10()
                } else {
                    0.0
                }
            }
        }
    }
}

/// A well-test model fitted to an observed dataset.
#[derive(Debug, Clone)]
pub struct WellTestProblem {
    registry: ModelRegistry,
    model: ModelId,
    dataset: Arc<ObservedDataset>,
    observed_derivative: Vec<f64>,
    base_values: BTreeMap<String, f64>,
    fitted: Vec<String>,
    initial: Array1<f64>,
    bounds: Vec<Bounds>,
    weight: f64,
    scale: ResidualScale,
}

impl WellTestProblem {
    /// Build the residual problem for one fit.
    ///
    /// Parameters with `vary == true` are fitted; all others are held at
    /// their current value. The observed derivative is taken from the dataset
    /// or computed with `derivative_options` when the dataset has none.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` if the dataset is empty or too short to differentiate,
    ///   the weight is negative or not finite, a fitted parameter is not part
    ///   of the model, a model parameter is missing, no parameter is fitted,
    ///   or a value lies outside its bounds
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: ModelRegistry,
        model: ModelId,
        dataset: Arc<ObservedDataset>,
        parameters: &ParameterSet,
        weight: f64,
        scale: ResidualScale,
        derivative_options: &DerivativeOptions,
    ) -> Result<Self> {
        if dataset.is_empty() {
            return Err(WellTestError::InvalidInput(
                "Observed dataset is empty".to_string(),
            ));
        }
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(WellTestError::InvalidInput(format!(
                "Derivative weight must be a non-negative number, got {}",
                weight
            )));
        }

        for param in parameters.iter() {
            if param.vary && model.param_spec(param.name()).is_none() {
                return Err(WellTestError::InvalidInput(format!(
                    "Parameter '{}' is not used by model {}",
                    param.name(),
                    model
                )));
            }
            if !param.bounds().is_within_bounds(param.value()) {
                return Err(WellTestError::InvalidInput(format!(
                    "Parameter '{}' = {} lies outside [{}, {}]",
                    param.name(),
                    param.value(),
                    param.min(),
                    param.max()
                )));
            }
        }
        if let Some(spec) = model.schema().iter().find(|s| !parameters.contains(s.name)) {
            return Err(WellTestError::InvalidInput(format!(
                "Missing parameter '{}' for model {}",
                spec.name, model
            )));
        }

        let fitted = parameters.fitted_names();
        if fitted.is_empty() {
            return Err(WellTestError::InvalidInput(
                "No parameter is marked for fitting".to_string(),
            ));
        }

        let observed_derivative = dataset.derivative_or_compute(derivative_options);
        if observed_derivative.len() != dataset.len() {
            return Err(WellTestError::InvalidInput(format!(
                "Cannot differentiate a dataset of {} sample(s)",
                dataset.len()
            )));
        }

        debug!(
            "Fitting {} to {} samples: {:?} (weight {})",
            model,
            dataset.len(),
            fitted,
            weight
        );

        Ok(Self {
            registry,
            model,
            dataset,
            observed_derivative,
            base_values: parameters.values(),
            fitted,
            initial: parameters.fitted_values(),
            bounds: parameters.fitted_bounds(),
            weight,
            scale,
        })
    }

    /// The fitted model.
    pub fn model(&self) -> ModelId {
        self.model
    }

    /// Names of the fitted parameters, in the order of the fitted vector.
    pub fn fitted_names(&self) -> &[String] {
        &self.fitted
    }

    /// Starting values of the fitted parameters.
    pub fn initial_values(&self) -> Array1<f64> {
        self.initial.clone()
    }

    /// The observed derivative the model derivative is compared against.
    pub fn observed_derivative(&self) -> &[f64] {
        &self.observed_derivative
    }

    /// The observed dataset.
    pub fn dataset(&self) -> &ObservedDataset {
        &self.dataset
    }

    /// Complete name → value map with the fitted values substituted.
    pub fn parameter_values(&self, fitted: &Array1<f64>) -> Result<BTreeMap<String, f64>> {
        if fitted.len() != self.fitted.len() {
            return Err(WellTestError::DimensionMismatch(format!(
                "Expected {} fitted values, got {}",
                self.fitted.len(),
                fitted.len()
            )));
        }
        let mut values = self.base_values.clone();
        for (name, value) in self.fitted.iter().zip(fitted.iter()) {
            values.insert(name.clone(), *value);
        }
        Ok(values)
    }

    /// Model pressure and derivative at the observed times.
    pub fn model_curve(&self, fitted: &Array1<f64>) -> Result<ModelCurve> {
        let values = self.parameter_values(fitted)?;
        self.registry
            .evaluate(self.model, &values, self.dataset.time())
    }

    /// Pressure residuals followed by weighted derivative residuals.
    pub fn residuals(&self, fitted: &Array1<f64>) -> Result<Array1<f64>> {
        let curve = self.model_curve(fitted)?;
        let pressure = curve
            .pressure
            .iter()
            .zip(self.dataset.pressure_diff())
            .map(|(m, o)| self.scale.difference(*m, *o));
        let derivative = curve
            .derivative
            .iter()
            .zip(&self.observed_derivative)
            .map(|(m, o)| self.weight * self.scale.difference(*m, *o));

        Ok(pressure.chain(derivative).collect())
    }
}

impl Problem for WellTestProblem {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        self.residuals(params)
    }

    fn parameter_count(&self) -> usize {
        self.fitted.len()
    }

    fn residual_count(&self) -> usize {
        2 * self.dataset.len()
    }

    fn bounds(&self) -> Vec<Bounds> {
        self.bounds.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn synthetic(model: ModelId, params: &ParameterSet) -> Arc<ObservedDataset> {
        let time: Vec<f64> = (0..40).map(|i| 1e-3 * 10f64.powf(i as f64 * 0.15)).collect();
        let curve = crate::models::evaluate(model, &params.values(), &time).unwrap();
        Arc::new(
            ObservedDataset::new(time, curve.pressure)
                .unwrap()
                .with_derivative(curve.derivative)
                .unwrap(),
        )
    }

    fn problem(params: &ParameterSet, weight: f64) -> Result<WellTestProblem> {
        let truth = ParameterSet::from_model(ModelId::HomogeneousRadial);
        WellTestProblem::new(
            ModelRegistry::default(),
            ModelId::HomogeneousRadial,
            synthetic(ModelId::HomogeneousRadial, &truth),
            params,
            weight,
            ResidualScale::Linear,
            &DerivativeOptions::default(),
        )
    }

    #[test]
    fn test_residuals_vanish_at_truth() {
        let params = ParameterSet::from_model(ModelId::HomogeneousRadial);
        let problem = problem(&params, 0.5).unwrap();

        assert_eq!(problem.fitted_names(), &["k", "S", "C"]);
        assert_eq!(problem.parameter_count(), 3);
        assert_eq!(problem.residual_count(), 80);

        let residuals = problem.eval(&problem.initial_values()).unwrap();
        assert_eq!(residuals.len(), 80);
        assert!(residuals.iter().all(|r| r.abs() < 1e-12));
    }

    #[test]
    fn test_residual_layout_and_weight() {
        let params = ParameterSet::from_model(ModelId::HomogeneousRadial);
        let p = problem(&params, 0.25).unwrap();
        let shifted = array![12.0, 0.0, 0.01];

        let residuals = p.residuals(&shifted).unwrap();
        let curve = p.model_curve(&shifted).unwrap();
        let n = p.dataset().len();
        for i in 0..n {
            assert_relative_eq!(
                residuals[i],
                curve.pressure[i] - p.dataset().pressure_diff()[i],
                epsilon = 1e-12
            );
            assert_relative_eq!(
                residuals[n + i],
                0.25 * (curve.derivative[i] - p.observed_derivative()[i]),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_parameter_values_substitute_fitted() {
        let params = ParameterSet::from_model(ModelId::HomogeneousRadial);
        let p = problem(&params, 1.0).unwrap();
        let values = p.parameter_values(&array![20.0, 1.0, 0.02]).unwrap();
        assert_eq!(values["k"], 20.0);
        assert_eq!(values["S"], 1.0);
        assert_eq!(values["h"], 30.0);
        assert!(p.parameter_values(&array![1.0]).is_err());
    }

    #[test]
    fn test_log_scale() {
        assert_relative_eq!(ResidualScale::Log10.difference(100.0, 10.0), 1.0, epsilon = 1e-12);
        assert_eq!(ResidualScale::Log10.difference(5.0, -1.0), 0.0);
        assert_relative_eq!(
            ResidualScale::Log10.difference(-3.0, 1.0),
            LOG_FLOOR.log10(),
            epsilon = 1e-12
        );
        assert_eq!(ResidualScale::Linear.difference(3.0, 1.0), 2.0);
    }

    #[test]
    fn test_validation() {
        let params = ParameterSet::from_model(ModelId::HomogeneousRadial);
        assert!(problem(&params, -1.0).is_err());
        assert!(problem(&params, f64::NAN).is_err());

        let mut none_fitted = params.clone();
        for name in ["k", "S", "C"] {
            none_fitted.set_vary(name, false).unwrap();
        }
        assert!(problem(&none_fitted, 1.0).is_err());

        let mut foreign = params.clone();
        foreign
            .add(crate::parameters::FitParameter::new("omega", 0.1))
            .unwrap();
        assert!(problem(&foreign, 1.0).is_err());

        let mut missing = ParameterSet::new();
        missing
            .add(crate::parameters::FitParameter::new("k", 10.0))
            .unwrap();
        let err = problem(&missing, 1.0).unwrap_err();
        assert!(err.to_string().contains("Missing parameter"));
    }

    #[test]
    fn test_short_dataset_without_derivative() {
        let params = ParameterSet::from_model(ModelId::HomogeneousRadial);
        let dataset = Arc::new(ObservedDataset::new(vec![1.0], vec![10.0]).unwrap());
        let result = WellTestProblem::new(
            ModelRegistry::default(),
            ModelId::HomogeneousRadial,
            dataset,
            &params,
            1.0,
            ResidualScale::Linear,
            &DerivativeOptions::default(),
        );
        assert!(matches!(result, Err(WellTestError::InvalidInput(_))));
    }
}
