//! Fit progress events and final results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lm::StopReason;
use crate::models::{ModelCurve, ModelId};
use crate::parameters::ParameterSet;

/// Progress snapshot emitted after every accepted iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationEvent {
    /// Accepted iteration number, starting at 1
    pub iteration: usize,
    /// Iteration limit of the run; `iteration / max_iterations` is the
    /// progress fraction
    pub max_iterations: usize,
    /// Sum of squared residuals after the iteration
    pub sum_squared_error: f64,
    /// Damping parameter after the iteration
    pub lambda: f64,
    /// Every model parameter, fitted values substituted
    pub parameters: BTreeMap<String, f64>,
    /// Model curve at the observed times
    pub curve: ModelCurve,
}

impl IterationEvent {
    /// Fraction of the iteration budget used so far, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.max_iterations == 0 {
            return 1.0;
        }
        (self.iteration as f64 / self.max_iterations as f64).min(1.0)
    }
}

/// Outcome of one fit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// The fitted model
    pub model: ModelId,
    /// Every model parameter at the best point found
    pub parameters: BTreeMap<String, f64>,
    /// Names of the parameters the optimizer varied
    pub fitted_parameters: Vec<String>,
    /// Sum of squared residuals at the best point
    pub sum_squared_error: f64,
    /// Number of accepted iterations
    pub iteration_count: usize,
    /// Whether the run converged
    pub converged: bool,
    /// Why the run stopped
    pub stopped_reason: StopReason,
    /// Standard errors of the fitted parameters; empty when they could not be
    /// estimated
    #[serde(default)]
    pub standard_errors: BTreeMap<String, f64>,
}

impl FitResult {
    /// Write the fitted values and standard errors into a parameter set.
    ///
    /// Parameters the run did not vary are left untouched.
    pub fn apply_to(&self, parameters: &mut ParameterSet) {
        for name in &self.fitted_parameters {
            if let (Some(param), Some(value)) = (parameters.get_mut(name), self.parameters.get(name)) {
                param.set_value_clamped(*value);
                param.stderr = self.standard_errors.get(name).copied();
            }
        }
    }

    /// Serialize the result to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize a result from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit of {}: {}", self.model, self.stopped_reason.description())?;
        writeln!(f, "  SSE: {:.6e} after {} iterations", self.sum_squared_error, self.iteration_count)?;
        for name in &self.fitted_parameters {
            let value = self.parameters.get(name).copied().unwrap_or(f64::NAN);
            match self.standard_errors.get(name) {
                Some(stderr) => writeln!(f, "  {} = {:.6e} +/- {:.2e}", name, value, stderr)?,
                None => writeln!(f, "  {} = {:.6e}", name, value)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> FitResult {
        let params = ParameterSet::from_model(ModelId::HomogeneousRadial);
        let mut values = params.values();
        values.insert("k".to_string(), 42.0);
        values.insert("h".to_string(), 99.0);
        FitResult {
            model: ModelId::HomogeneousRadial,
            parameters: values,
            fitted_parameters: vec!["k".to_string()],
            sum_squared_error: 1.5,
            iteration_count: 7,
            converged: true,
            stopped_reason: StopReason::Converged,
            standard_errors: [("k".to_string(), 0.5)].into_iter().collect(),
        }
    }

    #[test]
    fn test_apply_to_only_touches_fitted() {
        let mut params = ParameterSet::from_model(ModelId::HomogeneousRadial);
        result().apply_to(&mut params);
        assert_eq!(params.get("k").unwrap().value(), 42.0);
        assert_eq!(params.get("k").unwrap().stderr(), Some(0.5));
        assert_eq!(params.get("h").unwrap().value(), 30.0);
    }

    #[test]
    fn test_json_round_trip() {
        let original = result();
        let json = original.to_json().unwrap();
        assert!(json.contains("\"stopped_reason\": \"converged\""));
        assert_eq!(FitResult::from_json(&json).unwrap(), original);
    }

    #[test]
    fn test_display() {
        let text = result().to_string();
        assert!(text.contains("homogeneous_radial"));
        assert!(text.contains("k = "));
    }
}
