//! Ordered parameter collection
//!
//! [`ParameterSet`] keeps the parameters of one analysis in insertion order
//! (the order they appear in the model schema) and converts between the
//! named representation used by the model evaluator and the dense vector of
//! fitted values used by the optimizer.

use crate::error::Result;
use crate::models::ModelId;
use crate::parameters::bounds::Bounds;
use crate::parameters::parameter::{FitParameter, ParameterError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A collection of named fit parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    params: Vec<FitParameter>,
}

impl ParameterSet {
    /// Create a new empty parameter set
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Build the default parameter set of a model from its schema.
    ///
    /// # Examples
    ///
    /// ```
    /// use welltest_fit::models::ModelId;
    /// use welltest_fit::parameters::ParameterSet;
    ///
    /// let params = ParameterSet::from_model(ModelId::HomogeneousRadial);
    /// assert!(params.contains("k"));
    /// assert!(params.get("k").unwrap().vary());
    /// assert!(!params.get("h").unwrap().vary());
    /// ```
    pub fn from_model(model: ModelId) -> Self {
        let params = model
            .schema()
            .iter()
            .map(|spec| spec.to_parameter())
            .collect();
        Self { params }
    }

    /// Add a parameter to the collection.
    ///
    /// Returns an error if a parameter with the same name already exists.
    pub fn add(&mut self, param: FitParameter) -> std::result::Result<(), ParameterError> {
        if self.contains(param.name()) {
            return Err(ParameterError::DuplicateParameter {
                name: param.name().to_string(),
            });
        }
        self.params.push(param);
        Ok(())
    }

    /// Add a new bounded parameter with the given name and value
    pub fn add_param_with_bounds(
        &mut self,
        name: &str,
        value: f64,
        min: f64,
        max: f64,
    ) -> std::result::Result<(), ParameterError> {
        let param = FitParameter::with_bounds(name, value, min, max)?;
        self.add(param)
    }

    /// Get a parameter by name
    pub fn get(&self, name: &str) -> Option<&FitParameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    /// Get a mutable reference to a parameter by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut FitParameter> {
        self.params.iter_mut().find(|p| p.name() == name)
    }

    /// Check if a parameter exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of parameters in the set
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate over parameters in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &FitParameter> {
        self.params.iter()
    }

    /// Names of all parameters, in order
    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name().to_string()).collect()
    }

    /// Set the value of a named parameter (bounds are enforced).
    pub fn set_value(&mut self, name: &str, value: f64) -> std::result::Result<(), ParameterError> {
        self.get_mut(name)
            .ok_or_else(|| ParameterError::ParameterNotFound {
                name: name.to_string(),
            })?
            .set_value(value)
    }

    /// Set whether a named parameter is fitted.
    pub fn set_vary(&mut self, name: &str, vary: bool) -> std::result::Result<(), ParameterError> {
        self.get_mut(name)
            .ok_or_else(|| ParameterError::ParameterNotFound {
                name: name.to_string(),
            })?
            .set_vary(vary);
        Ok(())
    }

    /// Name → value map of every parameter, as consumed by the model evaluator.
    pub fn values(&self) -> BTreeMap<String, f64> {
        self.params
            .iter()
            .map(|p| (p.name().to_string(), p.value()))
            .collect()
    }

    /// Names of the fitted parameters, in order.
    pub fn fitted_names(&self) -> Vec<String> {
        self.params
            .iter()
            .filter(|p| p.vary())
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Current values of the fitted parameters, in order.
    pub fn fitted_values(&self) -> Array1<f64> {
        self.params
            .iter()
            .filter(|p| p.vary())
            .map(|p| p.value())
            .collect()
    }

    /// Bounds of the fitted parameters, in order.
    pub fn fitted_bounds(&self) -> Vec<Bounds> {
        self.params
            .iter()
            .filter(|p| p.vary())
            .map(|p| p.bounds())
            .collect()
    }

    /// Write a vector of fitted values back, clamping each into its bounds.
    pub fn update_fitted(&mut self, values: &[f64]) -> std::result::Result<(), ParameterError> {
        let expected = self.params.iter().filter(|p| p.vary()).count();
        if values.len() != expected {
            return Err(ParameterError::FittedCountMismatch {
                expected,
                actual: values.len(),
            });
        }

        for (param, &value) in self.params.iter_mut().filter(|p| p.vary()).zip(values) {
            param.set_value_clamped(value);
        }
        Ok(())
    }

    /// Reset every parameter to its initial value
    pub fn reset(&mut self) {
        for param in &mut self.params {
            param.reset();
        }
    }

    /// Serialize the parameter set to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize a parameter set from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
