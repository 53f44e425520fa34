//! Fit parameter definition
//!
//! A [`FitParameter`] is one named model input with a value, physical bounds
//! and a flag telling the optimizer whether to vary it. Fixed parameters are
//! still handed to the model evaluator.

use crate::parameters::bounds::{Bounds, BoundsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Bounds error: {0}")]
    BoundsError(#[from] BoundsError),

    #[error("Parameter '{name}' not found")]
    ParameterNotFound { name: String },

    #[error("Parameter '{name}' already exists")]
    DuplicateParameter { name: String },

    #[error("Expected {expected} fitted values, got {actual}")]
    FittedCountMismatch { expected: usize, actual: usize },
}

/// A named well-test model parameter.
///
/// Invariant: `min <= value <= max`. Constructors clamp the initial value into
/// the bounds; [`FitParameter::set_value`] rejects values outside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParameter {
    /// Name of the parameter, matching a key of the model schema
    pub name: String,

    /// Current value of the parameter
    value: f64,

    /// Value at creation, restored by [`FitParameter::reset`]
    init_value: f64,

    /// Whether the optimizer may change this parameter
    pub vary: bool,

    /// Physical bounds for the parameter value
    bounds: Bounds,

    /// Standard error of the parameter (set after fitting)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<f64>,
}

impl FitParameter {
    /// Create an unbounded, varying parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// use welltest_fit::parameters::FitParameter;
    ///
    /// let param = FitParameter::new("skin", 2.0);
    /// assert_eq!(param.name(), "skin");
    /// assert_eq!(param.value(), 2.0);
    /// assert!(param.vary());
    /// ```
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            init_value: value,
            vary: true,
            bounds: Bounds::default(),
            stderr: None,
        }
    }

    /// Create a varying parameter with bounds; the value is clamped into them.
    ///
    /// # Examples
    ///
    /// ```
    /// use welltest_fit::parameters::FitParameter;
    ///
    /// let param = FitParameter::with_bounds("k", 5000.0, 1e-3, 1e4).unwrap();
    /// assert_eq!(param.value(), 5000.0);
    ///
    /// let clamped = FitParameter::with_bounds("k", 0.0, 1e-3, 1e4).unwrap();
    /// assert_eq!(clamped.value(), 1e-3);
    /// ```
    pub fn with_bounds(name: &str, value: f64, min: f64, max: f64) -> Result<Self, ParameterError> {
        if !value.is_finite() {
            return Err(BoundsError::NonFiniteValue.into());
        }
        let bounds = Bounds::new(min, max)?;
        let value = bounds.clamp(value);

        Ok(Self {
            name: name.to_string(),
            value,
            init_value: value,
            vary: true,
            bounds,
            stderr: None,
        })
    }

    /// Builder-style variant of [`FitParameter::set_vary`].
    pub fn fixed(mut self) -> Self {
        self.vary = false;
        self
    }

    /// Get the current value of the parameter
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value of the parameter.
    ///
    /// Returns an error if the value is not finite or lies outside the bounds.
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        if !value.is_finite() {
            return Err(BoundsError::NonFiniteValue.into());
        }
        if !self.bounds.is_within_bounds(value) {
            return Err(ParameterError::BoundsError(BoundsError::ValueOutsideBounds {
                value,
                min: self.bounds.min,
                max: self.bounds.max,
            }));
        }

        self.value = value;
        Ok(())
    }

    /// Set the value after clamping it into the bounds.
    pub fn set_value_clamped(&mut self, value: f64) {
        self.value = self.bounds.clamp(value);
    }

    /// Get the initial value of the parameter
    pub fn init_value(&self) -> f64 {
        self.init_value
    }

    /// Reset the parameter to its initial value
    pub fn reset(&mut self) {
        self.value = self.bounds.clamp(self.init_value);
        self.stderr = None;
    }

    /// Get the name of the parameter
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the parameter is varied during optimization
    pub fn vary(&self) -> bool {
        self.vary
    }

    /// Set whether the parameter is varied during optimization
    pub fn set_vary(&mut self, vary: bool) {
        self.vary = vary;
    }

    /// Get the bounds of the parameter
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Get the minimum allowed value for the parameter
    pub fn min(&self) -> f64 {
        self.bounds.min
    }

    /// Get the maximum allowed value for the parameter
    pub fn max(&self) -> f64 {
        self.bounds.max
    }

    /// Set the bounds for the parameter; the current value is clamped into them.
    pub fn set_bounds(&mut self, min: f64, max: f64) -> Result<(), ParameterError> {
        let bounds = Bounds::new(min, max)?;
        self.bounds = bounds;
        self.value = bounds.clamp(self.value);
        Ok(())
    }

    /// Get the standard error of the parameter (if available)
    pub fn stderr(&self) -> Option<f64> {
        self.stderr
    }
}
