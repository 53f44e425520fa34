//! Sensitivity curves.
//!
//! A sensitivity sweep evaluates one model several times, overriding a single
//! parameter with each value of a list, to show how that parameter shapes the
//! pressure and derivative curves. No fitting is involved and every curve is
//! independent of the others.

use std::collections::BTreeMap;

use log::debug;
use nom::number::complete::double;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WellTestError};
use crate::models::{ModelId, ModelRegistry};

/// A parameter name and the values to sweep it through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivitySweep {
    /// Parameter overridden in every curve
    pub parameter: String,
    /// Override values, in output order
    pub values: Vec<f64>,
}

impl SensitivitySweep {
    /// Create a sweep from explicit values.
    pub fn new(parameter: &str, values: Vec<f64>) -> Self {
        Self {
            parameter: parameter.to_string(),
            values,
        }
    }

    /// Create a sweep from a delimited list such as `"10, 50; 100"`.
    /// Malformed entries are skipped, see [`parse_values`].
    pub fn parse(parameter: &str, text: &str) -> Self {
        Self::new(parameter, parse_values(text))
    }
}

/// One curve of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityCurve {
    /// Value of the swept parameter
    pub value: f64,
    /// Evaluation times [hr]
    pub time: Vec<f64>,
    /// Model pressure change [psi]
    pub pressure: Vec<f64>,
    /// Model derivative [psi]
    pub derivative: Vec<f64>,
}

/// Parse a delimited list of numbers.
///
/// Entries are separated by commas, semicolons, full-width commas or
/// whitespace. Entries that are not a complete finite number are skipped.
///
/// # Examples
///
/// ```
/// use welltest_fit::sensitivity::parse_values;
///
/// assert_eq!(parse_values("1, 2.5;3e2  abc 4x"), vec![1.0, 2.5, 300.0]);
/// assert!(parse_values("").is_empty());
/// ```
pub fn parse_values(text: &str) -> Vec<f64> {
    text.split(|c: char| c == ',' || c == ';' || c == '，' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .filter_map(|token| match double::<&str, nom::error::Error<&str>>(token) {
            Ok(("", value)) if value.is_finite() => Some(value),
            _ => {
                debug!("Skipping sensitivity value '{}'", token);
                None
            }
        })
        .collect()
}

fn check_parameter(model: ModelId, name: &str) -> Result<()> {
    match model.param_spec(name) {
        Some(_) => Ok(()),
        None => Err(WellTestError::InvalidInput(format!(
            "Model {} has no parameter '{}'",
            model, name
        ))),
    }
}

fn curve(
    registry: &ModelRegistry,
    model: ModelId,
    base_params: &BTreeMap<String, f64>,
    name: &str,
    value: f64,
    times: &[f64],
) -> Result<SensitivityCurve> {
    let mut params = base_params.clone();
    params.insert(name.to_string(), value);
    let curve = registry.evaluate(model, &params, times)?;
    Ok(SensitivityCurve {
        value,
        time: times.to_vec(),
        pressure: curve.pressure,
        derivative: curve.derivative,
    })
}

/// Evaluate `model` once per value of `sweep`, sequentially.
///
/// Each curve equals a direct evaluation with the swept parameter overridden.
///
/// # Errors
///
/// * `InvalidInput` if the model has no parameter of the swept name, or any
///   evaluation rejects its inputs
pub fn generate(
    registry: &ModelRegistry,
    model: ModelId,
    base_params: &BTreeMap<String, f64>,
    sweep: &SensitivitySweep,
    times: &[f64],
) -> Result<Vec<SensitivityCurve>> {
    check_parameter(model, &sweep.parameter)?;
    debug!(
        "Sensitivity of {} to '{}' over {} values",
        model,
        sweep.parameter,
        sweep.values.len()
    );
    sweep
        .values
        .iter()
        .map(|&value| curve(registry, model, base_params, &sweep.parameter, value, times))
        .collect()
}

/// Parallel variant of [`generate`] with identical output.
#[cfg(feature = "parallel")]
pub fn generate_parallel(
    registry: &ModelRegistry,
    model: ModelId,
    base_params: &BTreeMap<String, f64>,
    sweep: &SensitivitySweep,
    times: &[f64],
) -> Result<Vec<SensitivityCurve>> {
    use rayon::prelude::*;

    check_parameter(model, &sweep.parameter)?;
    sweep
        .values
        .par_iter()
        .map(|&value| curve(registry, model, base_params, &sweep.parameter, value, times))
        .collect()
}
