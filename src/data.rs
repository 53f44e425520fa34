//! Observed well-test data.
//!
//! An [`ObservedDataset`] holds the elapsed times, pressure changes and
//! (optionally) the pressure derivative that a model is fitted to. Raw gauge
//! pressures are turned into pressure changes with [`pressure_difference`].

use crate::derivative::DerivativeOptions;
use crate::error::{Result, WellTestError};
use log::debug;
use serde::{Deserialize, Serialize};

/// Kind of pressure transient test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// Producing well: `Δp = |p_initial - p(t)|`
    Drawdown,
    /// Shut-in well: `Δp = |p(t) - p_shut_in|`
    Buildup,
}

/// Convert gauge pressures into a pressure-change series.
///
/// `reference` is the initial reservoir pressure for a drawdown or the
/// pressure at shut-in for a buildup; when `None` the first sample is used.
/// Samples with `t <= 0` or `Δp <= 0` (or non-finite values) are dropped.
///
/// # Returns
///
/// * `(time, pressure_diff)` of the retained samples
///
/// # Examples
///
/// ```
/// use welltest_fit::data::{pressure_difference, TestKind};
///
/// let time = [0.0, 0.5, 1.0, 2.0];
/// let pressure = [5000.0, 4950.0, 4930.0, 4915.0];
/// let (t, dp) = pressure_difference(&time, &pressure, TestKind::Drawdown, None).unwrap();
/// assert_eq!(t, vec![0.5, 1.0, 2.0]);
/// assert_eq!(dp, vec![50.0, 70.0, 85.0]);
/// ```
pub fn pressure_difference(
    time: &[f64],
    pressure: &[f64],
    kind: TestKind,
    reference: Option<f64>,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if time.len() != pressure.len() {
        return Err(WellTestError::DimensionMismatch(format!(
            "time has {} samples, pressure has {}",
            time.len(),
            pressure.len()
        )));
    }
    let reference = match reference.or_else(|| pressure.first().copied()) {
        Some(value) => value,
        None => return Ok((Vec::new(), Vec::new())),
    };

    let (kept_t, kept_dp): (Vec<f64>, Vec<f64>) = time
        .iter()
        .zip(pressure)
        .map(|(&t, &p)| {
            let dp = match kind {
                TestKind::Drawdown => (reference - p).abs(),
                TestKind::Buildup => (p - reference).abs(),
            };
            (t, dp)
        })
        .filter(|(t, dp)| t.is_finite() && dp.is_finite() && *t > 0.0 && *dp > 0.0)
        .unzip();

    let dropped = time.len() - kept_t.len();
    if dropped > 0 {
        debug!("Dropped {} samples with non-positive time or pressure change", dropped);
    }
    Ok((kept_t, kept_dp))
}

/// Observed time, pressure-change and derivative series.
///
/// Invariants (checked on construction and deserialization): times are finite,
/// positive and strictly increasing; pressure changes are finite and positive;
/// every series has the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct ObservedDataset {
    time: Vec<f64>,
    pressure_diff: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    derivative: Option<Vec<f64>>,
}

#[derive(Deserialize)]
struct RawDataset {
    time: Vec<f64>,
    pressure_diff: Vec<f64>,
    #[serde(default)]
    derivative: Option<Vec<f64>>,
}

impl TryFrom<RawDataset> for ObservedDataset {
    type Error = WellTestError;

    fn try_from(raw: RawDataset) -> Result<Self> {
        let dataset = ObservedDataset::new(raw.time, raw.pressure_diff)?;
        match raw.derivative {
            Some(derivative) => dataset.with_derivative(derivative),
            None => Ok(dataset),
        }
    }
}

impl ObservedDataset {
    /// Create a dataset from elapsed times [hr] and pressure changes [psi].
    ///
    /// # Errors
    ///
    /// * `DimensionMismatch` if the series differ in length
    /// * `InvalidInput` if a time is not positive, times are not strictly
    ///   increasing, or a pressure change is not positive
    pub fn new(time: Vec<f64>, pressure_diff: Vec<f64>) -> Result<Self> {
        if time.len() != pressure_diff.len() {
            return Err(WellTestError::DimensionMismatch(format!(
                "time has {} samples, pressure_diff has {}",
                time.len(),
                pressure_diff.len()
            )));
        }
        if let Some((i, t)) = time
            .iter()
            .enumerate()
            .find(|(_, t)| !(t.is_finite() && **t > 0.0))
        {
            return Err(WellTestError::InvalidInput(format!(
                "time[{}] = {} is not positive",
                i, t
            )));
        }
        if let Some(i) = time.windows(2).position(|w| w[1] <= w[0]) {
            return Err(WellTestError::InvalidInput(format!(
                "times must be strictly increasing (time[{}] = {}, time[{}] = {})",
                i,
                time[i],
                i + 1,
                time[i + 1]
            )));
        }
        if let Some((i, p)) = pressure_diff
            .iter()
            .enumerate()
            .find(|(_, p)| !(p.is_finite() && **p > 0.0))
        {
            return Err(WellTestError::InvalidInput(format!(
                "pressure_diff[{}] = {} is not positive",
                i, p
            )));
        }

        Ok(Self {
            time,
            pressure_diff,
            derivative: None,
        })
    }

    /// Build a dataset from gauge pressures, see [`pressure_difference`].
    pub fn from_pressure(
        time: &[f64],
        pressure: &[f64],
        kind: TestKind,
        reference: Option<f64>,
    ) -> Result<Self> {
        let (time, pressure_diff) = pressure_difference(time, pressure, kind, reference)?;
        Self::new(time, pressure_diff)
    }

    /// Attach a precomputed derivative series.
    pub fn with_derivative(mut self, derivative: Vec<f64>) -> Result<Self> {
        if derivative.len() != self.time.len() {
            return Err(WellTestError::DimensionMismatch(format!(
                "derivative has {} samples, expected {}",
                derivative.len(),
                self.time.len()
            )));
        }
        if derivative.iter().any(|d| !d.is_finite()) {
            return Err(WellTestError::InvalidInput(
                "derivative contains non-finite values".to_string(),
            ));
        }
        self.derivative = Some(derivative);
        Ok(self)
    }

    /// Compute (or recompute) the Bourdet derivative of the pressure change.
    ///
    /// Datasets with fewer than two samples are returned without a derivative.
    pub fn with_bourdet_derivative(mut self, options: &DerivativeOptions) -> Self {
        let derivative = options.apply(&self.time, &self.pressure_diff);
        self.derivative = (derivative.len() == self.time.len()).then_some(derivative);
        self
    }

    /// Elapsed times [hr].
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Pressure changes [psi].
    pub fn pressure_diff(&self) -> &[f64] {
        &self.pressure_diff
    }

    /// Stored derivative, if any.
    pub fn derivative(&self) -> Option<&[f64]> {
        self.derivative.as_deref()
    }

    /// The stored derivative, or one computed with `options`.
    pub fn derivative_or_compute(&self, options: &DerivativeOptions) -> Vec<f64> {
        match &self.derivative {
            Some(derivative) => derivative.clone(),
            None => options.apply(&self.time, &self.pressure_diff),
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether the dataset has no samples.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(ObservedDataset::new(vec![1.0, 2.0], vec![10.0, 12.0]).is_ok());
        assert!(ObservedDataset::new(vec![], vec![]).unwrap().is_empty());

        let err = ObservedDataset::new(vec![1.0, 2.0], vec![10.0]).unwrap_err();
        assert!(matches!(err, WellTestError::DimensionMismatch(_)));

        for (t, p) in [
            (vec![0.0, 1.0], vec![1.0, 2.0]),
            (vec![1.0, 1.0], vec![1.0, 2.0]),
            (vec![2.0, 1.0], vec![1.0, 2.0]),
            (vec![1.0, 2.0], vec![1.0, 0.0]),
            (vec![1.0, f64::NAN], vec![1.0, 2.0]),
        ] {
            let err = ObservedDataset::new(t, p).unwrap_err();
            assert!(matches!(err, WellTestError::InvalidInput(_)));
        }
    }

    #[test]
    fn test_derivative_handling() {
        let time: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let dp: Vec<f64> = time.iter().map(|t| 5.0 + 2.0 * t.ln()).collect();
        let dataset = ObservedDataset::new(time, dp).unwrap();
        assert!(dataset.derivative().is_none());

        let options = DerivativeOptions::with_spacing(0.0);
        let computed = dataset.derivative_or_compute(&options);
        assert_eq!(computed.len(), 10);

        let with = dataset.clone().with_bourdet_derivative(&options);
        assert!(with.derivative().unwrap().iter().all(|d| (d - 2.0).abs() < 1e-9));

        assert!(dataset.clone().with_derivative(vec![1.0; 3]).is_err());

        let single = ObservedDataset::new(vec![1.0], vec![3.0])
            .unwrap()
            .with_bourdet_derivative(&options);
        assert!(single.derivative().is_none());
    }

    #[test]
    fn test_pressure_difference() {
        let time = [0.0, 1.0, 2.0, 3.0];
        let pressure = [3000.0, 3100.0, 3150.0, 3150.0];
        let (t, dp) = pressure_difference(&time, &pressure, TestKind::Buildup, None).unwrap();
        assert_eq!(t, vec![1.0, 2.0, 3.0]);
        assert_eq!(dp, vec![100.0, 150.0, 150.0]);

        let (t, dp) =
            pressure_difference(&time, &pressure, TestKind::Drawdown, Some(3150.0)).unwrap();
        assert_eq!(t, vec![1.0]);
        assert_eq!(dp, vec![50.0]);

        assert!(pressure_difference(&time, &pressure[..2], TestKind::Buildup, None).is_err());
        let (t, _) = pressure_difference(&[], &[], TestKind::Buildup, None).unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn test_dataset_from_gauge_pressure() {
        let time = [0.0, 0.5, 1.0, 2.0];
        let pressure = [2500.0, 2540.0, 2560.0, 2575.0];
        let dataset =
            ObservedDataset::from_pressure(&time, &pressure, TestKind::Buildup, None).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.time(), &[0.5, 1.0, 2.0]);
        assert_eq!(dataset.pressure_diff(), &[40.0, 60.0, 75.0]);
    }

    #[test]
    fn test_json_round_trip_validates() {
        let dataset = ObservedDataset::new(vec![0.1, 1.0], vec![5.0, 9.0])
            .unwrap()
            .with_derivative(vec![1.0, 2.0])
            .unwrap();
        let json = serde_json::to_string(&dataset).unwrap();
        let back: ObservedDataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dataset);

        let bad = r#"{"time":[1.0,0.5],"pressure_diff":[1.0,2.0]}"#;
        assert!(serde_json::from_str::<ObservedDataset>(bad).is_err());
    }
}
