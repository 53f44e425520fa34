//! Analytical well-test models.
//!
//! The model family is closed: [`ModelId`] enumerates every supported
//! reservoir/well response and maps it to a fixed parameter schema. Models are
//! evaluated through a [`ModelRegistry`], an immutable value carrying the
//! numerical settings (Stehfest term count, derivative spacing for models
//! without a closed-form derivative). Evaluation is pure, so one registry can
//! be shared between threads.
//!
//! ```
//! use welltest_fit::models::{evaluate, ModelId};
//! use welltest_fit::parameters::ParameterSet;
//!
//! let params = ParameterSet::from_model(ModelId::HomogeneousRadial).values();
//! let times = [0.01, 0.1, 1.0, 10.0, 100.0];
//! let curve = evaluate(ModelId::HomogeneousRadial, &params, &times).unwrap();
//!
//! assert_eq!(curve.pressure.len(), times.len());
//! assert!(curve.pressure.windows(2).all(|w| w[1] > w[0]));
//! ```

use crate::derivative::bourdet_derivative;
use crate::error::{Result, WellTestError};
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod fracture;
pub mod laplace;
pub mod schema;
pub mod special;
pub mod stehfest;
pub mod units;

pub use laplace::LaplaceReservoir;
pub use schema::ParamSpec;
pub use stehfest::Stehfest;
pub use units::ReservoirProperties;

/// Log-time half-width of the stencil used to differentiate a single-point
/// Laplace-model evaluation.
const SINGLE_POINT_STENCIL: f64 = 0.05;

/// Identifier of a built-in analytical model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    /// Wellbore storage and skin, infinite-acting homogeneous radial flow
    HomogeneousRadial,
    /// Wellbore storage and skin, pseudo-steady-state double porosity
    DualPorosity,
    /// Wellbore storage and skin, two-zone radial composite
    RadialComposite,
    /// Uniform-flux vertical fracture (linear to pseudo-radial flow)
    LinearFlow,
    /// Finite-conductivity fracture in bilinear flow
    BilinearFlow,
}

impl ModelId {
    /// Every model, in a stable order.
    pub fn all() -> &'static [ModelId] {
        &[
            ModelId::HomogeneousRadial,
            ModelId::DualPorosity,
            ModelId::RadialComposite,
            ModelId::LinearFlow,
            ModelId::BilinearFlow,
        ]
    }

    /// Stable identifier, as used in serialized data.
    pub fn name(&self) -> &'static str {
        match self {
            ModelId::HomogeneousRadial => "homogeneous_radial",
            ModelId::DualPorosity => "dual_porosity",
            ModelId::RadialComposite => "radial_composite",
            ModelId::LinearFlow => "linear_flow",
            ModelId::BilinearFlow => "bilinear_flow",
        }
    }

    /// Short human readable description.
    pub fn description(&self) -> &'static str {
        match self {
            ModelId::HomogeneousRadial => "Homogeneous reservoir with wellbore storage and skin",
            ModelId::DualPorosity => "Double porosity (pseudo-steady state) with wellbore storage and skin",
            ModelId::RadialComposite => "Two-zone radial composite with wellbore storage and skin",
            ModelId::LinearFlow => "Uniform-flux vertical fracture",
            ModelId::BilinearFlow => "Finite-conductivity fracture, bilinear flow",
        }
    }

    /// Parameters read by the model, with defaults and physical bounds.
    pub fn schema(&self) -> &'static [ParamSpec] {
        match self {
            ModelId::HomogeneousRadial => &schema::HOMOGENEOUS_RADIAL,
            ModelId::DualPorosity => &schema::DUAL_POROSITY,
            ModelId::RadialComposite => &schema::RADIAL_COMPOSITE,
            ModelId::LinearFlow => &schema::LINEAR_FLOW,
            ModelId::BilinearFlow => &schema::BILINEAR_FLOW,
        }
    }

    /// Look up one parameter of the schema.
    pub fn param_spec(&self, name: &str) -> Option<&'static ParamSpec> {
        self.schema().iter().find(|spec| spec.name == name)
    }

    /// Whether the model is solved in Laplace space (no closed-form derivative).
    pub fn is_laplace(&self) -> bool {
        matches!(
            self,
            ModelId::HomogeneousRadial | ModelId::DualPorosity | ModelId::RadialComposite
        )
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelId {
    type Err = WellTestError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        ModelId::all()
            .iter()
            .copied()
            .find(|model| model.name() == normalized)
            .ok_or_else(|| WellTestError::InvalidInput(format!("Unknown model '{}'", s)))
    }
}

/// Pressure change and Bourdet derivative of a model at a set of times, in psi.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCurve {
    pub pressure: Vec<f64>,
    pub derivative: Vec<f64>,
}

impl ModelCurve {
    /// Number of evaluation times.
    pub fn len(&self) -> usize {
        self.pressure.len()
    }

    /// Whether the curve has no points.
    pub fn is_empty(&self) -> bool {
        self.pressure.is_empty()
    }
}

/// Numerical settings of the model evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Number of Stehfest terms, even. Default: 12
    pub stehfest_terms: usize,

    /// Bourdet spacing for Laplace-model derivatives; 0 uses adjacent
    /// evaluation times. Default: 0.0
    pub derivative_spacing: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            stehfest_terms: stehfest::DEFAULT_TERMS,
            derivative_spacing: 0.0,
        }
    }
}

/// Immutable model evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRegistry {
    config: RegistryConfig,
    stehfest: Stehfest,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self {
            config: RegistryConfig::default(),
            stehfest: Stehfest::default(),
        }
    }
}

/// Parameter values of one evaluation, validated against the schema.
struct Inputs<'a> {
    model: ModelId,
    values: &'a BTreeMap<String, f64>,
}

impl Inputs<'_> {
    fn get(&self, name: &str) -> f64 {
        // presence and finiteness are checked in `ModelRegistry::validate`
        self.values.get(name).copied().unwrap_or(f64::NAN)
    }

    fn reservoir(&self) -> ReservoirProperties {
        ReservoirProperties {
            permeability: self.get("k"),
            thickness: self.get("h"),
            porosity: self.get("phi"),
            viscosity: self.get("mu"),
            total_compressibility: self.get("ct"),
            rate: self.get("q"),
            formation_volume_factor: self.get("B"),
        }
    }
}

impl ModelRegistry {
    /// Create a registry with the given settings.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` if the Stehfest term count is invalid or the
    ///   derivative spacing is negative or not finite
    pub fn new(config: RegistryConfig) -> Result<Self> {
        if !config.derivative_spacing.is_finite() || config.derivative_spacing < 0.0 {
            return Err(WellTestError::InvalidInput(format!(
                "Derivative spacing must be a non-negative number, got {}",
                config.derivative_spacing
            )));
        }
        Ok(Self {
            config,
            stehfest: Stehfest::new(config.stehfest_terms)?,
        })
    }

    /// The registry settings.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Evaluate a model's pressure change and derivative at `times`.
    ///
    /// Keys of `params` that the model does not use are ignored.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` if a time is not positive and finite, the times are
    ///   not strictly increasing, or a schema parameter is missing or not
    ///   finite
    /// * `FunctionEvaluation` if the model produces a non-finite value
    pub fn evaluate(
        &self,
        model: ModelId,
        params: &BTreeMap<String, f64>,
        times: &[f64],
    ) -> Result<ModelCurve> {
        Self::validate(model, params, times)?;
        if times.is_empty() {
            return Ok(ModelCurve::default());
        }
        trace!("Evaluating {} at {} times", model, times.len());

        let inputs = Inputs {
            model,
            values: params,
        };
        let curve = match model {
            ModelId::HomogeneousRadial | ModelId::DualPorosity | ModelId::RadialComposite => {
                self.evaluate_laplace(&inputs, times)?
            }
            ModelId::LinearFlow => Self::evaluate_linear_flow(&inputs, times),
            ModelId::BilinearFlow => Self::evaluate_bilinear_flow(&inputs, times),
        };

        let non_finite = curve
            .pressure
            .iter()
            .chain(curve.derivative.iter())
            .position(|v| !v.is_finite());
        if let Some(index) = non_finite {
            let t = times[index % times.len()];
            return Err(WellTestError::FunctionEvaluation(format!(
                "Model {} produced a non-finite value at t = {}",
                model, t
            )));
        }

        Ok(curve)
    }

    fn validate(model: ModelId, params: &BTreeMap<String, f64>, times: &[f64]) -> Result<()> {
        if let Some(t) = times.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
            return Err(WellTestError::InvalidInput(format!(
                "Evaluation times must be positive and finite, got {}",
                t
            )));
        }
        if let Some(i) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(WellTestError::InvalidInput(format!(
                "Evaluation times must be strictly increasing (t[{}] = {}, t[{}] = {})",
                i,
                times[i],
                i + 1,
                times[i + 1]
            )));
        }
        for spec in model.schema() {
            match params.get(spec.name) {
                None => {
                    return Err(WellTestError::InvalidInput(format!(
                        "Missing parameter '{}' for model {}",
                        spec.name, model
                    )))
                }
                Some(value) if !value.is_finite() => {
                    return Err(WellTestError::InvalidInput(format!(
                        "Parameter '{}' is not finite: {}",
                        spec.name, value
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn laplace_reservoir(inputs: &Inputs<'_>) -> Result<LaplaceReservoir> {
        Ok(match inputs.model {
            ModelId::DualPorosity => LaplaceReservoir::DualPorosity {
                omega: inputs.get("omega"),
                lambda: inputs.get("lambda"),
            },
            ModelId::RadialComposite => {
                let radius_ratio = inputs.get("rc") / inputs.get("rw");
                if radius_ratio < 1.0 {
                    return Err(WellTestError::InvalidInput(format!(
                        "Inner zone radius ({}) is smaller than the wellbore radius ({})",
                        inputs.get("rc"),
                        inputs.get("rw")
                    )));
                }
                LaplaceReservoir::RadialComposite {
                    radius_ratio,
                    mobility_ratio: inputs.get("M"),
                    storativity_ratio: inputs.get("F"),
                }
            }
            _ => LaplaceReservoir::Homogeneous,
        })
    }

    fn evaluate_laplace(&self, inputs: &Inputs<'_>, times: &[f64]) -> Result<ModelCurve> {
        let reservoir = Self::laplace_reservoir(inputs)?;
        let props = inputs.reservoir();
        let rw = inputs.get("rw");
        let time_scale = props.time_scale(rw);
        let pressure_scale = props.pressure_scale();
        let storage = props.dimensionless_storage(inputs.get("C"), rw);
        let skin = inputs.get("S");

        let pressure_at = |t: f64| {
            let pwd = self.stehfest.invert(
                |s| laplace::with_storage_and_skin(s, reservoir.transform(s), storage, skin),
                time_scale * t,
            );
            pwd * pressure_scale
        };

        let pressure: Vec<f64> = times.iter().map(|&t| pressure_at(t)).collect();
        let derivative = if times.len() == 1 {
            let t = times[0];
            let stencil = [
                t * (-SINGLE_POINT_STENCIL).exp(),
                t,
                t * SINGLE_POINT_STENCIL.exp(),
            ];
            let values = [pressure_at(stencil[0]), pressure[0], pressure_at(stencil[2])];
            vec![bourdet_derivative(&stencil, &values, 0.0)[1]]
        } else {
            bourdet_derivative(times, &pressure, self.config.derivative_spacing)
        };

        Ok(ModelCurve {
            pressure,
            derivative,
        })
    }

    fn evaluate_linear_flow(inputs: &Inputs<'_>, times: &[f64]) -> ModelCurve {
        let props = inputs.reservoir();
        let time_scale = props.time_scale(inputs.get("xf"));
        let pressure_scale = props.pressure_scale();

        let (pressure, derivative) = times
            .iter()
            .map(|&t| {
                let td = time_scale * t;
                (
                    fracture::uniform_flux_pressure(td) * pressure_scale,
                    fracture::uniform_flux_derivative(td) * pressure_scale,
                )
            })
            .unzip();
        ModelCurve {
            pressure,
            derivative,
        }
    }

    fn evaluate_bilinear_flow(inputs: &Inputs<'_>, times: &[f64]) -> ModelCurve {
        let props = inputs.reservoir();
        let xf = inputs.get("xf");
        let time_scale = props.time_scale(xf);
        let pressure_scale = props.pressure_scale();
        let conductivity = inputs.get("kfw") / (props.permeability * xf);

        let pressure: Vec<f64> = times
            .iter()
            .map(|&t| fracture::bilinear_pressure(time_scale * t, conductivity) * pressure_scale)
            .collect();
        let derivative = pressure.iter().map(|p| 0.25 * p).collect();
        ModelCurve {
            pressure,
            derivative,
        }
    }
}

/// Evaluate a model with the default registry settings.
///
/// See [`ModelRegistry::evaluate`].
pub fn evaluate(model: ModelId, params: &BTreeMap<String, f64>, times: &[f64]) -> Result<ModelCurve> {
    ModelRegistry::default().evaluate(model, params, times)
}
