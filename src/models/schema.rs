//! Parameter schemas of the built-in models.
//!
//! Each model declares the named inputs it reads, with a default value,
//! physical bounds and whether the parameter is fitted by default.

use crate::parameters::FitParameter;
use serde::Serialize;

/// Description of one model parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    /// Key used in parameter maps
    pub name: &'static str,
    /// Human readable description
    pub description: &'static str,
    /// Field unit
    pub unit: &'static str,
    /// Default starting value
    pub default: f64,
    /// Lower physical bound
    pub min: f64,
    /// Upper physical bound
    pub max: f64,
    /// Whether the optimizer varies this parameter unless told otherwise
    pub fit_by_default: bool,
}

impl ParamSpec {
    /// Build a [`FitParameter`] with this spec's default, bounds and fit flag.
    pub fn to_parameter(&self) -> FitParameter {
        let mut param = FitParameter::with_bounds(self.name, self.default, self.min, self.max)
            .unwrap_or_else(|_| FitParameter::new(self.name, self.default));
        param.set_vary(self.fit_by_default);
        param
    }

    /// Whether `value` lies within the physical bounds.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

const fn spec(
    name: &'static str,
    description: &'static str,
    unit: &'static str,
    default: f64,
    min: f64,
    max: f64,
    fit_by_default: bool,
) -> ParamSpec {
    ParamSpec {
        name,
        description,
        unit,
        default,
        min,
        max,
        fit_by_default,
    }
}

const PERMEABILITY: ParamSpec = spec("k", "Permeability", "md", 10.0, 1e-4, 1e5, true);
const SKIN: ParamSpec = spec("S", "Skin factor", "", 0.0, -5.0, 100.0, true);
const STORAGE: ParamSpec = spec("C", "Wellbore storage coefficient", "bbl/psi", 0.01, 1e-6, 10.0, true);
const THICKNESS: ParamSpec = spec("h", "Net pay thickness", "ft", 30.0, 0.1, 1e4, false);
const POROSITY: ParamSpec = spec("phi", "Porosity", "fraction", 0.2, 1e-3, 1.0, false);
const VISCOSITY: ParamSpec = spec("mu", "Fluid viscosity", "cp", 1.0, 1e-3, 1e4, false);
const COMPRESSIBILITY: ParamSpec = spec("ct", "Total compressibility", "1/psi", 1e-5, 1e-8, 1e-2, false);
const WELLBORE_RADIUS: ParamSpec = spec("rw", "Wellbore radius", "ft", 0.3, 0.01, 5.0, false);
const RATE: ParamSpec = spec("q", "Flow rate", "STB/D", 500.0, 1e-3, 1e6, false);
const FVF: ParamSpec = spec("B", "Formation volume factor", "rb/STB", 1.2, 0.1, 10.0, false);

pub(crate) static HOMOGENEOUS_RADIAL: [ParamSpec; 10] = [
    PERMEABILITY,
    SKIN,
    STORAGE,
    THICKNESS,
    POROSITY,
    VISCOSITY,
    COMPRESSIBILITY,
    WELLBORE_RADIUS,
    RATE,
    FVF,
];

pub(crate) static DUAL_POROSITY: [ParamSpec; 12] = [
    PERMEABILITY,
    SKIN,
    STORAGE,
    spec("omega", "Storativity ratio", "", 0.1, 1e-4, 1.0, true),
    spec("lambda", "Interporosity flow coefficient", "", 1e-6, 1e-10, 1e-2, true),
    THICKNESS,
    POROSITY,
    VISCOSITY,
    COMPRESSIBILITY,
    WELLBORE_RADIUS,
    RATE,
    FVF,
];

pub(crate) static RADIAL_COMPOSITE: [ParamSpec; 13] = [
    PERMEABILITY,
    SKIN,
    STORAGE,
    spec("rc", "Radius of the inner zone", "ft", 100.0, 1.0, 1e5, true),
    spec("M", "Mobility ratio inner/outer", "", 2.0, 0.01, 100.0, true),
    spec("F", "Storativity ratio outer/inner", "", 1.0, 0.01, 100.0, false),
    THICKNESS,
    POROSITY,
    VISCOSITY,
    COMPRESSIBILITY,
    WELLBORE_RADIUS,
    RATE,
    FVF,
];

const HALF_LENGTH: ParamSpec = spec("xf", "Fracture half-length", "ft", 100.0, 1.0, 1e4, true);

pub(crate) static LINEAR_FLOW: [ParamSpec; 8] = [
    PERMEABILITY,
    HALF_LENGTH,
    THICKNESS,
    POROSITY,
    VISCOSITY,
    COMPRESSIBILITY,
    RATE,
    FVF,
];

// Bilinear flow only constrains k^-1/4 (kf w)^-1/2, so k and xf stay fixed.
pub(crate) static BILINEAR_FLOW: [ParamSpec; 9] = [
    spec("k", "Permeability", "md", 10.0, 1e-4, 1e5, false),
    spec("xf", "Fracture half-length", "ft", 100.0, 1.0, 1e4, false),
    spec("kfw", "Fracture conductivity", "md·ft", 500.0, 1e-2, 1e7, true),
    THICKNESS,
    POROSITY,
    VISCOSITY,
    COMPRESSIBILITY,
    RATE,
    FVF,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_within_bounds() {
        let all: [&[ParamSpec]; 5] = [
            &HOMOGENEOUS_RADIAL,
            &DUAL_POROSITY,
            &RADIAL_COMPOSITE,
            &LINEAR_FLOW,
            &BILINEAR_FLOW,
        ];
        for schema in all {
            for spec in schema {
                assert!(spec.min < spec.max, "{}", spec.name);
                assert!(spec.contains(spec.default), "{}", spec.name);
            }
        }
    }

    #[test]
    fn test_to_parameter() {
        let param = DUAL_POROSITY[3].to_parameter();
        assert_eq!(param.name(), "omega");
        assert_eq!(param.value(), 0.1);
        assert_eq!(param.min(), 1e-4);
        assert!(param.vary());

        assert!(!THICKNESS.to_parameter().vary());
    }
}
