//! Field-unit conversions between physical and dimensionless variables.
//!
//! Units: t [hr], Δp [psi], k [md], h [ft], φ [fraction], μ [cp],
//! ct [1/psi], length [ft], q [STB/D], B [rb/STB], C [bbl/psi].

/// `tD = 0.0002637 k t / (φ μ ct L²)`
pub const TIME_CONSTANT: f64 = 0.0002637;

/// `Δp = pD · 141.2 q B μ / (k h)`
pub const PRESSURE_CONSTANT: f64 = 141.2;

/// `CD = 0.8936 C / (φ ct h rw²)`
pub const STORAGE_CONSTANT: f64 = 0.8936;

/// Rock, fluid and rate properties shared by every model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReservoirProperties {
    pub permeability: f64,
    pub thickness: f64,
    pub porosity: f64,
    pub viscosity: f64,
    pub total_compressibility: f64,
    pub rate: f64,
    pub formation_volume_factor: f64,
}

impl ReservoirProperties {
    /// Multiplier from dimensionless pressure to psi.
    pub fn pressure_scale(&self) -> f64 {
        PRESSURE_CONSTANT * self.rate * self.formation_volume_factor * self.viscosity
            / (self.permeability * self.thickness)
    }

    /// Multiplier from hours to dimensionless time based on `length` (rw or xf).
    pub fn time_scale(&self, length: f64) -> f64 {
        TIME_CONSTANT * self.permeability
            / (self.porosity * self.viscosity * self.total_compressibility * length * length)
    }

    /// Dimensionless wellbore storage of a coefficient `storage` [bbl/psi].
    pub fn dimensionless_storage(&self, storage: f64, wellbore_radius: f64) -> f64 {
        STORAGE_CONSTANT * storage
            / (self.porosity
                * self.total_compressibility
                * self.thickness
                * wellbore_radius
                * wellbore_radius)
    }
}
