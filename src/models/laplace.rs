//! Laplace-domain solutions for radial-flow reservoirs.
//!
//! All functions take the Laplace variable `s` (conjugate to `tD`) and return
//! the dimensionless wellbore pressure transform for a line-source well of
//! unit dimensionless radius producing at constant rate.

use super::special::{bessel_i0_scaled, bessel_i1_scaled, bessel_k0_scaled, bessel_k1_scaled};

/// Reservoir response in Laplace space, without wellbore effects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaplaceReservoir {
    /// Infinite-acting homogeneous reservoir
    Homogeneous,
    /// Warren–Root pseudo-steady-state double porosity
    DualPorosity { omega: f64, lambda: f64 },
    /// Two-zone radial composite
    RadialComposite {
        /// Inner zone radius over wellbore radius, `>= 1`
        radius_ratio: f64,
        /// Inner over outer mobility
        mobility_ratio: f64,
        /// Outer over inner storativity
        storativity_ratio: f64,
    },
}

impl LaplaceReservoir {
    /// `p̄D(s)` at the wellbore.
    pub fn transform(&self, s: f64) -> f64 {
        match *self {
            LaplaceReservoir::Homogeneous => homogeneous(s),
            LaplaceReservoir::DualPorosity { omega, lambda } => dual_porosity(s, omega, lambda),
            LaplaceReservoir::RadialComposite {
                radius_ratio,
                mobility_ratio,
                storativity_ratio,
            } => radial_composite(s, radius_ratio, mobility_ratio, storativity_ratio),
        }
    }
}

/// `p̄D = K0(√s) / (s √s K1(√s))`
pub fn homogeneous(s: f64) -> f64 {
    let x = s.sqrt();
    bessel_k0_scaled(x) / (s * x * bessel_k1_scaled(x))
}

/// Homogeneous solution with `s` replaced by `s f(s)` in the Bessel arguments,
/// `f(s) = (ω(1-ω)s + λ) / ((1-ω)s + λ)`.
pub fn dual_porosity(s: f64, omega: f64, lambda: f64) -> f64 {
    let f = (omega * (1.0 - omega) * s + lambda) / ((1.0 - omega) * s + lambda);
    let x = (s * f).sqrt();
    bessel_k0_scaled(x) / (s * x * bessel_k1_scaled(x))
}

/// Two-zone radial composite reservoir.
///
/// Inner zone `1 <= r <= RD` with the wellbore's properties, outer zone
/// `r > RD` with mobility `1/M` and storativity `F` relative to the inner one.
/// Written with scaled Bessel functions: the `I` terms only appear multiplied
/// by `e^{-2√s (RD - 1)}`, which is bounded by one.
pub fn radial_composite(s: f64, radius_ratio: f64, mobility_ratio: f64, storativity_ratio: f64) -> f64 {
    let x = s.sqrt();
    let a = x * radius_ratio;
    let diffusivity = mobility_ratio * storativity_ratio;
    let b = (s * diffusivity).sqrt() * radius_ratio;

    let gamma = diffusivity.sqrt() * bessel_k1_scaled(b) / (mobility_ratio * bessel_k0_scaled(b));
    let reflection = (bessel_k1_scaled(a) - gamma * bessel_k0_scaled(a))
        / (bessel_i1_scaled(a) + gamma * bessel_i0_scaled(a));
    let decay = (-2.0 * x * (radius_ratio - 1.0)).exp();
    let coupling = decay * reflection;

    (bessel_k0_scaled(x) + coupling * bessel_i0_scaled(x))
        / (s * x * (bessel_k1_scaled(x) - coupling * bessel_i1_scaled(x)))
}

/// Add wellbore storage `CD` and skin `S` to a reservoir transform `p̄D`.
///
/// `p̄wD = (s p̄D + S) / (s [1 + CD s (s p̄D + S)])`
pub fn with_storage_and_skin(s: f64, reservoir: f64, storage: f64, skin: f64) -> f64 {
    let sp = s * reservoir + skin;
    sp / (s * (1.0 + storage * s * sp))
}
