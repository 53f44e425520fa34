//! Closed-form responses of vertically fractured wells.
//!
//! Dimensionless time here is based on the fracture half-length `xf`.

use super::special::{erf, exp_integral_e1};
use std::f64::consts::PI;

/// Bilinear-flow coefficient `π / (Γ(5/4) √2)`.
pub const BILINEAR_COEFFICIENT: f64 = 2.45;

/// Uniform-flux fracture: `pD = √(π tD) erf(1/(2√tD)) − ½ Ei(−1/(4 tD))`.
///
/// Linear flow (`pD ≈ √(π tD)`) at early time, pseudo-radial
/// (`pD ≈ ½ (ln tD + 2.80907)`) at late time.
pub fn uniform_flux_pressure(td: f64) -> f64 {
    let u = 0.5 / td.sqrt();
    (PI * td).sqrt() * erf(u) + 0.5 * exp_integral_e1(u * u)
}

/// `dpD / d ln tD = ½ √(π tD) erf(1/(2√tD))` of the uniform-flux fracture.
pub fn uniform_flux_derivative(td: f64) -> f64 {
    let u = 0.5 / td.sqrt();
    0.5 * (PI * td).sqrt() * erf(u)
}

/// Finite-conductivity fracture in bilinear flow: `pD = 2.45 tD^{1/4} / √FcD`.
///
/// The log-derivative is exactly `pD / 4`.
pub fn bilinear_pressure(td: f64, conductivity: f64) -> f64 {
    BILINEAR_COEFFICIENT / conductivity.sqrt() * td.powf(0.25)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_flux_asymptotes() {
        let td = 1e-4;
        assert_relative_eq!(uniform_flux_pressure(td), (PI * td).sqrt(), max_relative = 1e-10);
        assert_relative_eq!(uniform_flux_derivative(td), 0.5 * (PI * td).sqrt(), max_relative = 1e-10);

        let td = 1e4;
        assert_relative_eq!(uniform_flux_pressure(td), 0.5 * (td.ln() + 2.80907), max_relative = 1e-5);
        assert_relative_eq!(uniform_flux_derivative(td), 0.5, max_relative = 1e-4);
    }

    #[test]
    fn test_uniform_flux_derivative_matches_difference() {
        let h: f64 = 1e-4;
        for td in [0.01, 0.3, 2.0, 40.0] {
            let numeric = (uniform_flux_pressure(td * h.exp()) - uniform_flux_pressure(td * (-h).exp()))
                / (2.0 * h);
            assert_relative_eq!(uniform_flux_derivative(td), numeric, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_bilinear_quarter_slope() {
        let p1 = bilinear_pressure(1.0, 10.0);
        let p2 = bilinear_pressure(16.0, 10.0);
        assert_relative_eq!(p2 / p1, 2.0, max_relative = 1e-12);
        assert_relative_eq!(p1, 2.45 / 10.0_f64.sqrt(), max_relative = 1e-12);
    }
}
