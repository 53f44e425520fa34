//! Special functions used by the analytical well-test models.
//!
//! Laplace-domain solutions are inverted with the Stehfest algorithm, whose
//! weights grow to ~1e7 for twelve terms. Any inconsistency in the transform
//! is amplified by that factor, so the Bessel functions here are accurate to
//! machine precision (power series, trapezoidal integral representation and
//! asymptotic expansion, each in the range where it converges fastest) rather
//! than the usual seven-digit polynomial fits.
//!
//! The modified Bessel functions are returned exponentially scaled:
//! `bessel_i0_scaled(x) = e^{-x} I0(x)` and `bessel_k0_scaled(x) = e^{x} K0(x)`,
//! which keeps them finite for the very large arguments that appear at early
//! dimensionless times.

use std::f64::consts::PI;

/// Euler–Mascheroni constant.
pub const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

const SERIES_TOLERANCE: f64 = 1e-17;
const MAX_SERIES_TERMS: usize = 500;

/// Largest argument handled by the power series of I0/I1.
const I_SERIES_LIMIT: f64 = 20.0;
/// Largest argument handled by the power series of K0/K1.
const K_SERIES_LIMIT: f64 = 2.0;
/// Largest argument handled by the trapezoidal integral of K0/K1.
const K_INTEGRAL_LIMIT: f64 = 20.0;
const K_INTEGRAL_STEP: f64 = 0.1;

/// `e^{-x} I0(x)` for `x >= 0`.
pub fn bessel_i0_scaled(x: f64) -> f64 {
    bessel_i_scaled(0, x.abs())
}

/// `e^{-x} I1(x)` for `x >= 0`.
pub fn bessel_i1_scaled(x: f64) -> f64 {
    bessel_i_scaled(1, x)
}

/// `e^{x} K0(x)` for `x > 0`.
pub fn bessel_k0_scaled(x: f64) -> f64 {
    bessel_k_scaled(0, x)
}

/// `e^{x} K1(x)` for `x > 0`.
pub fn bessel_k1_scaled(x: f64) -> f64 {
    bessel_k_scaled(1, x)
}

fn bessel_i_scaled(order: u32, x: f64) -> f64 {
    if x == 0.0 {
        return if order == 0 { 1.0 } else { 0.0 };
    }
    if x <= I_SERIES_LIMIT {
        bessel_i_series(order, x) * (-x).exp()
    } else {
        hankel_asymptotic(order, x, -1.0) / (2.0 * PI * x).sqrt()
    }
}

fn bessel_k_scaled(order: u32, x: f64) -> f64 {
    if x <= 0.0 {
        return f64::INFINITY;
    }
    if x <= K_SERIES_LIMIT {
        let k = if order == 0 {
            bessel_k0_series(x)
        } else {
            bessel_k1_series(x)
        };
        k * x.exp()
    } else if x <= K_INTEGRAL_LIMIT {
        bessel_k_integral_scaled(order, x)
    } else {
        hankel_asymptotic(order, x, 1.0) * (PI / (2.0 * x)).sqrt()
    }
}

/// `I_n(x) = Σ (x/2)^{2k+n} / (k! (k+n)!)`; all terms positive.
fn bessel_i_series(order: u32, x: f64) -> f64 {
    let q = 0.25 * x * x;
    let mut term = if order == 0 { 1.0 } else { 0.5 * x };
    let mut sum = term;
    let n = order as f64;
    for k in 1..MAX_SERIES_TERMS {
        let k = k as f64;
        term *= q / (k * (k + n));
        sum += term;
        if term < SERIES_TOLERANCE * sum {
            break;
        }
    }
    sum
}

/// `K0(x) = -(ln(x/2) + γ) I0(x) + Σ_{k≥1} H_k (x²/4)^k / (k!)²`
fn bessel_k0_series(x: f64) -> f64 {
    let q = 0.25 * x * x;
    let mut result = -((0.5 * x).ln() + EULER_GAMMA) * bessel_i_series(0, x);
    let mut term = 1.0;
    let mut harmonic = 0.0;
    for k in 1..MAX_SERIES_TERMS {
        let k = k as f64;
        term *= q / (k * k);
        harmonic += 1.0 / k;
        let contribution = term * harmonic;
        result += contribution;
        if contribution < SERIES_TOLERANCE * result.abs() {
            break;
        }
    }
    result
}

/// `K1(x) = 1/x + ln(x/2) I1(x) - (x/4) Σ (ψ(k+1) + ψ(k+2)) (x²/4)^k / (k! (k+1)!)`
fn bessel_k1_series(x: f64) -> f64 {
    let q = 0.25 * x * x;
    let mut psi_a = -EULER_GAMMA;
    let mut psi_b = 1.0 - EULER_GAMMA;
    let mut term = 1.0;
    let mut sum = psi_a + psi_b;
    for k in 1..MAX_SERIES_TERMS {
        let kf = k as f64;
        term *= q / (kf * (kf + 1.0));
        psi_a += 1.0 / kf;
        psi_b += 1.0 / (kf + 1.0);
        let contribution = term * (psi_a + psi_b);
        sum += contribution;
        if contribution.abs() < SERIES_TOLERANCE * sum.abs() {
            break;
        }
    }
    1.0 / x + (0.5 * x).ln() * bessel_i_series(1, x) - 0.25 * x * sum
}

/// `e^x K_n(x) = ∫_0^∞ e^{-x (cosh t - 1)} cosh(n t) dt`, trapezoidal rule.
///
/// The integrand is analytic and decays double-exponentially, so the plain
/// trapezoidal rule converges geometrically in the step size.
fn bessel_k_integral_scaled(order: u32, x: f64) -> f64 {
    let n = order as f64;
    let mut sum = 0.5;
    for k in 1..MAX_SERIES_TERMS {
        let t = k as f64 * K_INTEGRAL_STEP;
        let value = (-x * (t.cosh() - 1.0)).exp() * (n * t).cosh();
        sum += value;
        if value < SERIES_TOLERANCE * sum {
            break;
        }
    }
    sum * K_INTEGRAL_STEP
}

/// Hankel asymptotic series `Σ sign^k a_k(n) / x^k`, truncated at its smallest term.
///
/// `sign = +1` gives the K expansion, `sign = -1` the I expansion.
fn hankel_asymptotic(order: u32, x: f64, sign: f64) -> f64 {
    let mu = 4.0 * (order * order) as f64;
    let mut term = 1.0;
    let mut sum = 1.0;
    let mut previous = f64::INFINITY;
    for k in 1..60 {
        let odd = (2 * k - 1) as f64;
        term *= sign * (mu - odd * odd) / (k as f64 * 8.0 * x);
        if term.abs() > previous {
            break;
        }
        sum += term;
        previous = term.abs();
        if term.abs() < SERIES_TOLERANCE * sum.abs() {
            break;
        }
    }
    sum
}

/// Error function.
pub fn erf(x: f64) -> f64 {
    let ax = x.abs();
    let value = if ax < 3.0 {
        erf_series(ax)
    } else {
        1.0 - erfc_continued_fraction(ax)
    };
    value.copysign(x)
}

/// Complementary error function, accurate in the tail.
pub fn erfc(x: f64) -> f64 {
    if x >= 3.0 {
        erfc_continued_fraction(x)
    } else {
        1.0 - erf(x)
    }
}

/// `erf(x) = 2/√π e^{-x²} Σ 2^n x^{2n+1} / (1·3·…·(2n+1))` for `x >= 0`.
fn erf_series(x: f64) -> f64 {
    let x2 = x * x;
    let mut term = x;
    let mut sum = x;
    for n in 1..MAX_SERIES_TERMS {
        term *= 2.0 * x2 / (2 * n + 1) as f64;
        sum += term;
        if term < SERIES_TOLERANCE * sum {
            break;
        }
    }
    2.0 / PI.sqrt() * (-x2).exp() * sum
}

/// Laplace continued fraction `erfc(x) = e^{-x²}/√π · 1/(x + (1/2)/(x + 1/(x + …)))`.
fn erfc_continued_fraction(x: f64) -> f64 {
    let mut fraction = x;
    for n in (1..=60).rev() {
        fraction = x + 0.5 * n as f64 / fraction;
    }
    (-x * x).exp() / (PI.sqrt() * fraction)
}

/// Exponential integral `E1(x) = ∫_x^∞ e^{-t}/t dt` for `x > 0`.
///
/// Note `Ei(-x) = -E1(x)`.
pub fn exp_integral_e1(x: f64) -> f64 {
    if x <= 0.0 {
        return f64::INFINITY;
    }
    if x <= 1.0 {
        let mut result = -EULER_GAMMA - x.ln();
        let mut term = 1.0;
        for k in 1..MAX_SERIES_TERMS {
            let k = k as f64;
            term *= -x / k;
            let contribution = term / k;
            result -= contribution;
            if contribution.abs() < SERIES_TOLERANCE * result.abs() {
                break;
            }
        }
        result
    } else {
        // modified Lentz evaluation of the continued fraction
        let tiny = 1e-300;
        let mut b = x + 1.0;
        let mut c = 1.0 / tiny;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..MAX_SERIES_TERMS {
            let a = -((i * i) as f64);
            b += 2.0;
            d = 1.0 / (a * d + b);
            c = b + a / c;
            let delta = c * d;
            h *= delta;
            if (delta - 1.0).abs() < 1e-16 {
                break;
            }
        }
        h * (-x).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bessel_reference_values() {
        // K0(2) = 0.11389387274953344, K1(2) = 0.13986588181652243
        assert_relative_eq!(
            bessel_k0_scaled(2.0),
            0.113_893_872_749_533_44 * 2.0_f64.exp(),
            max_relative = 1e-13
        );
        assert_relative_eq!(
            bessel_k1_scaled(2.0),
            0.139_865_881_816_522_43 * 2.0_f64.exp(),
            max_relative = 1e-13
        );
        // I0(1) = 1.2660658777520082, I1(1) = 0.5651591039924851
        assert_relative_eq!(
            bessel_i0_scaled(1.0),
            1.266_065_877_752_008_2 * (-1.0_f64).exp(),
            max_relative = 1e-14
        );
        assert_relative_eq!(
            bessel_i1_scaled(1.0),
            0.565_159_103_992_485_1 * (-1.0_f64).exp(),
            max_relative = 1e-14
        );
        // K0(0.1) = 2.4270690247020166
        assert_relative_eq!(
            bessel_k0_scaled(0.1),
            2.427_069_024_702_016_6 * 0.1_f64.exp(),
            max_relative = 1e-13
        );
    }

    #[test]
    fn test_bessel_continuity_across_method_boundaries() {
        for &x in &[K_SERIES_LIMIT, K_INTEGRAL_LIMIT] {
            let below = x * (1.0 - 1e-12);
            let above = x * (1.0 + 1e-12);
            assert_relative_eq!(bessel_k0_scaled(below), bessel_k0_scaled(above), max_relative = 1e-12);
            assert_relative_eq!(bessel_k1_scaled(below), bessel_k1_scaled(above), max_relative = 1e-12);
        }
        let below = I_SERIES_LIMIT * (1.0 - 1e-12);
        let above = I_SERIES_LIMIT * (1.0 + 1e-12);
        assert_relative_eq!(bessel_i0_scaled(below), bessel_i0_scaled(above), max_relative = 1e-12);
        assert_relative_eq!(bessel_i1_scaled(below), bessel_i1_scaled(above), max_relative = 1e-12);
    }

    #[test]
    fn test_bessel_large_arguments() {
        // e^x K0(x) → √(π/2x), e^{-x} I0(x) → 1/√(2πx)
        let x = 1e6;
        assert_relative_eq!(bessel_k0_scaled(x), (PI / (2.0 * x)).sqrt(), max_relative = 1e-6);
        assert_relative_eq!(bessel_i0_scaled(x), 1.0 / (2.0 * PI * x).sqrt(), max_relative = 1e-6);
        assert!(bessel_k1_scaled(1e12).is_finite());
    }

    #[test]
    fn test_bessel_wronskian() {
        // I0(x) K1(x) + I1(x) K0(x) = 1/x
        for &x in &[0.01, 0.5, 1.9, 3.0, 7.5, 19.0, 25.0, 100.0] {
            let w = bessel_i0_scaled(x) * bessel_k1_scaled(x) + bessel_i1_scaled(x) * bessel_k0_scaled(x);
            assert_relative_eq!(w, 1.0 / x, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_erf_values() {
        assert_eq!(erf(0.0), 0.0);
        assert_relative_eq!(erf(0.5), 0.520_499_877_813_046_5, max_relative = 1e-14);
        assert_relative_eq!(erf(1.0), 0.842_700_792_949_714_9, max_relative = 1e-14);
        assert_relative_eq!(erf(-1.0), -0.842_700_792_949_714_9, max_relative = 1e-14);
        assert_relative_eq!(erfc(3.5), 7.430_983_723_414_128e-7, max_relative = 1e-12);
        assert_relative_eq!(erfc(2.0), 0.004_677_734_981_047_266, max_relative = 1e-12);
        assert_eq!(erf(40.0), 1.0);
    }

    #[test]
    fn test_exp_integral_values() {
        assert_relative_eq!(exp_integral_e1(0.5), 0.559_773_594_776_160_8, max_relative = 1e-14);
        assert_relative_eq!(exp_integral_e1(1.0), 0.219_383_934_395_520_3, max_relative = 1e-14);
        assert_relative_eq!(exp_integral_e1(2.0), 0.048_900_510_708_061_12, max_relative = 1e-13);
        assert_relative_eq!(exp_integral_e1(10.0), 4.156_968_929_685_324e-6, max_relative = 1e-13);
        assert_eq!(exp_integral_e1(1e4), 0.0);
        assert!(exp_integral_e1(0.0).is_infinite());
    }
}
