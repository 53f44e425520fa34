//! Bourdet pressure derivative.
//!
//! The diagnostic derivative of well-test analysis is `dΔp / d ln t`. It is
//! computed with the three-point Bourdet scheme: for every sample a left and a
//! right neighbour are chosen at least `spacing` apart in natural-log time
//! (the "L" smoothing span), and the two one-sided slopes are combined with
//! weights equal to the opposite log-time interval.
//!
//! Neighbour rule near the ends of the series: when no sample lies at least
//! `spacing` away on one side, the nearest available end point (first or last
//! sample) is used instead. The first and last samples use a one-sided slope.
//!
//! The same routine differentiates observed data and model curves that have no
//! closed-form derivative, so the two are always directly comparable.

use log::warn;
use serde::{Deserialize, Serialize};

/// Default log-time span between derivative neighbours.
pub const DEFAULT_SPACING: f64 = 0.1;

/// Options controlling derivative computation for observed data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivativeOptions {
    /// Minimum natural-log time distance between a point and its neighbours.
    /// Zero selects the adjacent samples. Default: 0.1
    pub spacing: f64,

    /// Moving-average window applied after differentiation. Default: None
    pub smooth_factor: Option<usize>,
}

impl Default for DerivativeOptions {
    fn default() -> Self {
        Self {
            spacing: DEFAULT_SPACING,
            smooth_factor: None,
        }
    }
}

impl DerivativeOptions {
    /// Create options with the given spacing and no smoothing.
    pub fn with_spacing(spacing: f64) -> Self {
        Self {
            spacing,
            smooth_factor: None,
        }
    }

    /// Enable the smoothing pass with the given window.
    pub fn smoothed(mut self, factor: usize) -> Self {
        self.smooth_factor = Some(factor);
        self
    }

    /// Differentiate and, when configured, smooth.
    pub fn apply(&self, time: &[f64], pressure_diff: &[f64]) -> Vec<f64> {
        let derivative = bourdet_derivative(time, pressure_diff, self.spacing);
        match self.smooth_factor {
            Some(factor) => smooth(&derivative, factor),
            None => derivative,
        }
    }
}

/// Compute the Bourdet derivative `dΔp / d ln t` of a pressure-difference series.
///
/// Returns an empty vector when fewer than two points are available. When the
/// two slices differ in length only their common prefix is used.
///
/// # Examples
///
/// ```
/// use welltest_fit::derivative::bourdet_derivative;
///
/// // Δp = 3 + 2 ln t has a constant log-derivative of 2
/// let t: Vec<f64> = (1..=20).map(|i| 0.01 * 1.5_f64.powi(i)).collect();
/// let p: Vec<f64> = t.iter().map(|t| 3.0 + 2.0 * t.ln()).collect();
/// let d = bourdet_derivative(&t, &p, 0.2);
/// assert!(d.iter().all(|v| (v - 2.0).abs() < 1e-9));
/// ```
pub fn bourdet_derivative(time: &[f64], pressure_diff: &[f64], spacing: f64) -> Vec<f64> {
    if time.len() != pressure_diff.len() {
        warn!(
            "Bourdet derivative: time has {} samples, pressure has {}; using the common prefix",
            time.len(),
            pressure_diff.len()
        );
    }
    let n = time.len().min(pressure_diff.len());
    if n < 2 {
        return Vec::new();
    }

    let spacing = if spacing.is_finite() && spacing > 0.0 {
        spacing
    } else {
        0.0
    };
    let log_t: Vec<f64> = time[..n].iter().map(|t| t.ln()).collect();
    let p = &pressure_diff[..n];

    (0..n)
        .map(|i| {
            if i == 0 {
                let k = right_neighbour(&log_t, 0, spacing);
                slope(&log_t, p, 0, k)
            } else if i == n - 1 {
                let j = left_neighbour(&log_t, i, spacing);
                slope(&log_t, p, j, i)
            } else {
                let j = left_neighbour(&log_t, i, spacing);
                let k = right_neighbour(&log_t, i, spacing);
                let dx_left = log_t[i] - log_t[j];
                let dx_right = log_t[k] - log_t[i];
                let total = dx_left + dx_right;
                if total <= 0.0 {
                    return 0.0;
                }
                let m_left = slope(&log_t, p, j, i);
                let m_right = slope(&log_t, p, i, k);
                (m_left * dx_right + m_right * dx_left) / total
            }
        })
        .collect()
}

/// Nearest index `j < i` at least `spacing` away in log time, else the first index.
fn left_neighbour(log_t: &[f64], i: usize, spacing: f64) -> usize {
    (0..i)
        .rev()
        .find(|&j| log_t[i] - log_t[j] >= spacing)
        .unwrap_or(0)
}

/// Nearest index `k > i` at least `spacing` away in log time, else the last index.
fn right_neighbour(log_t: &[f64], i: usize, spacing: f64) -> usize {
    let last = log_t.len() - 1;
    (i + 1..log_t.len())
        .find(|&k| log_t[k] - log_t[i] >= spacing)
        .unwrap_or(last)
}

fn slope(log_t: &[f64], p: &[f64], from: usize, to: usize) -> f64 {
    let dx = log_t[to] - log_t[from];
    if dx > 0.0 {
        (p[to] - p[from]) / dx
    } else {
        0.0
    }
}

/// Centred moving average with half-width `factor / 2`, clipped at the ends.
///
/// `factor <= 1` returns the input unchanged. The output always has the same
/// length as the input.
pub fn smooth(derivative: &[f64], factor: usize) -> Vec<f64> {
    if factor <= 1 || derivative.len() < 2 {
        return derivative.to_vec();
    }

    let n = derivative.len();
    let half = factor / 2;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for value in derivative {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + value);
    }

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(n - 1);
            (prefix[hi + 1] - prefix[lo]) / (hi + 1 - lo) as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn log_grid(n: usize, t0: f64, ratio: f64) -> Vec<f64> {
        (0..n).map(|i| t0 * ratio.powi(i as i32)).collect()
    }

    #[test]
    fn test_log_linear_series_gives_constant_slope() {
        let t = log_grid(40, 1e-3, 1.3);
        let p: Vec<f64> = t.iter().map(|t| 12.5 + 4.2 * t.ln()).collect();

        for spacing in [0.0, 0.1, 0.5, 2.0] {
            let d = bourdet_derivative(&t, &p, spacing);
            assert_eq!(d.len(), t.len());
            for value in &d {
                assert_relative_eq!(*value, 4.2, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_power_law_interior_points() {
        // Δp = t^0.5 has d/dln t = 0.5 t^0.5; the three-point scheme is close
        // for a dense grid.
        let t = log_grid(200, 1e-2, 1.05);
        let p: Vec<f64> = t.iter().map(|t| t.sqrt()).collect();
        let d = bourdet_derivative(&t, &p, 0.0);
        for i in 1..t.len() - 1 {
            assert_relative_eq!(d[i], 0.5 * t[i].sqrt(), max_relative = 1e-3);
        }
    }

    #[test]
    fn test_boundary_points_use_one_sided_slopes() {
        let t = vec![1.0, 2.0, 4.0];
        let p = vec![1.0, 2.0, 5.0];
        let d = bourdet_derivative(&t, &p, 0.0);
        let ln2 = 2.0_f64.ln();
        assert_relative_eq!(d[0], 1.0 / ln2, epsilon = 1e-12);
        assert_relative_eq!(d[2], 3.0 / ln2, epsilon = 1e-12);
        // equal intervals: plain average of the two slopes
        assert_relative_eq!(d[1], 2.0 / ln2, epsilon = 1e-12);
    }

    #[test]
    fn test_spacing_falls_back_to_end_points() {
        // spacing larger than the whole series: every interior point uses the
        // first and last samples
        let t = vec![1.0, 1.5, 2.0, 3.0];
        let p = vec![0.0, 1.0, 1.5, 3.0];
        let d = bourdet_derivative(&t, &p, 10.0);
        let l = |a: f64, b: f64| b.ln() - a.ln();
        let m_left = (1.0 - 0.0) / l(1.0, 1.5);
        let m_right = (3.0 - 1.0) / l(1.5, 3.0);
        let expected = (m_left * l(1.5, 3.0) + m_right * l(1.0, 1.5)) / l(1.0, 3.0);
        assert_relative_eq!(d[1], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_input() {
        assert!(bourdet_derivative(&[], &[], 0.1).is_empty());
        assert!(bourdet_derivative(&[1.0], &[2.0], 0.1).is_empty());

        let d = bourdet_derivative(&[1.0, 2.0, 3.0], &[1.0, 2.0], 0.0);
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn test_smooth_identity_and_length() {
        let d = vec![1.0, 5.0, 2.0, 8.0, 3.0];
        assert_eq!(smooth(&d, 0), d);
        assert_eq!(smooth(&d, 1), d);

        for factor in 1..10 {
            assert_eq!(smooth(&d, factor).len(), d.len());
        }
    }

    #[test]
    fn test_smooth_window_average() {
        let d = vec![1.0, 5.0, 2.0, 8.0, 3.0];
        let s = smooth(&d, 3);
        assert_relative_eq!(s[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(s[1], 8.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(s[2], 5.0, epsilon = 1e-12);
        assert_relative_eq!(s[4], 5.5, epsilon = 1e-12);

        let flat = vec![2.0; 7];
        assert_eq!(smooth(&flat, 5), flat);
    }

    #[test]
    fn test_options_apply() {
        let t = log_grid(10, 0.1, 2.0);
        let p: Vec<f64> = t.iter().map(|t| 1.0 + t.ln()).collect();
        let d = DerivativeOptions::with_spacing(0.3).smoothed(3).apply(&t, &p);
        assert_eq!(d.len(), 10);
        assert!(d.iter().all(|v| (v - 1.0).abs() < 1e-9));
    }
}
