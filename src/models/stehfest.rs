//! Gaver–Stehfest numerical Laplace inversion.
//!
//! `f(t) ≈ (ln 2 / t) Σ_{i=1}^{N} V_i F(i ln 2 / t)` with the classic Stehfest
//! weights `V_i`. Accurate for the smooth, non-oscillating responses of
//! diffusion problems; the weights alternate in sign and grow quickly with `N`,
//! so `N` is kept small (8 to 16) and the transform must be evaluated to near
//! machine precision.

use crate::error::{Result, WellTestError};
use std::f64::consts::LN_2;

/// Default number of Stehfest terms.
pub const DEFAULT_TERMS: usize = 12;

/// Largest supported number of terms; beyond this the weights exceed f64 precision.
pub const MAX_TERMS: usize = 20;

/// Precomputed Stehfest weights for a fixed number of terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Stehfest {
    weights: Vec<f64>,
}

impl Default for Stehfest {
    fn default() -> Self {
        Self {
            weights: stehfest_weights(DEFAULT_TERMS),
        }
    }
}

impl Stehfest {
    /// Create an inverter with `terms` weights.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` if `terms` is odd, zero or larger than [`MAX_TERMS`]
    pub fn new(terms: usize) -> Result<Self> {
        if terms == 0 || terms % 2 != 0 || terms > MAX_TERMS {
            return Err(WellTestError::InvalidInput(format!(
                "Stehfest term count must be even and in 2..={}, got {}",
                MAX_TERMS, terms
            )));
        }
        Ok(Self {
            weights: stehfest_weights(terms),
        })
    }

    /// Number of terms (transform evaluations per inversion).
    pub fn terms(&self) -> usize {
        self.weights.len()
    }

    /// Stehfest weights `V_1..V_N`.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Invert the transform `transform(s)` at time `t > 0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use welltest_fit::models::stehfest::Stehfest;
    ///
    /// let inverter = Stehfest::default();
    /// // L^{-1}[1/s²] = t
    /// let value = inverter.invert(|s| 1.0 / (s * s), 2.0);
    /// assert!((value - 2.0).abs() < 1e-5);
    /// ```
    pub fn invert<F>(&self, transform: F, t: f64) -> f64
    where
        F: Fn(f64) -> f64,
    {
        let a = LN_2 / t;
        let sum: f64 = self
            .weights
            .iter()
            .enumerate()
            .map(|(i, v)| v * transform((i + 1) as f64 * a))
            .sum();
        a * sum
    }
}

fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |acc, k| acc * k as f64)
}

/// `V_i = (-1)^{i+N/2} Σ_{k=⌊(i+1)/2⌋}^{min(i,N/2)} k^{N/2} (2k)! / ((N/2-k)! k! (k-1)! (i-k)! (2k-i)!)`
fn stehfest_weights(terms: usize) -> Vec<f64> {
    let half = terms / 2;
    (1..=terms)
        .map(|i| {
            let mut sum = 0.0;
            for k in (i + 1) / 2..=i.min(half) {
                sum += (k as f64).powi(half as i32) * factorial(2 * k)
                    / (factorial(half - k)
                        * factorial(k)
                        * factorial(k - 1)
                        * factorial(i - k)
                        * factorial(2 * k - i));
            }
            if (i + half) % 2 == 0 {
                sum
            } else {
                -sum
            }
        })
        .collect()
}
