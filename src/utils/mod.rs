//! Utility functions and helpers.

pub mod finite_difference;
pub mod matrix_convert;

// Re-export commonly used utilities
pub use finite_difference::{jacobian, jacobian_with_residuals};
pub use matrix_convert::{nalgebra_to_ndarray, ndarray_to_nalgebra};
