//! Matrix conversion utilities.
//!
//! The optimizer works with ndarray types; the covariance inverse uses
//! nalgebra. These functions copy between the two representations.

use crate::error::{Result, WellTestError};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

/// Convert an ndarray Array2 to a nalgebra DMatrix.
pub fn ndarray_to_nalgebra(arr: &Array2<f64>) -> DMatrix<f64> {
    // ndarray is row-major by default, nalgebra is column-major
    DMatrix::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

/// Convert a nalgebra DMatrix to an ndarray Array2.
pub fn nalgebra_to_ndarray(mat: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

/// Extract the diagonal of a square ndarray matrix.
///
/// # Errors
///
/// * `DimensionMismatch` if the matrix is not square
pub fn diagonal(arr: &Array2<f64>) -> Result<Array1<f64>> {
    if arr.nrows() != arr.ncols() {
        return Err(WellTestError::DimensionMismatch(format!(
            "Expected a square matrix, got {}x{}",
            arr.nrows(),
            arr.ncols()
        )));
    }
    Ok(arr.diag().to_owned())
}
