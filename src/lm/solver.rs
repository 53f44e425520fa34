//! Dense linear system solver.
//!
//! Gaussian elimination with partial pivoting, sized for the small normal
//! equation systems of the Levenberg-Marquardt step (one row per fitted
//! parameter).

use crate::error::{Result, WellTestError};
use ndarray::{Array1, Array2};

/// Pivots smaller than this fraction of the largest matrix entry are
/// treated as zero.
pub const PIVOT_TOLERANCE: f64 = 1e-13;

/// Solve `a x = b`.
///
/// # Errors
///
/// * `DimensionMismatch` if `a` is not square or `b` has the wrong length
/// * `SingularMatrix` if a pivot falls below [`PIVOT_TOLERANCE`] relative to
///   `max |a_ij|`, or the input is not finite
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use welltest_fit::lm::solver::solve;
///
/// // requires a row swap: a[0][0] = 0
/// let a = array![[0.0, 2.0], [3.0, 1.0]];
/// let b = array![4.0, 5.0];
/// let x = solve(&a, &b).unwrap();
/// assert!((x[0] - 1.0).abs() < 1e-12 && (x[1] - 2.0).abs() < 1e-12);
/// ```
#[allow(clippy::needless_range_loop)]
pub fn solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return Err(WellTestError::DimensionMismatch(format!(
            "Cannot solve a {}x{} system with a right-hand side of length {}",
            a.nrows(),
            a.ncols(),
            b.len()
        )));
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(WellTestError::SingularMatrix);
    }

    let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if scale == 0.0 {
        return Err(WellTestError::SingularMatrix);
    }
    let tolerance = PIVOT_TOLERANCE * scale;

    let mut matrix = a.clone();
    let mut rhs = b.clone();

    // Forward elimination with partial pivoting
    for col in 0..n {
        let mut max_row = col;
        let mut max_val = matrix[[col, col]].abs();
        for row in (col + 1)..n {
            if matrix[[row, col]].abs() > max_val {
                max_val = matrix[[row, col]].abs();
                max_row = row;
            }
        }

        if max_val < tolerance {
            return Err(WellTestError::SingularMatrix);
        }

        if max_row != col {
            for j in 0..n {
                matrix.swap([col, j], [max_row, j]);
            }
            rhs.swap(col, max_row);
        }

        for row in (col + 1)..n {
            let factor = matrix[[row, col]] / matrix[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                matrix[[row, j]] -= factor * matrix[[col, j]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    // Back substitution
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = rhs[i];
        for j in (i + 1)..n {
            sum -= matrix[[i, j]] * x[j];
        }
        x[i] = sum / matrix[[i, i]];
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_solve_3x3() {
        let a = array![[4.0, -2.0, 1.0], [-2.0, 4.0, -2.0], [1.0, -2.0, 4.0]];
        let x_true = array![1.0, -2.0, 3.0];
        let b = a.dot(&x_true);
        let x = solve(&a, &b).unwrap();
        for i in 0..3 {
            assert_relative_eq!(x[i], x_true[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pivoting_required() {
        let a = array![[1e-20, 1.0], [1.0, 1.0]];
        let b = array![1.0, 2.0];
        let x = solve(&a, &b).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_detection() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(matches!(
            solve(&a, &array![1.0, 2.0]),
            Err(WellTestError::SingularMatrix)
        ));

        let zero = Array2::<f64>::zeros((2, 2));
        assert!(solve(&zero, &array![1.0, 1.0]).is_err());

        let nan = array![[f64::NAN, 0.0], [0.0, 1.0]];
        assert!(solve(&nan, &array![1.0, 1.0]).is_err());
    }

    #[test]
    fn test_dimension_checks() {
        let a = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        assert!(matches!(
            solve(&a, &array![1.0, 1.0]),
            Err(WellTestError::DimensionMismatch(_))
        ));
        let a = Array2::<f64>::eye(2);
        assert!(solve(&a, &array![1.0]).is_err());
    }
}
