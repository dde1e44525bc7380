//! Dense linear solves for small regression problems
//!
//! The forecasting models fit at most a few dozen coefficients, so normal
//! equations solved by Gaussian elimination are accurate enough and keep the
//! dependency footprint to `ndarray`.

use crate::{MathError, Result};
use ndarray::{Array1, Array2};

const PIVOT_TOLERANCE: f64 = 1e-12;

/// Solve the square system `a * x = b` with partial pivoting
pub fn solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(MathError::InvalidInput(format!(
            "Matrix must be square, got {}x{}",
            n,
            a.ncols()
        )));
    }
    if b.len() != n {
        return Err(MathError::InvalidInput(format!(
            "Right-hand side has length {}, expected {}",
            b.len(),
            n
        )));
    }

    let mut m = a.clone();
    let mut rhs = b.clone();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[[i, col]].abs().total_cmp(&m[[j, col]].abs()))
            .unwrap_or(col);

        if m[[pivot, col]].abs() < PIVOT_TOLERANCE {
            return Err(MathError::CalculationError(
                "Matrix is singular or nearly singular".to_string(),
            ));
        }

        if pivot != col {
            for k in 0..n {
                m.swap([pivot, k], [col, k]);
            }
            rhs.swap(pivot, col);
        }

        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[[row, k]] -= factor * m[[col, k]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| m[[row, k]] * x[k]).sum();
        x[row] = (rhs[row] - tail) / m[[row, row]];
    }

    Ok(x)
}

/// Ordinary least squares: minimise `|X b - y|^2`
pub fn least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Result<Array1<f64>> {
    ridge_least_squares(x, y, &vec![0.0; x.ncols()])
}

/// Least squares with a per-coefficient L2 penalty:
/// minimise `|X b - y|^2 + sum(penalty[j] * b[j]^2)`.
///
/// A zero penalty leaves that coefficient unregularised.
pub fn ridge_least_squares(
    x: &Array2<f64>,
    y: &Array1<f64>,
    penalties: &[f64],
) -> Result<Array1<f64>> {
    if x.nrows() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design matrix has {} rows but target has {} values",
            x.nrows(),
            y.len()
        )));
    }
    if penalties.len() != x.ncols() {
        return Err(MathError::InvalidInput(format!(
            "Expected {} penalties, got {}",
            x.ncols(),
            penalties.len()
        )));
    }
    if penalties.iter().any(|p| *p < 0.0 || !p.is_finite()) {
        return Err(MathError::InvalidInput(
            "Penalties must be finite and non-negative".to_string(),
        ));
    }
    if x.nrows() == 0 {
        return Err(MathError::InsufficientData(
            "Cannot fit a regression without observations".to_string(),
        ));
    }

    let xt = x.t();
    let mut gram = xt.dot(x);
    for (j, p) in penalties.iter().enumerate() {
        gram[[j, j]] += p;
    }
    let moment = xt.dot(y);

    solve(&gram, &moment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_solve_requires_pivoting() {
        // Zero in the leading position
        let a = array![[0.0, 1.0], [2.0, 1.0]];
        let b = array![1.0, 3.0];
        let x = solve(&a, &b).unwrap();

        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_matrix() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let b = array![1.0, 2.0];
        assert!(matches!(solve(&a, &b), Err(MathError::CalculationError(_))));
    }

    #[test]
    fn test_least_squares_recovers_line() {
        // y = 2 + 3x
        let n = 20;
        let mut x = Array2::<f64>::zeros((n, 2));
        let mut y = Array1::<f64>::zeros(n);
        for i in 0..n {
            x[[i, 0]] = 1.0;
            x[[i, 1]] = i as f64;
            y[i] = 2.0 + 3.0 * i as f64;
        }

        let beta = least_squares(&x, &y).unwrap();
        assert_abs_diff_eq!(beta[0], 2.0, epsilon = 1e-8);
        assert_abs_diff_eq!(beta[1], 3.0, epsilon = 1e-8);
    }

    #[test]
    fn test_ridge_shrinks_penalised_coefficient() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![0.0, 1.0, 2.0, 3.0];

        let free = least_squares(&x, &y).unwrap();
        let shrunk = ridge_least_squares(&x, &y, &[0.0, 100.0]).unwrap();

        assert!(shrunk[1].abs() < free[1].abs());
    }

    #[test]
    fn test_dimension_mismatch() {
        let x = array![[1.0], [1.0]];
        let y = array![1.0];
        assert!(least_squares(&x, &y).is_err());
        assert!(ridge_least_squares(&x, &array![1.0, 1.0], &[]).is_err());
    }
}
