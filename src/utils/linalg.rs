// src/utils/linalg.rs
//! Small dense linear algebra helpers: covariance estimation, a factorisation
//! of positive semi-definite matrices for Gaussian sampling, and an SPD solve
//! for the ridge normal equations.

use crate::core::{Dataset, Result, SurrogateError};
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Symmetry is checked relative to the largest entry.
const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// Unbiased (n - 1) sample covariance of the columns of `features`.
pub fn covariance(features: &Dataset) -> Result<Array2<f64>> {
    let n = features.nrows();
    if n < 2 {
        return Err(SurrogateError::InvalidArgument(format!(
            "estimating a covariance needs at least 2 rows, got {}",
            n
        )));
    }
    let mean = features
        .mean_axis(Axis(0))
        .ok_or_else(|| SurrogateError::ArithmeticError("cannot average an empty dataset".to_string()))?;
    let centered = features - &mean.insert_axis(Axis(0));
    Ok(centered.t().dot(&centered) / (n - 1) as f64)
}

/// Squared Euclidean distance from every row of `rows` to `point`.
pub fn squared_distances(rows: &Dataset, point: ArrayView1<f64>) -> Result<Array1<f64>> {
    if rows.ncols() != point.len() {
        return Err(SurrogateError::IncompatibleDimensions(format!(
            "rows have {} features but the point has {}",
            rows.ncols(),
            point.len()
        )));
    }
    Ok(rows
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .zip(point.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
        })
        .collect())
}

/// Largest absolute entry of a square, finite, symmetric matrix.
fn check_square_symmetric(a: &Array2<f64>) -> Result<f64> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(SurrogateError::InvalidArgument(format!(
            "covariance must be square, got {}x{}",
            a.nrows(),
            a.ncols()
        )));
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(SurrogateError::InvalidArgument(
            "covariance contains non-finite entries".to_string(),
        ));
    }
    let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    for i in 0..n {
        for j in (i + 1)..n {
            if (a[[i, j]] - a[[j, i]]).abs() > SYMMETRY_TOLERANCE * scale {
                return Err(SurrogateError::InvalidArgument(format!(
                    "covariance is not symmetric at ({}, {})",
                    i, j
                )));
            }
        }
    }
    Ok(scale)
}

/// Pivots (or eigenvalues) within this distance of zero count as zero.
fn zero_tolerance(n: usize, scale: f64) -> f64 {
    64.0 * n.max(1) as f64 * f64::EPSILON * scale
}

/// Returns `L` with `L Lᵀ = a` for a symmetric positive semi-definite `a`.
///
/// Singular (semi-definite) matrices are accepted; zero pivots give zero
/// columns in `L`. Fails with `InvalidArgument` if `a` is not PSD.
#[cfg(not(feature = "linalg"))]
pub fn psd_factor(a: &Array2<f64>) -> Result<Array2<f64>> {
    let scale = check_square_symmetric(a)?;
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    if scale == 0.0 {
        return Ok(l);
    }
    let tol = zero_tolerance(n, scale);

    for j in 0..n {
        let mut diag = a[[j, j]];
        for k in 0..j {
            diag -= l[[j, k]] * l[[j, k]];
        }
        if diag < -tol {
            return Err(not_psd());
        }

        if diag <= tol {
            // Zero pivot: the rest of this column must vanish too.
            for i in (j + 1)..n {
                let mut off = a[[i, j]];
                for k in 0..j {
                    off -= l[[i, k]] * l[[j, k]];
                }
                if off.abs() > (tol * scale).sqrt() {
                    return Err(not_psd());
                }
            }
            continue;
        }

        let pivot = diag.sqrt();
        l[[j, j]] = pivot;
        for i in (j + 1)..n {
            let mut off = a[[i, j]];
            for k in 0..j {
                off -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = off / pivot;
        }
    }
    Ok(l)
}

/// Returns `F` with `F Fᵀ = a` for a symmetric positive semi-definite `a`,
/// built from the eigendecomposition `a = V Λ Vᵀ` as `F = V Λ^½`.
#[cfg(feature = "linalg")]
pub fn psd_factor(a: &Array2<f64>) -> Result<Array2<f64>> {
    use ndarray_linalg::{Eigh, UPLO};

    let scale = check_square_symmetric(a)?;
    let n = a.nrows();
    if scale == 0.0 {
        return Ok(Array2::zeros((n, n)));
    }
    let tol = zero_tolerance(n, scale);
    let (eigenvalues, eigenvectors) = a
        .eigh(UPLO::Lower)
        .map_err(|e| SurrogateError::ArithmeticError(format!("eigendecomposition failed: {}", e)))?;
    if eigenvalues.iter().any(|&v| v < -tol) {
        return Err(not_psd());
    }
    let roots = eigenvalues.mapv(|v| v.max(0.0).sqrt());
    Ok(eigenvectors * &roots.insert_axis(Axis(0)))
}

fn not_psd() -> SurrogateError {
    SurrogateError::InvalidArgument("covariance is not positive semi-definite".to_string())
}

fn check_system(a: &Array2<f64>, b: &Array2<f64>) -> Result<()> {
    if a.nrows() != a.ncols() || a.nrows() != b.nrows() {
        return Err(SurrogateError::IncompatibleDimensions(format!(
            "cannot solve a {}x{} system against {} right-hand rows",
            a.nrows(),
            a.ncols(),
            b.nrows()
        )));
    }
    Ok(())
}

/// Solves `a x = b` column by column for a symmetric positive-definite `a`
/// through LAPACK's Cholesky factorisation.
#[cfg(feature = "linalg")]
pub fn solve_spd(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    use ndarray_linalg::{FactorizeC, SolveC, UPLO};

    check_system(a, b)?;
    let factor = a.factorizec(UPLO::Lower).map_err(|e| {
        SurrogateError::ArithmeticError(format!("normal equations are not positive definite: {}", e))
    })?;
    let mut x = Array2::<f64>::zeros(b.raw_dim());
    for (col, mut out) in b.columns().into_iter().zip(x.columns_mut()) {
        let solved = factor
            .solvec(&col.to_owned())
            .map_err(|e| SurrogateError::ArithmeticError(format!("Cholesky solve failed: {}", e)))?;
        out.assign(&solved);
    }
    Ok(x)
}

/// Solves `a x = b` column by column for a symmetric positive-definite `a`
/// via Cholesky decomposition.
#[cfg(not(feature = "linalg"))]
pub fn solve_spd(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    check_system(a, b)?;
    let n = a.nrows();

    // Cholesky decomposition: A = L * L^T
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return Err(SurrogateError::ArithmeticError(
                        "normal equations are not positive definite".to_string(),
                    ));
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    let mut x = Array2::<f64>::zeros(b.raw_dim());
    for (col, mut out) in b.columns().into_iter().zip(x.columns_mut()) {
        // Forward substitution: L * y = b
        let mut y = Array1::<f64>::zeros(n);
        for i in 0..n {
            let mut sum = 0.0;
            for j in 0..i {
                sum += l[[i, j]] * y[j];
            }
            y[i] = (col[i] - sum) / l[[i, i]];
        }
        // Backward substitution: L^T * x = y
        for i in (0..n).rev() {
            let mut sum = 0.0;
            for j in (i + 1)..n {
                sum += l[[j, i]] * out[j];
            }
            out[i] = (y[i] - sum) / l[[i, i]];
        }
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn assert_reconstructs(a: &Array2<f64>) {
        let f = psd_factor(a).unwrap();
        let back = f.dot(&f.t());
        for (x, y) in back.iter().zip(a.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-9);
        }
    }

    #[test]
    fn covariance_matches_hand_computation() {
        let x = array![[1.0, 2.0], [3.0, 6.0], [5.0, 10.0]];
        let cov = covariance(&x).unwrap();
        assert_abs_diff_eq!(cov[[0, 0]], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[0, 1]], 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[1, 1]], 16.0, epsilon = 1e-12);
    }

    #[test]
    fn covariance_needs_two_rows() {
        assert!(matches!(
            covariance(&array![[1.0, 2.0]]),
            Err(SurrogateError::InvalidArgument(_))
        ));
    }

    #[test]
    fn factorises_definite_and_semi_definite_matrices() {
        assert_reconstructs(&array![[2.0, 0.5], [0.5, 1.0]]);
        assert_reconstructs(&Array2::eye(3));
        // rank one
        assert_reconstructs(&array![[4.0, 8.0], [8.0, 16.0]]);
        assert_reconstructs(&array![[0.0, 0.0], [0.0, 1.0]]);
    }

    #[test]
    fn rejects_indefinite_and_asymmetric_matrices() {
        for bad in [
            array![[1.0, 2.0], [2.0, 1.0]],
            array![[0.0, 1.0], [1.0, 0.0]],
            array![[-1.0, 0.0], [0.0, 1.0]],
            array![[1.0, 0.3], [0.0, 1.0]],
        ] {
            assert!(matches!(psd_factor(&bad), Err(SurrogateError::InvalidArgument(_))));
        }
        assert!(psd_factor(&Array2::zeros((2, 3))).is_err());
    }

    #[test]
    fn tolerance_follows_the_matrix_scale() {
        let tiny = array![[1e-12, 0.5e-12], [0.5e-12, 1e-12]];
        let f = psd_factor(&tiny).unwrap();
        assert!(f.iter().any(|v| v.abs() > 0.0));
        let back = f.dot(&f.t());
        for (x, y) in back.iter().zip(tiny.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-20);
        }

        assert!(matches!(
            psd_factor(&array![[1e-12, 0.0], [0.0, -1e-12]]),
            Err(SurrogateError::InvalidArgument(_))
        ));
        assert!(matches!(
            psd_factor(&array![[1e-12, 0.3e-12], [0.0, 1e-12]]),
            Err(SurrogateError::InvalidArgument(_))
        ));
        assert_eq!(psd_factor(&Array2::zeros((2, 2))).unwrap(), Array2::<f64>::zeros((2, 2)));
    }

    #[test]
    fn solves_spd_system_for_each_column() {
        let a = array![[4.0, 1.0], [1.0, 3.0]];
        let b = array![[1.0, 0.0], [2.0, 1.0]];
        let x = solve_spd(&a, &b).unwrap();
        let back = a.dot(&x);
        for (p, q) in back.iter().zip(b.iter()) {
            assert_abs_diff_eq!(p, q, epsilon = 1e-12);
        }
        assert!(solve_spd(&array![[0.0, 0.0], [0.0, 1.0]], &b).is_err());
    }

    #[test]
    fn squared_distances_per_row() {
        let rows = array![[0.0, 0.0], [3.0, 4.0]];
        let d = squared_distances(&rows, array![0.0, 0.0].view()).unwrap();
        assert_eq!(d, array![0.0, 25.0]);
        assert!(squared_distances(&rows, array![0.0].view()).is_err());
    }
}
