// src/algorithms/ridge.rs
//! Sample-weighted, multi-output ridge regression.

use crate::algorithms::weighting::WeightVector;
use crate::core::{Dataset, Result, SurrogateError};
use crate::utils::linalg::solve_spd;
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

/// Regularisation strength used for local surrogates unless configured otherwise.
pub const DEFAULT_ALPHA: f64 = 1.0;

/// Ridge regression settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RidgeRegression {
    alpha: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        RidgeRegression { alpha: DEFAULT_ALPHA }
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Result<Self> {
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(SurrogateError::InvalidArgument(format!(
                "ridge alpha must be finite and non-negative, got {}",
                alpha
            )));
        }
        Ok(RidgeRegression { alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Fits one linear model per column of `targets`.
    ///
    /// Minimises `Σ wᵢ ‖yᵢ - xᵢβ - b‖² + α‖β‖²`; the intercept `b` is not
    /// penalised. Solved through the weighted-centred normal equations.
    pub fn fit(&self, features: &Dataset, targets: &Array2<f64>, weights: &WeightVector) -> Result<SurrogateModel> {
        let (n_samples, n_features) = features.dim();
        if targets.nrows() != n_samples || weights.len() != n_samples {
            return Err(SurrogateError::IncompatibleDimensions(format!(
                "{} samples but {} target rows and {} weights",
                n_samples,
                targets.nrows(),
                weights.len()
            )));
        }
        if n_samples == 0 {
            return Err(SurrogateError::ArithmeticError(
                "cannot fit with zero samples".to_string(),
            ));
        }
        let total = weights.total();
        if !(total > 0.0) || !total.is_finite() {
            return Err(SurrogateError::ArithmeticError(format!(
                "sample weights must have a positive finite sum, got {}",
                total
            )));
        }
        if features.iter().chain(targets.iter()).any(|v| !v.is_finite()) {
            return Err(SurrogateError::ArithmeticError(
                "features and targets must be finite".to_string(),
            ));
        }

        let w = weights.values().view().insert_axis(Axis(1));
        let x_mean = (features * &w).sum_axis(Axis(0)) / total;
        let y_mean = (targets * &w).sum_axis(Axis(0)) / total;

        // Rescale centred rows by sqrt(w) so plain normal equations apply.
        let sqrt_w = w.mapv(f64::sqrt);
        let x_w = (features - &x_mean.view().insert_axis(Axis(0))) * &sqrt_w;
        let y_w = (targets - &y_mean.view().insert_axis(Axis(0))) * &sqrt_w;

        let mut gram = x_w.t().dot(&x_w);
        for i in 0..n_features {
            gram[[i, i]] += self.alpha;
        }
        let beta = solve_spd(&gram, &x_w.t().dot(&y_w))?;

        let intercepts = &y_mean - &x_mean.dot(&beta);
        let coefficients = beta.reversed_axes();
        debug!(
            samples = n_samples,
            features = n_features,
            alpha = self.alpha,
            intercepts = ?intercepts,
            "fitted ridge surrogate"
        );

        Ok(SurrogateModel {
            coefficients,
            intercepts,
            alpha: self.alpha,
        })
    }
}

/// A fitted linear model: one row of coefficients and one intercept per output.
#[derive(Debug, Clone, PartialEq)]
pub struct SurrogateModel {
    coefficients: Array2<f64>,
    intercepts: Array1<f64>,
    alpha: f64,
}

impl SurrogateModel {
    /// Coefficients, shape `(outputs, features)`.
    pub fn coefficients(&self) -> &Array2<f64> {
        &self.coefficients
    }

    pub fn intercepts(&self) -> &Array1<f64> {
        &self.intercepts
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn num_features(&self) -> usize {
        self.coefficients.ncols()
    }

    /// Raw regression output, shape `(rows, outputs)`. Values are not
    /// clipped to any range.
    pub fn predict(&self, features: &Dataset) -> Result<Array2<f64>> {
        if features.ncols() != self.num_features() {
            return Err(SurrogateError::IncompatibleDimensions(format!(
                "surrogate expects {} features, got {}",
                self.num_features(),
                features.ncols()
            )));
        }
        Ok(features.dot(&self.coefficients.t()) + &self.intercepts.view().insert_axis(Axis(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn line() -> (Dataset, Array2<f64>) {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0]];
        let y = x.mapv(|v| 2.0 * v + 1.0);
        (x, y)
    }

    #[test]
    fn unregularised_fit_recovers_a_line() -> Result<()> {
        let (x, y) = line();
        let model = RidgeRegression::new(0.0)?.fit(&x, &y, &WeightVector::uniform(5))?;
        assert_abs_diff_eq!(model.coefficients()[[0, 0]], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(model.intercepts()[0], 1.0, epsilon = 1e-10);
        let pred = model.predict(&array![[10.0]])?;
        assert_abs_diff_eq!(pred[[0, 0]], 21.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn penalty_matches_closed_form_and_spares_the_intercept() -> Result<()> {
        let (x, y) = line();
        // centred x = [-2,-1,0,1,2], Σxc² = 10, Σxc·yc = 20
        let model = RidgeRegression::new(1.0)?.fit(&x, &y, &WeightVector::uniform(5))?;
        let slope = 20.0 / 11.0;
        assert_abs_diff_eq!(model.coefficients()[[0, 0]], slope, epsilon = 1e-12);
        assert_abs_diff_eq!(model.intercepts()[0], 5.0 - 2.0 * slope, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn zero_weight_rows_are_ignored() -> Result<()> {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![[1.0], [3.0], [5.0], [100.0]];
        let weights = WeightVector::new(array![1.0, 1.0, 1.0, 0.0])?;
        let model = RidgeRegression::new(0.0)?.fit(&x, &y, &weights)?;
        assert_abs_diff_eq!(model.coefficients()[[0, 0]], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(model.intercepts()[0], 1.0, epsilon = 1e-10);
        Ok(())
    }

    #[test]
    fn fits_each_output_column() -> Result<()> {
        let x = array![[0.0, 1.0], [1.0, 0.0], [1.0, 1.0], [2.0, 3.0]];
        let y = array![[0.2, 0.8], [0.6, 0.4], [0.7, 0.3], [0.9, 0.1]];
        let model = RidgeRegression::default().fit(&x, &y, &WeightVector::uniform(4))?;
        assert_eq!(model.coefficients().dim(), (2, 2));
        // targets sum to one, so the two outputs mirror each other
        for j in 0..2 {
            assert_abs_diff_eq!(
                model.coefficients()[[0, j]],
                -model.coefficients()[[1, j]],
                epsilon = 1e-12
            );
        }
        assert_abs_diff_eq!(model.intercepts().sum(), 1.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn rejects_zero_total_weight_and_bad_alpha() {
        let (x, y) = line();
        let zero = WeightVector::new(Array1::zeros(5)).unwrap();
        assert!(matches!(
            RidgeRegression::default().fit(&x, &y, &zero),
            Err(SurrogateError::ArithmeticError(_))
        ));
        assert!(RidgeRegression::new(-1.0).is_err());
        assert!(RidgeRegression::default()
            .fit(&x, &y, &WeightVector::uniform(4))
            .is_err());
    }
}
