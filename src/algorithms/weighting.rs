// src/algorithms/weighting.rs
//! Per-row sample weights: decay with distance from the query point,
//! inverse class frequency, or the product of both.

use crate::core::{class_counts, Dataset, Result, SurrogateError};
use crate::utils::linalg::squared_distances;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A non-negative weight for each of a set of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightVector {
    values: Array1<f64>,
}

impl WeightVector {
    /// Weight 1 for each of `n` rows.
    pub fn uniform(n: usize) -> Self {
        WeightVector {
            values: Array1::ones(n),
        }
    }

    /// Wraps caller-supplied weights. Every weight must be finite and >= 0.
    pub fn new(values: Array1<f64>) -> Result<Self> {
        if values.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(SurrogateError::InvalidArgument(
                "weights must be finite and non-negative".to_string(),
            ));
        }
        Ok(WeightVector { values })
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.values.sum()
    }

    /// Elementwise product of two weightings over the same rows.
    pub fn combine(&self, other: &WeightVector) -> Result<WeightVector> {
        if self.len() != other.len() {
            return Err(SurrogateError::IncompatibleDimensions(format!(
                "cannot combine weights over {} and {} rows",
                self.len(),
                other.len()
            )));
        }
        Ok(WeightVector {
            values: &self.values * &other.values,
        })
    }

    pub fn into_inner(self) -> Array1<f64> {
        self.values
    }
}

/// Exponential kernel on Euclidean distance: `exp(-d² / width²)`.
///
/// Without an explicit width, `0.75 * sqrt(n_features)` is used. Weights are
/// floored at the smallest positive `f64` so that far-away rows never get an
/// exact zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceKernel {
    width: Option<f64>,
}

impl DistanceKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_width(width: f64) -> Result<Self> {
        if !width.is_finite() || width <= 0.0 {
            return Err(SurrogateError::InvalidArgument(format!(
                "kernel width must be positive and finite, got {}",
                width
            )));
        }
        Ok(DistanceKernel { width: Some(width) })
    }

    /// Width used for points with `n_features` features.
    pub fn width_for(&self, n_features: usize) -> f64 {
        self.width
            .unwrap_or_else(|| 0.75 * (n_features.max(1) as f64).sqrt())
    }

    /// Kernel value for a single squared distance.
    pub fn weight(&self, squared_distance: f64, n_features: usize) -> f64 {
        let width = self.width_for(n_features);
        (-squared_distance / (width * width))
            .exp()
            .max(f64::MIN_POSITIVE)
    }

    /// Weights for every row of `rows` by closeness to `query_point`.
    pub fn weights(&self, query_point: ArrayView1<f64>, rows: &Dataset) -> Result<WeightVector> {
        let n_features = query_point.len();
        let d2 = squared_distances(rows, query_point)?;
        Ok(WeightVector {
            values: d2.mapv(|d| self.weight(d, n_features)),
        })
    }
}

/// Per-class weights `n / (2 * n_c)`: the minority class gets the larger one.
///
/// Fails with `PreconditionError` unless both classes are present.
pub fn class_weights(labels: ArrayView1<usize>) -> Result<[f64; 2]> {
    let counts = class_counts(labels)?;
    if counts.iter().any(|&c| c == 0) {
        return Err(SurrogateError::PreconditionError(format!(
            "class-imbalance weighting requires exactly 2 observed classes, got counts {:?}",
            counts
        )));
    }
    let n = labels.len() as f64;
    Ok([n / (2.0 * counts[0] as f64), n / (2.0 * counts[1] as f64)])
}

/// Gives each row the weight of its class.
pub fn assign_class_weights(weights: [f64; 2], labels: ArrayView1<usize>) -> Result<WeightVector> {
    // Validates the labels before indexing.
    class_counts(labels)?;
    Ok(WeightVector {
        values: labels.mapv(|label| weights[label]),
    })
}

/// Inverse-frequency weights for `n_rows` rows described by `labels`.
///
/// Without labels this degrades to uniform weights and logs a warning.
pub fn class_balanced_weights(labels: Option<ArrayView1<usize>>, n_rows: usize) -> Result<WeightVector> {
    match labels {
        Some(labels) => {
            if labels.len() != n_rows {
                return Err(SurrogateError::IncompatibleDimensions(format!(
                    "{} labels for {} rows",
                    labels.len(),
                    n_rows
                )));
            }
            assign_class_weights(class_weights(labels)?, labels)
        }
        None => {
            warn!("no class labels available: not using class balanced weighting");
            Ok(WeightVector::uniform(n_rows))
        }
    }
}
