// src/core/data.rs
use crate::core::{Result, SurrogateError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use std::fmt;
use tracing::{debug, warn};

/// Represents a single data instance (a row of features), e.g. the query point.
pub type Instance = Array1<f64>;

/// Represents a feature matrix, one instance per row.
pub type Dataset = Array2<f64>;

/// Binary class labels, each either 0 or 1.
pub type Labels = Array1<usize>;

/// Per-row class probabilities, one column per class.
pub type Probabilities = Array2<f64>;

/// Counts the rows of each class in a binary label vector.
///
/// Fails with `PreconditionError` if any label falls outside {0, 1}.
pub fn class_counts(labels: ArrayView1<usize>) -> Result<[usize; 2]> {
    let mut counts = [0usize; 2];
    for &label in labels.iter() {
        match counts.get_mut(label) {
            Some(count) => *count += 1,
            None => {
                return Err(SurrogateError::PreconditionError(format!(
                    "only binary labels {{0, 1}} are supported, found label {}",
                    label
                )))
            }
        }
    }
    Ok(counts)
}

/// Data the caller already has about the problem: used to estimate the
/// sampling covariance and class proportions, and as the rows fidelity is
/// scored over. Never mutated.
#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    features: Dataset,
    labels: Option<Labels>,
}

impl ReferenceDataset {
    /// Unlabelled reference data.
    pub fn new(features: Dataset) -> Self {
        ReferenceDataset {
            features,
            labels: None,
        }
    }

    /// Labelled reference data. Labels must be binary and one per row.
    pub fn with_labels(features: Dataset, labels: Labels) -> Result<Self> {
        if labels.len() != features.nrows() {
            return Err(SurrogateError::IncompatibleDimensions(format!(
                "dataset has {} rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        class_counts(labels.view())?;
        Ok(ReferenceDataset {
            features,
            labels: Some(labels),
        })
    }

    pub fn features(&self) -> &Dataset {
        &self.features
    }

    pub fn labels(&self) -> Option<&Labels> {
        self.labels.as_ref()
    }

    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }

    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }
}

/// The synthetic neighbourhood drawn around a query point, together with the
/// black box's answers for every row.
#[derive(Debug, Clone)]
pub struct SampledNeighborhood {
    features: Dataset,
    labels: Labels,
    probabilities: Probabilities,
}

impl SampledNeighborhood {
    pub(crate) fn new(features: Dataset, labels: Labels, probabilities: Probabilities) -> Result<Self> {
        let n = features.nrows();
        if labels.len() != n || probabilities.nrows() != n {
            return Err(SurrogateError::ModelPredictionError(format!(
                "black box returned {} labels and {} probability rows for {} samples",
                labels.len(),
                probabilities.nrows(),
                n
            )));
        }
        class_counts(labels.view())?;
        Ok(SampledNeighborhood {
            features,
            labels,
            probabilities,
        })
    }

    pub fn features(&self) -> &Dataset {
        &self.features
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn probabilities(&self) -> &Probabilities {
        &self.probabilities
    }

    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }

    /// Rows per class, `[class 0, class 1]`.
    pub fn class_counts(&self) -> [usize; 2] {
        // Labels were validated in `new`.
        let mut counts = [0usize; 2];
        for &label in self.labels.iter() {
            counts[label] += 1;
        }
        counts
    }

    /// Returns a copy in which the minority class has been randomly
    /// oversampled (with replacement) until both classes have the same
    /// number of rows. The original rows come first, in their original order.
    ///
    /// If only one class is present there is nothing to oversample from; the
    /// copy is returned unchanged and a warning is logged.
    pub fn rebalanced<R: Rng + ?Sized>(&self, rng: &mut R) -> SampledNeighborhood {
        let counts = self.class_counts();
        let (minority, deficit) = if counts[0] < counts[1] {
            (0, counts[1] - counts[0])
        } else {
            (1, counts[0] - counts[1])
        };

        if deficit == 0 {
            return self.clone();
        }
        if counts[minority] == 0 {
            warn!(
                class_counts = ?counts,
                "cannot rebalance a neighbourhood containing a single class; training on it unchanged"
            );
            return self.clone();
        }

        let minority_rows: Vec<usize> = self
            .labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == minority)
            .map(|(i, _)| i)
            .collect();

        let mut rows: Vec<usize> = (0..self.len()).collect();
        rows.extend((0..deficit).map(|_| minority_rows[rng.gen_range(0..minority_rows.len())]));
        debug!(minority, added = deficit, "oversampled minority class");

        SampledNeighborhood {
            features: self.features.select(Axis(0), &rows),
            labels: self.labels.select(Axis(0), &rows),
            probabilities: self.probabilities.select(Axis(0), &rows),
        }
    }
}

/// Feature importances read off a fitted local surrogate.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    /// Class-1 coefficients, one per feature.
    pub importances: Array1<f64>,
    /// Class-1 intercept of the surrogate.
    pub intercept: f64,
    /// The point that was explained.
    pub query_point: Instance,
}

impl Explanation {
    /// Importances for `class`. With two classes the class-0 importances are
    /// the negation of the class-1 ones.
    pub fn class_importances(&self, class: usize) -> Result<Array1<f64>> {
        match class {
            0 => Ok(self.importances.mapv(|v| -v)),
            1 => Ok(self.importances.clone()),
            other => Err(SurrogateError::PreconditionError(format!(
                "only classes 0 and 1 are explained, asked for class {}",
                other
            ))),
        }
    }

    pub fn num_features(&self) -> usize {
        self.importances.len()
    }

    /// Feature indices ordered by absolute importance, largest first.
    pub fn ranked_features(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.importances.len()).collect();
        order.sort_by(|&a, &b| {
            self.importances[b]
                .abs()
                .partial_cmp(&self.importances[a].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Explanation:")?;
        writeln!(f, "  Intercept (class 1): {:.4}", self.intercept)?;
        writeln!(f, "  Importances (class 1):")?;
        for (i, val) in self.importances.iter().enumerate() {
            writeln!(f, "    Feature {}: {:.4}", i, val)?;
        }
        writeln!(f, "  Query Point (first 10):")?;
        for (i, val) in self.query_point.iter().take(10).enumerate() {
            writeln!(f, "    Feature {}: {:.4}", i, val)?;
        }
        if self.query_point.len() > 10 {
            writeln!(f, "    ...")?;
        }
        Ok(())
    }
}
