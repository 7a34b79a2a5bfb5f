// src/algorithms/fidelity.rs
//! How often a surrogate agrees with the black box, optionally weighted by
//! locality and/or class balance.

use crate::algorithms::weighting::{class_balanced_weights, DistanceKernel, WeightVector};
use crate::core::{Dataset, ReferenceDataset, Result, SurrogateError};
use crate::traits::{BlackBoxModel, Surrogate};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// The fidelity variants, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FidelityMetric {
    /// Every row counts once.
    Plain,
    /// Rows weighted by closeness to the query point.
    Local,
    /// Rows weighted by inverse class frequency.
    ClassBalanced,
    /// Product of the local and class-balanced weights.
    LocalAndBalanced,
}

impl FidelityMetric {
    pub const ALL: [FidelityMetric; 4] = [
        FidelityMetric::Plain,
        FidelityMetric::Local,
        FidelityMetric::ClassBalanced,
        FidelityMetric::LocalAndBalanced,
    ];

    /// Whether scoring needs a query point.
    pub fn is_local(&self) -> bool {
        matches!(self, FidelityMetric::Local | FidelityMetric::LocalAndBalanced)
    }

    pub fn is_balanced(&self) -> bool {
        matches!(self, FidelityMetric::ClassBalanced | FidelityMetric::LocalAndBalanced)
    }

    /// Row weights for this variant. Local variants need `query_point`;
    /// balanced ones fall back to uniform weights (with a warning) when
    /// `labels` is `None`.
    pub fn weights(
        &self,
        rows: &Dataset,
        labels: Option<ArrayView1<usize>>,
        query_point: Option<ArrayView1<f64>>,
        kernel: &DistanceKernel,
    ) -> Result<WeightVector> {
        let mut weights = WeightVector::uniform(rows.nrows());
        if self.is_local() {
            let query_point = query_point.ok_or_else(|| {
                SurrogateError::InvalidArgument(format!("{} needs a query point", self))
            })?;
            weights = weights.combine(&kernel.weights(query_point, rows)?)?;
        }
        if self.is_balanced() {
            weights = weights.combine(&class_balanced_weights(labels, rows.nrows())?)?;
        }
        Ok(weights)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FidelityMetric::Plain => "fidelity (normal)",
            FidelityMetric::Local => "fidelity (local)",
            FidelityMetric::ClassBalanced => "fidelity (class balanced)",
            FidelityMetric::LocalAndBalanced => "fidelity (local and balanced)",
        }
    }
}

impl fmt::Display for FidelityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FidelityMetric {
    type Err = SurrogateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "fidelity (normal)" | "fidelity" | "plain" => Ok(FidelityMetric::Plain),
            "fidelity (local)" | "local_fidelity" | "local" => Ok(FidelityMetric::Local),
            "fidelity (class balanced)" | "bal_fidelity" | "class_balanced" => {
                Ok(FidelityMetric::ClassBalanced)
            }
            "fidelity (local and balanced)" | "local_and_bal_fidelity" | "local_and_balanced" => {
                Ok(FidelityMetric::LocalAndBalanced)
            }
            other => Err(SurrogateError::InvalidArgument(format!(
                "unknown fidelity metric '{}'",
                other
            ))),
        }
    }
}

/// 1 where the surrogate and the black box predict the same label, else 0.
pub fn agreement<S, M>(surrogate: &S, black_box: &M, dataset: &ReferenceDataset) -> Result<Array1<f64>>
where
    S: Surrogate + ?Sized,
    M: BlackBoxModel + ?Sized,
{
    if dataset.is_empty() {
        return Err(SurrogateError::ArithmeticError(
            "fidelity is undefined on an empty dataset".to_string(),
        ));
    }
    let expected = black_box.predict(dataset.features())?;
    let actual = surrogate.predict(dataset.features())?;
    if expected.len() != dataset.len() || actual.len() != dataset.len() {
        return Err(SurrogateError::ModelPredictionError(format!(
            "{} rows but {} black-box and {} surrogate predictions",
            dataset.len(),
            expected.len(),
            actual.len()
        )));
    }
    Ok(expected
        .iter()
        .zip(actual.iter())
        .map(|(e, a)| if e == a { 1.0 } else { 0.0 })
        .collect())
}

/// Weighted mean of `same` under `weights`.
///
/// Fails with `ArithmeticError` on empty input or a non-positive total weight.
pub fn weighted_agreement(same: &Array1<f64>, weights: &WeightVector) -> Result<f64> {
    if same.len() != weights.len() {
        return Err(SurrogateError::IncompatibleDimensions(format!(
            "{} agreement entries but {} weights",
            same.len(),
            weights.len()
        )));
    }
    if same.is_empty() {
        return Err(SurrogateError::ArithmeticError(
            "fidelity is undefined on an empty dataset".to_string(),
        ));
    }
    let total = weights.total();
    if !(total > 0.0) || !total.is_finite() {
        return Err(SurrogateError::ArithmeticError(format!(
            "total weight must be positive and finite, got {}",
            total
        )));
    }
    Ok(same.dot(weights.values()) / total)
}

/// Scores surrogates against a black box under a chosen [`FidelityMetric`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FidelityEvaluator {
    kernel: DistanceKernel,
}

impl FidelityEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `kernel` for the local variants.
    pub fn with_kernel(mut self, kernel: DistanceKernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn kernel(&self) -> &DistanceKernel {
        &self.kernel
    }

    /// Fidelity of `surrogate` to `black_box` over `dataset`. The local
    /// variants need `query_point`; the balanced ones use the dataset's
    /// labels and fall back to uniform weights (with a warning) without them.
    pub fn score<S, M>(
        &self,
        metric: FidelityMetric,
        surrogate: &S,
        black_box: &M,
        dataset: &ReferenceDataset,
        query_point: Option<ArrayView1<f64>>,
    ) -> Result<f64>
    where
        S: Surrogate + ?Sized,
        M: BlackBoxModel + ?Sized,
    {
        let same = agreement(surrogate, black_box, dataset)?;
        let weights = metric.weights(
            dataset.features(),
            dataset.labels().map(|labels| labels.view()),
            query_point,
            &self.kernel,
        )?;
        let score = weighted_agreement(&same, &weights)?;
        debug!(metric = %metric, score, rows = dataset.len(), "scored fidelity");
        Ok(score)
    }
}

/// Unweighted agreement rate.
pub fn fidelity<S, M>(surrogate: &S, black_box: &M, dataset: &ReferenceDataset) -> Result<f64>
where
    S: Surrogate + ?Sized,
    M: BlackBoxModel + ?Sized,
{
    FidelityEvaluator::new().score(FidelityMetric::Plain, surrogate, black_box, dataset, None)
}

/// Agreement weighted by closeness to `query_point`.
pub fn local_fidelity<S, M>(
    surrogate: &S,
    black_box: &M,
    dataset: &ReferenceDataset,
    query_point: ArrayView1<f64>,
) -> Result<f64>
where
    S: Surrogate + ?Sized,
    M: BlackBoxModel + ?Sized,
{
    FidelityEvaluator::new().score(FidelityMetric::Local, surrogate, black_box, dataset, Some(query_point))
}

/// Agreement weighted towards the minority class.
pub fn balanced_fidelity<S, M>(surrogate: &S, black_box: &M, dataset: &ReferenceDataset) -> Result<f64>
where
    S: Surrogate + ?Sized,
    M: BlackBoxModel + ?Sized,
{
    FidelityEvaluator::new().score(FidelityMetric::ClassBalanced, surrogate, black_box, dataset, None)
}

/// Agreement weighted by both locality and class balance.
pub fn local_and_balanced_fidelity<S, M>(
    surrogate: &S,
    black_box: &M,
    dataset: &ReferenceDataset,
    query_point: ArrayView1<f64>,
) -> Result<f64>
where
    S: Surrogate + ?Sized,
    M: BlackBoxModel + ?Sized,
{
    FidelityEvaluator::new().score(
        FidelityMetric::LocalAndBalanced,
        surrogate,
        black_box,
        dataset,
        Some(query_point),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Labels, Probabilities};
    use crate::utils::testing::capture_warnings;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};
    use proptest::prelude::*;

    /// Class 1 when the first feature is positive.
    struct SignOfFirst;

    impl BlackBoxModel for SignOfFirst {
        fn predict(&self, instances: &Dataset) -> Result<Labels> {
            Ok(instances.column(0).mapv(|v| usize::from(v > 0.0)))
        }

        fn predict_proba(&self, instances: &Dataset) -> Result<Probabilities> {
            let labels = BlackBoxModel::predict(self, instances)?;
            Ok(Array2::from_shape_fn((instances.nrows(), 2), |(i, j)| {
                if labels[i] == j {
                    1.0
                } else {
                    0.0
                }
            }))
        }

        fn num_features(&self) -> usize {
            1
        }
    }

    /// Always predicts class 1.
    struct AlwaysOne;

    impl Surrogate for AlwaysOne {
        fn predict(&self, instances: &Dataset) -> Result<Labels> {
            Ok(Labels::ones(instances.nrows()))
        }
    }

    impl Surrogate for SignOfFirst {
        fn predict(&self, instances: &Dataset) -> Result<Labels> {
            BlackBoxModel::predict(self, instances)
        }
    }

    // 1 row of class 0 (x <= 0), 4 rows of class 1
    fn skewed() -> ReferenceDataset {
        ReferenceDataset::with_labels(array![[-1.0], [1.0], [2.0], [3.0], [4.0]], array![0, 1, 1, 1, 1])
            .unwrap()
    }

    #[test]
    fn plain_fidelity_is_the_agreement_rate() -> Result<()> {
        assert_abs_diff_eq!(fidelity(&AlwaysOne, &SignOfFirst, &skewed())?, 0.8);
        assert_abs_diff_eq!(fidelity(&SignOfFirst, &SignOfFirst, &skewed())?, 1.0);
        Ok(())
    }

    #[test]
    fn balanced_fidelity_weights_the_minority_class_up() -> Result<()> {
        // class weights: 5/2 for the single class-0 row, 5/8 for class 1
        let score = balanced_fidelity(&AlwaysOne, &SignOfFirst, &skewed())?;
        assert_abs_diff_eq!(score, 0.5, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn local_fidelity_favours_rows_near_the_query_point() -> Result<()> {
        let data = skewed();
        let near_miss = local_fidelity(&AlwaysOne, &SignOfFirst, &data, array![-1.0].view())?;
        let near_hit = local_fidelity(&AlwaysOne, &SignOfFirst, &data, array![3.0].view())?;
        assert!(near_miss < 0.8 && near_hit > 0.8);
        let both = local_and_balanced_fidelity(&AlwaysOne, &SignOfFirst, &data, array![-1.0].view())?;
        assert!(both < near_miss);
        Ok(())
    }

    #[test]
    fn plain_equals_all_ones_weighting() -> Result<()> {
        let data = skewed();
        let same = agreement(&AlwaysOne, &SignOfFirst, &data)?;
        let via_weights = weighted_agreement(&same, &WeightVector::uniform(data.len()))?;
        assert_abs_diff_eq!(via_weights, fidelity(&AlwaysOne, &SignOfFirst, &data)?, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn missing_labels_make_balanced_equal_plain() -> Result<()> {
        let unlabelled = ReferenceDataset::new(skewed().features().clone());
        let (plain, quiet) = capture_warnings(|| fidelity(&AlwaysOne, &SignOfFirst, &unlabelled));
        let (balanced, logs) = capture_warnings(|| balanced_fidelity(&AlwaysOne, &SignOfFirst, &unlabelled));
        assert_abs_diff_eq!(plain?, balanced?);
        assert!(quiet.is_empty(), "{}", quiet);
        assert!(logs.contains("WARN"), "{}", logs);
        assert!(logs.contains("not using class balanced weighting"), "{}", logs);
        Ok(())
    }

    #[test]
    fn local_weighting_requires_a_query_point() {
        let rows = Array2::zeros((3, 2));
        let kernel = DistanceKernel::new();
        assert!(matches!(
            FidelityMetric::Local.weights(&rows, None, None, &kernel),
            Err(SurrogateError::InvalidArgument(_))
        ));
        let uniform = FidelityMetric::Plain.weights(&rows, None, None, &kernel).unwrap();
        assert_eq!(uniform.total(), 3.0);
        assert!(FidelityMetric::LocalAndBalanced.is_local() && FidelityMetric::LocalAndBalanced.is_balanced());
        assert!(!FidelityMetric::Plain.is_local() && !FidelityMetric::Plain.is_balanced());
    }

    #[test]
    fn undefined_scores_are_errors() {
        let empty = ReferenceDataset::new(Array2::zeros((0, 1)));
        assert!(matches!(
            fidelity(&AlwaysOne, &SignOfFirst, &empty),
            Err(SurrogateError::ArithmeticError(_))
        ));
        let zero = WeightVector::new(array![0.0, 0.0]).unwrap();
        assert!(matches!(
            weighted_agreement(&array![1.0, 0.0], &zero),
            Err(SurrogateError::ArithmeticError(_))
        ));
        assert!(matches!(
            FidelityEvaluator::new().score(FidelityMetric::Local, &AlwaysOne, &SignOfFirst, &skewed(), None),
            Err(SurrogateError::InvalidArgument(_))
        ));
    }

    #[test]
    fn metrics_parse_by_name() {
        for metric in FidelityMetric::ALL {
            assert_eq!(metric.name().parse::<FidelityMetric>().unwrap(), metric);
        }
        assert_eq!("local".parse::<FidelityMetric>().unwrap(), FidelityMetric::Local);
        assert!("accuracy".parse::<FidelityMetric>().is_err());
        let parsed: FidelityMetric = serde_json::from_str("\"local_and_balanced\"").unwrap();
        assert_eq!(parsed, FidelityMetric::LocalAndBalanced);
    }

    proptest! {
        #[test]
        fn scores_stay_in_unit_interval(
            rows in proptest::collection::vec(-5.0f64..5.0, 1..40),
            q in -5.0f64..5.0,
        ) {
            let n = rows.len();
            let data = ReferenceDataset::new(Array2::from_shape_vec((n, 1), rows).unwrap());
            for metric in FidelityMetric::ALL {
                let score = FidelityEvaluator::new()
                    .score(metric, &AlwaysOne, &SignOfFirst, &data, Some(array![q].view()))
                    .unwrap();
                prop_assert!((0.0..=1.0).contains(&score));
            }
        }
    }
}
