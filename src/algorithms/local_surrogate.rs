// src/algorithms/local_surrogate.rs
//! Local linear surrogate explanations without access to training data:
//! sample around the query point, ask the black box for probabilities, and
//! fit a weighted ridge regression to them.

use crate::algorithms::ridge::{RidgeRegression, SurrogateModel, DEFAULT_ALPHA};
use crate::algorithms::sampler::{
    query_probabilities, resolve_covariance, rng_from_seed, sample_neighborhood, CovarianceSource,
};
use crate::algorithms::weighting::{
    assign_class_weights, class_balanced_weights, class_weights, DistanceKernel, WeightVector,
};
use crate::core::{
    Dataset, Explanation, Instance, Labels, ReferenceDataset, Result, SampledNeighborhood,
    SurrogateError,
};
use crate::traits::{BlackBoxModel, Surrogate};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Options recognised by the explainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerConfig {
    /// Number of neighbourhood samples to draw.
    pub samples: usize,
    /// Weight samples by the class imbalance of the reference dataset.
    pub class_weight_data: bool,
    /// Weight samples by the class imbalance of the neighbourhood itself.
    pub class_weight_sampled: bool,
    /// Weight samples by closeness to the query point.
    pub weight_locally: bool,
    /// Oversample the minority class of the neighbourhood before training.
    pub rebalance_sampled_data: bool,
    /// Seed for every random draw. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Distance-kernel width; `None` uses `0.75 * sqrt(n_features)`.
    pub kernel_width: Option<f64>,
    /// Ridge regularisation strength.
    pub alpha: f64,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        ExplainerConfig {
            samples: 10_000,
            class_weight_data: false,
            class_weight_sampled: false,
            weight_locally: true,
            rebalance_sampled_data: false,
            seed: None,
            kernel_width: None,
            alpha: DEFAULT_ALPHA,
        }
    }
}

impl ExplainerConfig {
    /// The distance kernel these options describe.
    pub fn kernel(&self) -> Result<DistanceKernel> {
        match self.kernel_width {
            Some(width) => DistanceKernel::with_width(width),
            None => Ok(DistanceKernel::new()),
        }
    }
}

/// A fitted surrogate and the weights it was fitted with.
#[derive(Debug, Clone)]
pub struct TrainedSurrogate {
    pub model: SurrogateModel,
    pub weights: WeightVector,
}

/// Fits the surrogate on `neighborhood` (already rebalanced if requested).
///
/// Probabilities are re-queried from the black box; weights start uniform and
/// are multiplied by each enabled weighting in turn.
pub fn train_surrogate<M: BlackBoxModel + ?Sized>(
    model: &M,
    neighborhood: &SampledNeighborhood,
    reference: Option<&ReferenceDataset>,
    query_point: ArrayView1<f64>,
    config: &ExplainerConfig,
) -> Result<TrainedSurrogate> {
    let features = neighborhood.features();
    let labels = neighborhood.labels().view();
    let probabilities = query_probabilities(model, features)?;

    let mut weights = WeightVector::uniform(neighborhood.len());
    if config.weight_locally {
        weights = weights.combine(&config.kernel()?.weights(query_point, features)?)?;
    }
    if config.class_weight_data {
        let data_weights = match reference.and_then(|r| r.labels()) {
            Some(reference_labels) => {
                assign_class_weights(class_weights(reference_labels.view())?, labels)?
            }
            None if reference.is_none() => {
                warn!("no reference dataset given: not using class balanced weighting");
                WeightVector::uniform(neighborhood.len())
            }
            None => {
                warn!("reference dataset has no labels: not using class balanced weighting");
                WeightVector::uniform(neighborhood.len())
            }
        };
        weights = weights.combine(&data_weights)?;
    }
    if config.class_weight_sampled {
        weights = weights.combine(&class_balanced_weights(Some(labels), neighborhood.len())?)?;
    }
    debug!(total_weight = weights.total(), "built surrogate sample weights");

    let model = RidgeRegression::new(config.alpha)?.fit(features, &probabilities, &weights)?;
    Ok(TrainedSurrogate { model, weights })
}

/// Collects the query point, optional reference data and options, then
/// samples and trains in one step. Nothing is observable until both succeed.
#[derive(Debug, Clone)]
pub struct ExplainerBuilder<'a> {
    query_point: Instance,
    data: Option<&'a ReferenceDataset>,
    sampling_cov: Option<Array2<f64>>,
    config: ExplainerConfig,
}

impl<'a> ExplainerBuilder<'a> {
    pub fn new(query_point: Instance) -> Self {
        ExplainerBuilder {
            query_point,
            data: None,
            sampling_cov: None,
            config: ExplainerConfig::default(),
        }
    }

    /// Reference data for covariance estimation and class proportions.
    pub fn data(mut self, data: &'a ReferenceDataset) -> Self {
        self.data = Some(data);
        self
    }

    /// Overrides the sampling covariance.
    pub fn sampling_cov(mut self, cov: Array2<f64>) -> Self {
        self.sampling_cov = Some(cov);
        self
    }

    pub fn config(mut self, config: ExplainerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn samples(mut self, samples: usize) -> Self {
        self.config.samples = samples;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn weight_locally(mut self, on: bool) -> Self {
        self.config.weight_locally = on;
        self
    }

    pub fn class_weight_data(mut self, on: bool) -> Self {
        self.config.class_weight_data = on;
        self
    }

    pub fn class_weight_sampled(mut self, on: bool) -> Self {
        self.config.class_weight_sampled = on;
        self
    }

    pub fn rebalance_sampled_data(mut self, on: bool) -> Self {
        self.config.rebalance_sampled_data = on;
        self
    }

    fn validate<M: BlackBoxModel + ?Sized>(&self, model: &M) -> Result<()> {
        let d = self.query_point.len();
        if d == 0 {
            return Err(SurrogateError::InvalidArgument(
                "query point must have at least one feature".to_string(),
            ));
        }
        if self.query_point.iter().any(|v| !v.is_finite()) {
            return Err(SurrogateError::InvalidArgument(
                "query point must be finite".to_string(),
            ));
        }
        if model.num_features() != d {
            return Err(SurrogateError::IncompatibleDimensions(format!(
                "query point has {} features, but model expects {}",
                d,
                model.num_features()
            )));
        }
        if let Some(data) = self.data {
            if data.num_features() != d {
                return Err(SurrogateError::IncompatibleDimensions(format!(
                    "reference dataset has {} features, but query point has {}",
                    data.num_features(),
                    d
                )));
            }
        }
        if self.config.samples == 0 {
            return Err(SurrogateError::InvalidArgument(
                "samples must be at least 1".to_string(),
            ));
        }
        self.config.kernel()?;
        RidgeRegression::new(self.config.alpha)?;
        Ok(())
    }

    /// Samples the neighbourhood, labels it with `model` and fits the surrogate.
    pub fn build<M: BlackBoxModel + ?Sized>(self, model: &M) -> Result<LocalSurrogateExplainer> {
        self.validate(model)?;
        let mut rng = rng_from_seed(self.config.seed);

        let (covariance, covariance_source) = resolve_covariance(
            self.query_point.len(),
            self.sampling_cov.as_ref(),
            self.data,
        )?;
        debug!(source = ?covariance_source, samples = self.config.samples, "sampling neighbourhood");
        let neighborhood = sample_neighborhood(
            model,
            self.query_point.view(),
            &covariance,
            self.config.samples,
            &mut rng,
        )?;

        let rebalanced = if self.config.rebalance_sampled_data {
            Some(neighborhood.rebalanced(&mut rng))
        } else {
            None
        };
        let trained = train_surrogate(
            model,
            rebalanced.as_ref().unwrap_or(&neighborhood),
            self.data,
            self.query_point.view(),
            &self.config,
        )?;

        Ok(LocalSurrogateExplainer {
            query_point: self.query_point,
            covariance_source,
            neighborhood,
            rebalanced,
            trained,
            config: self.config,
        })
    }
}

/// A fitted local surrogate for one query point.
#[derive(Debug, Clone)]
pub struct LocalSurrogateExplainer {
    query_point: Instance,
    covariance_source: CovarianceSource,
    neighborhood: SampledNeighborhood,
    rebalanced: Option<SampledNeighborhood>,
    trained: TrainedSurrogate,
    config: ExplainerConfig,
}

impl LocalSurrogateExplainer {
    pub fn builder<'a>(query_point: Instance) -> ExplainerBuilder<'a> {
        ExplainerBuilder::new(query_point)
    }

    /// Feature importances for class 1 (class 0 is their negation).
    pub fn explanation(&self) -> Explanation {
        let model = &self.trained.model;
        Explanation {
            importances: model.coefficients().row(1).to_owned(),
            intercept: model.intercepts()[1],
            query_point: self.query_point.clone(),
        }
    }

    /// Raw surrogate output per class. Not a calibrated probability: values
    /// can fall outside [0, 1].
    pub fn predict_proba(&self, instances: &Dataset) -> Result<Array2<f64>> {
        self.trained.model.predict(instances)
    }

    /// Class labels, thresholding the class-1 output at 0.5.
    pub fn predict(&self, instances: &Dataset) -> Result<Labels> {
        let raw = self.predict_proba(instances)?;
        Ok(raw.column(1).mapv(|p| usize::from(p >= 0.5)))
    }

    pub fn query_point(&self) -> &Instance {
        &self.query_point
    }

    pub fn covariance_source(&self) -> CovarianceSource {
        self.covariance_source
    }

    /// The neighbourhood as sampled.
    pub fn neighborhood(&self) -> &SampledNeighborhood {
        &self.neighborhood
    }

    /// The rows the surrogate was trained on: the rebalanced copy when
    /// rebalancing was requested, the sampled neighbourhood otherwise.
    pub fn training_neighborhood(&self) -> &SampledNeighborhood {
        self.rebalanced.as_ref().unwrap_or(&self.neighborhood)
    }

    pub fn training_weights(&self) -> &WeightVector {
        &self.trained.weights
    }

    pub fn surrogate(&self) -> &SurrogateModel {
        &self.trained.model
    }

    pub fn config(&self) -> &ExplainerConfig {
        &self.config
    }
}

impl Surrogate for LocalSurrogateExplainer {
    fn predict(&self, instances: &Dataset) -> Result<Labels> {
        LocalSurrogateExplainer::predict(self, instances)
    }
}
