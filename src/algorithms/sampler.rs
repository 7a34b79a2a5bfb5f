// src/algorithms/sampler.rs
//! Gaussian neighbourhood sampling around a query point.

use crate::core::{Dataset, Probabilities, ReferenceDataset, Result, SampledNeighborhood, SurrogateError};
use crate::traits::BlackBoxModel;
use crate::utils::linalg::{covariance, psd_factor};
use ndarray::{Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use tracing::debug;

/// Where the sampling covariance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CovarianceSource {
    Explicit,
    ReferenceData,
    Identity,
}

/// Seeded generator when a seed is given, OS entropy otherwise.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Picks the sampling covariance: an explicit override wins, then the
/// empirical covariance of the reference features, then the identity.
pub fn resolve_covariance(
    n_features: usize,
    explicit: Option<&Array2<f64>>,
    reference: Option<&ReferenceDataset>,
) -> Result<(Array2<f64>, CovarianceSource)> {
    let (cov, source) = match (explicit, reference) {
        (Some(cov), _) => (cov.clone(), CovarianceSource::Explicit),
        (None, Some(data)) => (covariance(data.features())?, CovarianceSource::ReferenceData),
        (None, None) => (Array2::eye(n_features), CovarianceSource::Identity),
    };
    if cov.dim() != (n_features, n_features) {
        return Err(SurrogateError::InvalidArgument(format!(
            "sampling covariance is {}x{} but the query point has {} features",
            cov.nrows(),
            cov.ncols(),
            n_features
        )));
    }
    Ok((cov, source))
}

/// Draws `count` points from `N(query_point, covariance)` using `rng`.
///
/// Fails with `InvalidArgument` if `covariance` is not positive semi-definite.
pub fn sample_with_rng<R: Rng + ?Sized>(
    query_point: ArrayView1<f64>,
    covariance: &Array2<f64>,
    count: usize,
    rng: &mut R,
) -> Result<Dataset> {
    let d = query_point.len();
    if covariance.dim() != (d, d) {
        return Err(SurrogateError::IncompatibleDimensions(format!(
            "covariance is {}x{} but the query point has {} features",
            covariance.nrows(),
            covariance.ncols(),
            d
        )));
    }
    if count == 0 {
        return Err(SurrogateError::InvalidArgument(
            "sample count must be at least 1".to_string(),
        ));
    }
    let factor = psd_factor(covariance)?;
    let standard: Array2<f64> = Array2::from_shape_simple_fn((count, d), || StandardNormal.sample(rng));
    Ok(standard.dot(&factor.t()) + &query_point.insert_axis(Axis(0)))
}

/// Draws `count` points from `N(query_point, covariance)`; identical
/// arguments with the same `Some(seed)` give identical samples.
pub fn sample(
    query_point: ArrayView1<f64>,
    covariance: &Array2<f64>,
    count: usize,
    seed: Option<u64>,
) -> Result<Dataset> {
    let mut rng = rng_from_seed(seed);
    sample_with_rng(query_point, covariance, count, &mut rng)
}

/// Asks the black box for probabilities and checks they are binary.
pub(crate) fn query_probabilities<M: BlackBoxModel + ?Sized>(
    model: &M,
    features: &Dataset,
) -> Result<Probabilities> {
    let probabilities = model.predict_proba(features)?;
    if probabilities.ncols() != 2 {
        return Err(SurrogateError::PreconditionError(format!(
            "only binary classifiers are supported, black box returned {} probability columns",
            probabilities.ncols()
        )));
    }
    if probabilities.nrows() != features.nrows() {
        return Err(SurrogateError::ModelPredictionError(format!(
            "black box returned {} probability rows for {} samples",
            probabilities.nrows(),
            features.nrows()
        )));
    }
    Ok(probabilities)
}

/// Samples around `query_point` and labels every sample with the black box.
pub fn sample_neighborhood<M: BlackBoxModel + ?Sized, R: Rng + ?Sized>(
    model: &M,
    query_point: ArrayView1<f64>,
    covariance: &Array2<f64>,
    count: usize,
    rng: &mut R,
) -> Result<SampledNeighborhood> {
    let features = sample_with_rng(query_point, covariance, count, rng)?;
    let labels = model.predict(&features)?;
    let probabilities = query_probabilities(model, &features)?;
    let neighborhood = SampledNeighborhood::new(features, labels, probabilities)?;
    debug!(
        samples = neighborhood.len(),
        class_counts = ?neighborhood.class_counts(),
        "sampled local neighbourhood"
    );
    Ok(neighborhood)
}
