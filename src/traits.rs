// src/traits.rs

use crate::core::{Dataset, Labels, Probabilities, Result};

/// The opaque binary classifier being explained.
///
/// Implementors are only ever queried, never trained or mutated.
pub trait BlackBoxModel {
    /// Class label (0 or 1) for every row of `instances`.
    fn predict(&self, instances: &Dataset) -> Result<Labels>;

    /// Class probabilities for every row of `instances`: one column per
    /// class, each row summing to 1. Only two-column output is supported.
    fn predict_proba(&self, instances: &Dataset) -> Result<Probabilities>;

    /// Number of features the model expects per row.
    fn num_features(&self) -> usize;
}

/// Anything whose label predictions can be compared with a black box's,
/// typically a fitted local surrogate.
pub trait Surrogate {
    fn predict(&self, instances: &Dataset) -> Result<Labels>;
}

impl<M: BlackBoxModel + ?Sized> BlackBoxModel for &M {
    fn predict(&self, instances: &Dataset) -> Result<Labels> {
        (**self).predict(instances)
    }

    fn predict_proba(&self, instances: &Dataset) -> Result<Probabilities> {
        (**self).predict_proba(instances)
    }

    fn num_features(&self) -> usize {
        (**self).num_features()
    }
}

impl<S: Surrogate + ?Sized> Surrogate for &S {
    fn predict(&self, instances: &Dataset) -> Result<Labels> {
        (**self).predict(instances)
    }
}
