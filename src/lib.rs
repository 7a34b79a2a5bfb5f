// src/lib.rs

//! `surrogate_rs` builds local, interpretable explanations for opaque binary
//! classifiers and measures how faithfully they reproduce the classifier.
//!
//! An explainer samples a Gaussian neighbourhood around the query point,
//! labels it with the black box, and fits a weighted ridge regression to the
//! black box's class probabilities. Its coefficients are the explanation.
//! The fidelity metrics score any surrogate against any black box.
//!
//! ```no_run
//! use ndarray::array;
//! use surrogate_rs::{fidelity, BlackBoxModel, LocalSurrogateExplainer, ReferenceDataset, Result};
//!
//! fn explain<M: BlackBoxModel>(model: &M, data: &ReferenceDataset) -> Result<()> {
//!     let explainer = LocalSurrogateExplainer::builder(array![0.5, 0.5])
//!         .data(data)
//!         .samples(1000)
//!         .seed(42)
//!         .build(model)?;
//!     println!("{}", explainer.explanation());
//!     println!("fidelity: {:.3}", fidelity(&explainer, model, data)?);
//!     Ok(())
//! }
//! ```

pub mod algorithms;
pub mod core;
pub mod traits;
pub mod utils;

// Re-export key components for easier use by library consumers
pub use crate::algorithms::{
    balanced_fidelity, fidelity, local_and_balanced_fidelity, local_fidelity, DistanceKernel,
    ExplainerBuilder, ExplainerConfig, FidelityEvaluator, FidelityMetric, LocalSurrogateExplainer,
    SurrogateModel, WeightVector,
};
pub use crate::core::{
    Dataset, Explanation, Instance, Labels, Probabilities, ReferenceDataset, Result,
    SampledNeighborhood, SurrogateError,
};
pub use crate::traits::{BlackBoxModel, Surrogate};
