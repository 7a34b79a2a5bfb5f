pub mod fidelity;
pub mod local_surrogate;
pub mod ridge;
pub mod sampler;
pub mod weighting;

pub use fidelity::{
    balanced_fidelity, fidelity, local_and_balanced_fidelity, local_fidelity, weighted_agreement,
    FidelityEvaluator, FidelityMetric,
};
pub use local_surrogate::{ExplainerBuilder, ExplainerConfig, LocalSurrogateExplainer};
pub use ridge::{RidgeRegression, SurrogateModel};
pub use weighting::{DistanceKernel, WeightVector};
