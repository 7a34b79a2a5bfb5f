// src/core/errors.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurrogateError {
    /// Bad caller input: non-PSD covariance, missing query point, bad config.
    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),
    /// The operation is not defined for this input (e.g. more than two classes).
    #[error("Precondition Error: {0}")]
    PreconditionError(String),
    /// Empty datasets, zero total weight and other NaN-producing situations.
    #[error("Arithmetic Error: {0}")]
    ArithmeticError(String),
    #[error("Incompatible Dimensions: {0}")]
    IncompatibleDimensions(String),
    #[error("Model Prediction Error: {0}")]
    ModelPredictionError(String),
    #[error("Ndarray Error: {0}")]
    NdarrayError(#[from] ndarray::ShapeError),
}

// Convenience type alias for Result
pub type Result<T> = std::result::Result<T, SurrogateError>;
