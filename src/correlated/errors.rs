//! Errors for the correlated mixed model (input validation, numerical
//! divergence, usage mistakes, and optimizer failures).
//!
//! ## Conventions
//! - Indices are 0-based; `(param, outcome)` always means `(k, j)` with
//!   `k < l` and `j < n`.
//! - Every error is fatal for the call that produced it. Nothing in the
//!   crate coerces a non-finite value into a finite one.
//! - Failing to converge within `max_iters` is **not** an error; it is
//!   reported through `FitReport::converged`.
use thiserror::Error;

use crate::optimization::errors::OptError;

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Unified error type for the correlated model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    // ---- Configuration (construction time) ----
    #[error("dimension {name} must be positive")]
    NonPositiveDimension { name: &'static str },

    #[error("covariate count table must be {expected:?} (params × outcomes), found {found:?}")]
    DimensionShapeMismatch { expected: (usize, usize), found: (usize, usize) },

    #[error("covariate count for (param {param}, outcome {outcome}) must be positive after augmentation")]
    NonPositiveCovariateCount { param: usize, outcome: usize },

    #[error(
        "no covariates for (param {param}, outcome {outcome}) and intercept augmentation is off; \
         enable add_intercepts or mark the cell InterceptOnly"
    )]
    MissingCovariates { param: usize, outcome: usize },

    #[error("covariate grid must be {expected:?} (params × outcomes), found {found:?}")]
    CovariateGridMismatch { expected: (usize, usize), found: (usize, usize) },

    #[error(
        "covariates for (param {param}, outcome {outcome}) must be {expected:?}, found {found:?}"
    )]
    CovariateShapeMismatch {
        param: usize,
        outcome: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("observations must be {expected:?}, found {found:?}")]
    ObservationShapeMismatch { expected: (usize, usize), found: (usize, usize) },

    #[error("group ids must have length {expected}, found {found}")]
    GroupIdLengthMismatch { expected: usize, found: usize },

    #[error("offsets must hold {expected_params} vectors of length {expected_len}; entry {param} is invalid")]
    OffsetShapeMismatch { param: usize, expected_params: usize, expected_len: usize },

    #[error("weights must be {expected:?}, found {found:?}")]
    WeightShapeMismatch { expected: (usize, usize), found: (usize, usize) },

    #[error("outcome model declares {found} distribution parameters, expected {expected}")]
    LinkCountMismatch { expected: usize, found: usize },

    #[error("non-finite covariate {value} at (param {param}, outcome {outcome}, row {row}, col {col})")]
    NonFiniteCovariate { param: usize, outcome: usize, row: usize, col: usize, value: f64 },

    #[error("non-finite offset {value} for param {param} at row {row}")]
    NonFiniteOffset { param: usize, row: usize, value: f64 },

    #[error("non-finite weight {value} at ({row}, {col})")]
    NonFiniteWeight { row: usize, col: usize, value: f64 },

    #[error("negative weight {value} at ({row}, {col})")]
    NegativeWeight { row: usize, col: usize, value: f64 },

    #[error("spline specs must be {expected:?} (params × outcomes), found {found:?}")]
    SplineGridMismatch { expected: (usize, usize), found: (usize, usize) },

    #[error("spline basis for (param {param}, outcome {outcome}) produced {found} rows, expected {expected}")]
    SplineRowMismatch { param: usize, outcome: usize, expected: usize, found: usize },

    #[error("spline basis construction failed: {reason}")]
    SplineBasis { reason: String },

    #[error("invalid fit options: {reason}")]
    InvalidFitOptions { reason: &'static str },

    // ---- Parameter state ----
    #[error("beta for (param {param}, outcome {outcome}) must have length {expected}, found {found}")]
    CoefficientShapeMismatch { param: usize, outcome: usize, expected: usize, found: usize },

    #[error("random effects must be {expected:?}, found {found:?}")]
    RandomEffectShapeMismatch { expected: (usize, usize, usize), found: (usize, usize, usize) },

    #[error("covariance must be {expected:?}, found {found:?}")]
    CovarianceShapeMismatch { expected: (usize, usize, usize), found: (usize, usize, usize) },

    #[error("non-finite covariance entry {value} for param {param}")]
    NonFiniteCovariance { param: usize, value: f64 },

    #[error("parameter tensor must be {expected:?}, found {found:?}")]
    ParameterShapeMismatch { expected: (usize, usize, usize), found: (usize, usize, usize) },

    #[error("group sizes sum to {sum} over {groups} groups, expected {rows} rows and {u_groups} random-effect rows")]
    GroupPartitionMismatch { rows: usize, sum: usize, groups: usize, u_groups: usize },

    // ---- Numerical divergence (fit time) ----
    #[error(
        "non-finite parameter {value} at (param {param}, row {row}, outcome {outcome}); \
         check the link function or diverging effects"
    )]
    NonFiniteParameter { param: usize, row: usize, outcome: usize, value: f64 },

    #[error("negative log-likelihood is not finite: {value}")]
    NonFiniteLikelihood { value: f64 },

    #[error("objective returned shape {found:?}, expected {expected:?}")]
    ObjectiveShapeMismatch { expected: (usize, usize), found: (usize, usize) },

    // ---- Usage ----
    #[error(
        "mean outcome is not available for this outcome model; implement \
         OutcomeModel::mean_outcome to enable prediction"
    )]
    MeanOutcomeUnavailable,

    #[error(
        "new covariates for (param {param}, outcome {outcome}) must have {expected} columns \
         after augmentation, found {found}"
    )]
    NewCovariateShapeMismatch { param: usize, outcome: usize, expected: usize, found: usize },

    #[error("new data for (param {param}, outcome {outcome}) has {found} rows, expected {expected}")]
    NewRowCountMismatch { param: usize, outcome: usize, expected: usize, found: usize },

    #[error("spline variables must be supplied for (param {param}, outcome {outcome}) at prediction")]
    MissingSplineVariables { param: usize, outcome: usize },

    // ---- Optimizer ----
    #[error("optimization failed: {0}")]
    Optimization(OptError),
}

impl From<OptError> for ModelError {
    /// Unwraps model errors that travelled through the solver boundary.
    fn from(err: OptError) -> Self {
        match err {
            OptError::Model(inner) => *inner,
            other => ModelError::Optimization(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // A model error boxed by the optimizer layer comes back as itself.
    fn opt_error_unwraps_model_error() {
        let original = ModelError::NonFiniteParameter { param: 0, row: 1, outcome: 0, value: 1.0 };
        let through_solver = OptError::from(original.clone());

        assert_eq!(ModelError::from(through_solver), original);
        assert_eq!(
            ModelError::from(OptError::MissingThetaHat),
            ModelError::Optimization(OptError::MissingThetaHat)
        );
    }

    #[test]
    fn messages_name_the_offending_cell() {
        let err = ModelError::MissingCovariates { param: 1, outcome: 0 };
        assert!(err.to_string().contains("param 1, outcome 0"));
    }
}
