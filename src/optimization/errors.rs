//! Error surface for the block optimizer.
//!
//! [`OptError`] covers solver configuration, gradient/outcome validation and
//! argmin backend failures. Model errors raised while a block objective is
//! being evaluated cross the argmin boundary boxed inside
//! [`OptError::Model`] so the caller can recover the original
//! [`ModelError`] once the solver returns.
use argmin::core::{ArgminError, Error};
use thiserror::Error;

use crate::correlated::errors::ModelError;

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptError {
    // ---- Gradient ----
    /// Signals that finite differences should be used.
    #[error("Analytic gradient not implemented")]
    GradientNotImplemented,

    #[error("Gradient dimension mismatch: expected {expected}, found {found}")]
    GradientDimMismatch { expected: usize, found: usize },

    #[error("Invalid gradient at index {index}: {value}: {reason}")]
    InvalidGradient { index: usize, value: f64, reason: &'static str },

    // ---- SolverOptions ----
    #[error("Invalid gradient tolerance {tol}: {reason}")]
    InvalidTolGrad { tol: f64, reason: &'static str },

    #[error("Invalid cost change tolerance {tol}: {reason}")]
    InvalidTolCost { tol: f64, reason: &'static str },

    #[error("Invalid maximum iterations {max_iter}: {reason}")]
    InvalidMaxIter { max_iter: usize, reason: &'static str },

    #[error("No tolerances provided")]
    NoTolerancesProvided,

    #[error("Invalid line searcher '{name}': {reason}")]
    InvalidLineSearch { name: String, reason: &'static str },

    #[error("Invalid L-BFGS memory {mem}: {reason}")]
    InvalidLBFGSMem { mem: usize, reason: &'static str },

    // ---- Cost function ----
    #[error("Non-finite cost value: {value}")]
    NonFiniteCost { value: f64 },

    #[error("Parameter vector length mismatch: expected {expected}, actual {actual}")]
    ThetaLengthMismatch { expected: usize, actual: usize },

    #[error("Invalid parameter vector entry at index {index}: {value}, must be finite")]
    InvalidThetaInput { index: usize, value: f64 },

    // ---- Optimizer outcome ----
    #[error("Invalid estimated parameter at index {index}: {value}: {reason}")]
    InvalidThetaHat { index: usize, value: f64, reason: &'static str },

    #[error("Missing estimated parameters (theta hat)")]
    MissingThetaHat,

    // ---- Argmin ----
    #[error("Invalid parameter: {text}")]
    InvalidParameter { text: String },
    #[error("Not implemented: {text}")]
    NotImplemented { text: String },
    #[error("Not initialized: {text}")]
    NotInitialized { text: String },
    #[error("Condition violated: {text}")]
    ConditionViolated { text: String },
    #[error("Checkpoint not found: {text}")]
    CheckPointNotFound { text: String },
    #[error("Potential bug: {text}")]
    PotentialBug { text: String },
    #[error("Impossible error: {text}")]
    ImpossibleError { text: String },
    /// Any other error surfaced by the argmin executor or a line search.
    #[error("Backend error: {text}")]
    BackendError { text: String },

    // ---- Model ----
    /// A model error raised inside a block objective.
    #[error(transparent)]
    Model(Box<ModelError>),

    // ---- Fallback ----
    #[error("Unknown error")]
    UnknownError,
}

impl From<ModelError> for OptError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Optimization(inner) => inner,
            other => OptError::Model(Box::new(other)),
        }
    }
}

impl From<Error> for OptError {
    fn from(original_err: Error) -> Self {
        let original_err = match original_err.downcast::<OptError>() {
            Ok(opt_err) => return opt_err,
            Err(err) => err,
        };
        match original_err.downcast::<ArgminError>() {
            Ok(argmin_err) => match argmin_err {
                ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => OptError::NotImplemented { text },
                ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                ArgminError::CheckpointNotFound { text } => OptError::CheckPointNotFound { text },
                ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                ArgminError::ImpossibleError { text } => OptError::ImpossibleError { text },
                _ => OptError::UnknownError,
            },
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // An `OptError` that was converted into an argmin error inside a cost
    // function must come back out unchanged.
    //
    // Given
    // -----
    // - `OptError::NonFiniteCost` boxed into `argmin::core::Error`.
    //
    // Expect
    // ------
    // - `OptError::from` recovers the same variant and payload.
    fn argmin_error_round_trips_opt_error() {
        let err: Error = OptError::NonFiniteCost { value: f64::INFINITY }.into();

        let recovered = OptError::from(err);

        assert_eq!(recovered, OptError::NonFiniteCost { value: f64::INFINITY });
    }

    #[test]
    // Purpose
    // -------
    // Native argmin errors are mapped onto their mirror variants.
    //
    // Given
    // -----
    // - `ArgminError::ConditionViolated`.
    //
    // Expect
    // ------
    // - `OptError::ConditionViolated` with the original text.
    fn argmin_native_error_is_mapped() {
        let err: Error = ArgminError::ConditionViolated { text: "descent".to_string() }.into();

        assert_eq!(
            OptError::from(err),
            OptError::ConditionViolated { text: "descent".to_string() }
        );
    }

    #[test]
    // Purpose
    // -------
    // Model errors are boxed on the way in, and an `Optimization` wrapper is
    // unwrapped rather than nested.
    fn model_errors_box_and_unwrap() {
        let boxed = OptError::from(ModelError::NonFiniteLikelihood { value: f64::NAN });
        assert!(matches!(boxed, OptError::Model(_)));

        let flat = OptError::from(ModelError::Optimization(OptError::MissingThetaHat));
        assert_eq!(flat, OptError::MissingThetaHat);
    }
}
