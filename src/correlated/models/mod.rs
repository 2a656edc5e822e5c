//! models — the correlated mixed model and its block-coordinate driver.
//!
//! Purpose
//! -------
//! Host the user-facing model type [`CorrelatedModel`] and the fitting loop
//! that moves it. This layer sits on top of `correlated::core`, wiring the
//! validated data, the parameter engine and the penalized objective to the
//! argmin-backed block optimizer.
//!
//! Key behaviors
//! -------------
//! - [`correlated`]: construction, state updates, objective evaluation,
//!   prediction for new rows ([`PredictRequest`]) and the text summary.
//! - [`driver`]: `optimize_params`, the fixed/random-effect block
//!   objectives and the closed-form covariance update, reported through
//!   [`FitReport`].
//!
//! Downstream usage
//! ----------------
//! - Build [`ModelInputs`](crate::correlated::core::ModelInputs), pick an
//!   outcome model implementing
//!   [`OutcomeModel`](crate::correlated::core::OutcomeModel), then
//!   `CorrelatedModel::new(outcome, &inputs, options)`.
//! - Fit with `optimize_params(&FitOptions)`; predict with
//!   `predict(&PredictRequest)`; inspect with `summarize`.
//!
//! Testing notes
//! -------------
//! - Unit tests here use a unit-variance Gaussian outcome so expected
//!   values are closed form. The full pipeline (grouping, unseen groups,
//!   prediction round trip) is covered by `tests/integration_correlated_pipeline.rs`.

pub mod correlated;
pub mod driver;

pub use self::correlated::{CorrelatedModel, PredictRequest};
pub use self::driver::{BlockErrors, FitReport, FixedEffectsBlock, RandomEffectsBlock};

pub mod prelude {
    pub use super::{CorrelatedModel, FitReport, PredictRequest};
}
