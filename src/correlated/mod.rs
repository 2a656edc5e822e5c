//! correlated — multi-outcome mixed-effects regression for correlated counts.
//!
//! Purpose
//! -------
//! Fit and predict a model in which every individual carries `n` outcomes,
//! each outcome's distribution has `l` parameters, and every parameter is
//! linked to covariates plus a group-level random effect:
//!
//! ```text
//! P[k, i, j] = offset[k, i] · g_k( X[k][j][i, :] · beta[k][j] + U[k, group(i), j] )
//! U[k, g, :] ~ N(0, D[k])
//! ```
//!
//! The outcome distribution (links `g_k`, per-observation negative
//! log-likelihood, optional mean function) is injected through
//! [`OutcomeModel`], so hurdle, zero-inflated or plain count families all
//! share the same engine.
//!
//! Key behaviors
//! -------------
//! - [`core`]: validated inputs, the covariate design (intercepts, splines,
//!   normalization), the parameter engine, the penalized objective and
//!   group resolution for new data.
//! - [`models`]: [`CorrelatedModel`] and the block-coordinate driver.
//! - [`errors`]: [`ModelError`] / [`ModelResult`], one variant per failure.
//!
//! Invariants & assumptions
//! ------------------------
//! - Individuals are stored sorted by group id (stable), so each group is a
//!   contiguous block and `U` is broadcast block-wise.
//! - `P` always reflects the current `(beta, U)` and offsets.
//! - Every failure is a typed error; nothing is silently coerced.
//!
//! Conventions
//! -----------
//! - `m` individuals, `n` outcomes, `l` parameters per outcome; tensors are
//!   `(l, m, n)` for `P` and `(l, groups, n)` for `U`.
//! - Progress is reported through a [`FitObserver`]; the default forwards
//!   to the `log` facade.

pub mod core;
pub mod errors;
pub mod models;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::core::{
    CovariateCell, CovariateGrid, FitObserver, FitOptions, Grid, LogObserver, ModelInputs,
    ModelOptions, NullObserver, OutcomeModel, SplineBasis, SplineFactory, SplineInputs, SplineSpec,
};
pub use self::errors::{ModelError, ModelResult};
pub use self::models::{CorrelatedModel, FitReport, PredictRequest};

pub mod prelude {
    pub use super::core::{
        CovariateCell, FitOptions, Grid, ModelInputs, ModelOptions, OutcomeModel,
    };
    pub use super::errors::{ModelError, ModelResult};
    pub use super::models::prelude::*;
}
