//! correlated_count — mixed-effects regression for correlated count outcomes.
//!
//! Purpose
//! -------
//! Serve as the crate root. The crate fits multi-outcome mixed-effects
//! models where each individual has several count outcomes, every outcome
//! follows a user-supplied distribution with `l` parameters, and outcomes
//! are tied together by group-level random effects with a learned
//! covariance.
//!
//! Key behaviors
//! -------------
//! - [`correlated`]: data validation, covariate design, parameter engine,
//!   penalized likelihood, block-coordinate driver, prediction and summary.
//! - [`optimization`]: the argmin-backed L-BFGS block minimizer and the
//!   numerical helpers it shares with the model.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work is `f64` on `ndarray` arrays.
//! - Errors are typed ([`correlated::ModelError`],
//!   [`optimization::errors::OptError`]); the crate does not panic on bad
//!   user data.
//! - Logging goes through the `log` facade; the binary chooses a backend.
//!
//! Downstream usage
//! ----------------
//! ```ignore
//! use correlated_count::correlated::prelude::*;
//!
//! let model = CorrelatedModel::new(my_outcome, &inputs, ModelOptions::default())?;
//! let report = model.optimize_params(&FitOptions::default())?;
//! ```
//! See `demos/hurdle_poisson.rs` for a complete hurdle-Poisson example.

pub mod correlated;
pub mod optimization;
