//! block_optimizer — argmin-powered minimizer for flattened parameter blocks.
//!
//! Purpose
//! -------
//! Provide the black-box sub-minimizer used by the block-coordinate driver.
//! A block (fixed effects, or random effects) implements
//! [`BlockObjective`]; [`minimize`] runs L-BFGS with a configurable line
//! search under a hard iteration cap and returns an [`OptimOutcome`].
//!
//! Key behaviors
//! -------------
//! - [`adapter::ArgMinAdapter`] exposes a block objective as an argmin
//!   `CostFunction` + `Gradient`.
//! - Gradients fall back to finite differences ([`finite_diff`]) whenever a
//!   block does not supply an analytic one; there is no automatic
//!   differentiation.
//! - Solver configuration ([`SolverOptions`], [`Tolerances`]) is validated on
//!   construction ([`validation`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - The objective is minimized directly; no sign conventions are applied.
//! - Objective values must be finite; a non-finite value aborts the run with
//!   [`OptError::NonFiniteCost`](crate::optimization::errors::OptError::NonFiniteCost)
//!   or with whatever model error the block raised.
//! - The returned `theta_hat` is argmin's best state, which includes the
//!   starting point, so a sub-minimization never makes its block worse.
//!
//! Testing notes
//! -------------
//! - Unit tests in submodules cover validation, builders, the adapter's
//!   finite-difference path, and `minimize` on a convex toy objective.
//! - The mixed-model driver exercises the full path in integration tests.

pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::minimize;
pub use self::traits::{BlockObjective, LineSearcher, OptimOutcome, SolverOptions, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Theta};

pub mod prelude {
    pub use super::api::minimize;
    pub use super::traits::{BlockObjective, LineSearcher, OptimOutcome, SolverOptions, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
