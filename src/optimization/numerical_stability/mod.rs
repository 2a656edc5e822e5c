//! numerical_stability — small, numerically careful helpers.
//!
//! Purpose
//! -------
//! Host the few numerical primitives the mixed model relies on outside the
//! solver itself: the symmetric pseudo-inverse used by the random-effect
//! prior, the relative-change metric used by the block-coordinate driver,
//! and guarded inverse links that callers can reuse when implementing an
//! `OutcomeModel`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are finite; upstream validation in `correlated::core` rejects
//!   non-finite covariances before they reach [`symmetric_pinv`].
//! - Nothing here logs, allocates beyond its return value, or panics on
//!   finite input.
//!
//! Testing notes
//! -------------
//! - Unit tests in [`transformations`] cover full-rank and singular
//!   pseudo-inverses, the relative-change floor, and the saturation
//!   behavior of the inverse-link helpers.

pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::transformations::{
    CHANGE_FLOOR, EXP_CLAMP, PINV_RCOND, relative_change, safe_exp, safe_logistic, symmetric_pinv,
};

pub mod prelude {
    pub use super::transformations::{relative_change, safe_exp, safe_logistic, symmetric_pinv};
}
