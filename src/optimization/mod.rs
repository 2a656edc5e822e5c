//! optimization — block minimizer, numerical helpers, and error surface.
//!
//! Purpose
//! -------
//! Provide the optimization layer used by the block-coordinate driver in
//! `correlated::models::driver`: an argmin-backed L-BFGS minimizer for
//! flattened parameter blocks, a few numerically careful primitives, and a
//! single optimizer error type.
//!
//! Key behaviors
//! -------------
//! - [`block_optimizer`]: minimize a scalar [`BlockObjective`](block_optimizer::BlockObjective)
//!   under a hard iteration cap, with finite-difference gradients.
//! - [`numerical_stability`]: symmetric pseudo-inverse, relative change,
//!   guarded inverse links.
//! - [`errors`]: [`OptError`](errors::OptError) / [`OptResult`](errors::OptResult).
//!
//! Conventions
//! -----------
//! - Parameter blocks are `ndarray::Array1<f64>` (`Theta`).
//! - This layer does no logging of its own; progress reporting lives in the
//!   driver's observer. The optional `obs_slog` feature is the only
//!   exception and prints argmin's own iteration trace.

pub mod block_optimizer;
pub mod errors;
pub mod numerical_stability;

pub mod prelude {
    pub use super::block_optimizer::prelude::*;
    pub use super::errors::{OptError, OptResult};
    pub use super::numerical_stability::prelude::*;
}
