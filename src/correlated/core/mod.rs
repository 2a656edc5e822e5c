//! core — data, parameter engine, likelihood and group resolution.
//!
//! Purpose
//! -------
//! Collect the building blocks of the correlated mixed model: validated
//! inputs and their canonical design, the map from effects to the parameter
//! tensor, the penalized objective, group-index resolution for prediction,
//! and the collaborator traits (outcome model, splines, observer).
//!
//! Key behaviors
//! -------------
//! - [`data`]: [`ModelInputs`] → [`ModelData`] (validation + grouped sort).
//! - [`covariates`]: tri-state cells, intercepts, splines, normalization.
//! - [`params`]: [`compute_p`], the canonical contiguous-block broadcast.
//! - [`likelihood`]: data term, Gaussian prior penalty, covariance update.
//! - [`groups`]: stable ordering and [`resolve_groups`] for unseen groups.
//! - [`family`], [`splines`], [`observer`]: injected capabilities.
//!
//! Conventions
//! -----------
//! - `(k, j)` indexes `(distribution parameter, outcome)`; tensors are laid
//!   out `(l, m, n)` for parameters and `(l, groups, n)` for random effects.
//! - Nothing in this module logs; the model facade reports through its
//!   observer.

pub mod covariates;
pub mod data;
pub mod family;
pub mod grid;
pub mod groups;
pub mod likelihood;
pub mod observer;
pub mod options;
pub mod params;
pub mod splines;

pub use self::covariates::{CellLayout, CovariateCell, CovariateDesign, CovariateGrid};
pub use self::data::{ModelData, ModelInputs};
pub use self::family::OutcomeModel;
pub use self::grid::Grid;
pub use self::groups::{GroupIndex, GroupResolution, resolve_groups};
pub use self::likelihood::LikelihoodTerms;
pub use self::observer::{FitObserver, LogObserver, NullObserver};
pub use self::options::{FitOptions, ModelOptions};
pub use self::params::{Beta, compute_p};
pub use self::splines::{KnotPlacement, SplineBasis, SplineFactory, SplineInputs, SplineSpec};
