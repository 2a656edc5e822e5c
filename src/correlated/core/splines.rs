//! Spline collaborator interface.
//!
//! Purpose
//! -------
//! The mixed model can append B-spline design columns to any
//! `(parameter, outcome)` cell. Basis construction itself lives outside the
//! crate; this module only fixes the seam: a [`SplineSpec`] describes one
//! smooth term, a [`SplineFactory`] turns it into a reusable
//! [`SplineBasis`], and the basis evaluates design matrices for the training
//! variable at fit time and for new values at prediction time.
//!
//! Conventions
//! -----------
//! - The first column of every design matrix is dropped by the caller
//!   (`correlated::core::covariates`), since the cell's intercept plays that
//!   role.
//! - Bases are stored behind `Arc` so a fitted model stays `Clone`.
use std::{fmt, sync::Arc};

use ndarray::{Array1, Array2, ArrayView1};

use crate::correlated::{core::grid::Grid, errors::ModelResult};

/// Where knots are placed along the spline variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnotPlacement {
    /// Knots at empirical quantiles of the variable.
    Frequency,
    /// Knots evenly spaced over the variable's range.
    Domain,
}

/// One smooth term on a single variable.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineSpec {
    /// Training values of the spline variable (length `m`, input row order).
    pub variable: Array1<f64>,
    pub knots: KnotPlacement,
    pub knots_num: usize,
    pub degree: usize,
    /// Linear tail left of the first interior knot.
    pub l_linear: bool,
    /// Linear tail right of the last interior knot.
    pub r_linear: bool,
}

/// A fitted spline basis that can be evaluated on new values.
pub trait SplineBasis: fmt::Debug + Send + Sync {
    /// Full design matrix for `x` (one row per value, first column included).
    fn design_matrix(&self, x: ArrayView1<f64>) -> ModelResult<Array2<f64>>;
}

/// Builds a [`SplineBasis`] from a [`SplineSpec`].
pub trait SplineFactory: fmt::Debug + Send + Sync {
    fn build(&self, spec: &SplineSpec) -> ModelResult<Arc<dyn SplineBasis>>;
}

/// Spline terms for every cell plus the factory that builds their bases.
///
/// `specs[(k, j)]` may be empty; cells without specs get no spline columns.
#[derive(Debug, Clone)]
pub struct SplineInputs {
    pub specs: Grid<Vec<SplineSpec>>,
    pub factory: Arc<dyn SplineFactory>,
}

impl SplineInputs {
    pub fn new(specs: Grid<Vec<SplineSpec>>, factory: Arc<dyn SplineFactory>) -> Self {
        Self { specs, factory }
    }
}
