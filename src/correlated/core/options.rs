//! Options — construction-time and fit-time configuration.
//!
//! Purpose
//! -------
//! Gather the knobs of the correlated model in two small, validated carriers
//! so call sites pass explicit configuration instead of loose flags:
//! [`ModelOptions`] controls how covariates are canonicalized when the model
//! is built, and [`FitOptions`] controls the block-coordinate driver.
//!
//! Key behaviors
//! -------------
//! - [`ModelOptions`] is a plain data carrier; every combination is valid.
//! - [`FitOptions::new`] rejects a non-finite or negative `rel_tol` and a
//!   zero `max_iters`. Per-block solver options are validated by their own
//!   constructors in `optimization::block_optimizer`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Disabling every block is allowed; the driver then only reports the
//!   objective once per iteration.
//! - `rel_tol = None` means "always run `max_iters` iterations".
//!
//! Testing notes
//! -------------
//! - Unit tests cover the defaults and each rejection path of
//!   [`FitOptions::new`].
use crate::{
    correlated::errors::{ModelError, ModelResult},
    optimization::block_optimizer::SolverOptions,
};

/// Covariate canonicalization switches used at construction.
///
/// Fields
/// ------
/// - `add_intercepts`: prepend a constant-1 column to every cell. Cells
///   declared `Unused` become intercept-only; without this flag they are a
///   construction error.
/// - `normalize_x`: center and scale non-intercept columns by the training
///   column mean and population standard deviation. When off, the stored
///   statistics are mean 0 / std 1.
///
/// Default: `add_intercepts = false`, `normalize_x = true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOptions {
    pub add_intercepts: bool,
    pub normalize_x: bool,
}

impl ModelOptions {
    pub fn new(add_intercepts: bool, normalize_x: bool) -> Self {
        Self { add_intercepts, normalize_x }
    }
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self { add_intercepts: false, normalize_x: true }
    }
}

/// Default number of outer block-coordinate iterations.
pub const DEFAULT_MAX_ITERS: usize = 10;

/// Configuration of `CorrelatedModel::optimize_params`.
///
/// Fields
/// ------
/// - `max_iters`: outer iterations (each runs the enabled blocks once).
/// - `optimize_beta` / `optimize_u` / `compute_d`: block toggles, run in
///   that order.
/// - `rel_tol`: stop early once the mean relative change of the enabled
///   blocks is at or below this value.
/// - `beta_opts` / `u_opts`: solver settings of the fixed-effect and
///   random-effect sub-minimizations; `tols.max_iter` is the per-block cap.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub max_iters: usize,
    pub optimize_beta: bool,
    pub optimize_u: bool,
    pub compute_d: bool,
    pub rel_tol: Option<f64>,
    pub beta_opts: SolverOptions,
    pub u_opts: SolverOptions,
}

impl FitOptions {
    /// Construct validated fit options.
    ///
    /// Errors
    /// ------
    /// - `ModelError::InvalidFitOptions` if `max_iters == 0` or `rel_tol` is
    ///   negative or non-finite.
    pub fn new(
        max_iters: usize, optimize_beta: bool, optimize_u: bool, compute_d: bool,
        rel_tol: Option<f64>, beta_opts: SolverOptions, u_opts: SolverOptions,
    ) -> ModelResult<Self> {
        if max_iters == 0 {
            return Err(ModelError::InvalidFitOptions {
                reason: "max_iters must be greater than zero",
            });
        }
        if let Some(tol) = rel_tol {
            if !tol.is_finite() || tol < 0.0 {
                return Err(ModelError::InvalidFitOptions {
                    reason: "rel_tol must be finite and non-negative",
                });
            }
        }
        Ok(Self { max_iters, optimize_beta, optimize_u, compute_d, rel_tol, beta_opts, u_opts })
    }

    /// Default options with only the listed blocks enabled.
    pub fn blocks(optimize_beta: bool, optimize_u: bool, compute_d: bool) -> Self {
        Self { optimize_beta, optimize_u, compute_d, ..Self::default() }
    }

    /// Number of enabled blocks.
    pub fn enabled_blocks(&self) -> usize {
        usize::from(self.optimize_beta) + usize::from(self.optimize_u) + usize::from(self.compute_d)
    }
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iters: DEFAULT_MAX_ITERS,
            optimize_beta: true,
            optimize_u: true,
            compute_d: true,
            rel_tol: None,
            beta_opts: SolverOptions::default(),
            u_opts: SolverOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let model = ModelOptions::default();
        assert!(!model.add_intercepts);
        assert!(model.normalize_x);

        let fit = FitOptions::default();
        assert_eq!(fit.max_iters, 10);
        assert_eq!(fit.enabled_blocks(), 3);
        assert_eq!(fit.rel_tol, None);
        assert_eq!(fit.beta_opts.tols.max_iter, Some(1000));
    }

    #[test]
    // Purpose
    // -------
    // Invalid outer settings are rejected with `InvalidFitOptions`.
    //
    // Given
    // -----
    // - `max_iters = 0`, `rel_tol = -1`, `rel_tol = NaN`.
    //
    // Expect
    // ------
    // - Each call fails; a valid `rel_tol = 0` is accepted.
    fn fit_options_reject_invalid_values() {
        let s = SolverOptions::default;
        assert!(matches!(
            FitOptions::new(0, true, true, true, None, s(), s()),
            Err(ModelError::InvalidFitOptions { .. })
        ));
        assert!(matches!(
            FitOptions::new(5, true, true, true, Some(-1.0), s(), s()),
            Err(ModelError::InvalidFitOptions { .. })
        ));
        assert!(matches!(
            FitOptions::new(5, true, true, true, Some(f64::NAN), s(), s()),
            Err(ModelError::InvalidFitOptions { .. })
        ));
        let ok = FitOptions::new(5, false, true, false, Some(0.0), s(), s()).expect("valid options");
        assert_eq!(ok.enabled_blocks(), 1);
    }

    #[test]
    fn blocks_helper_only_toggles_blocks() {
        let fit = FitOptions::blocks(true, false, false);
        assert!(fit.optimize_beta && !fit.optimize_u && !fit.compute_d);
        assert_eq!(fit.max_iters, DEFAULT_MAX_ITERS);
    }
}
