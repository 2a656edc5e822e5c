//! Public API surface for block minimization.
//!
//! - [`BlockObjective`]: trait implemented by each optimizable block.
//! - [`SolverOptions`] and [`Tolerances`]: configuration for one sub-minimization.
//! - [`LineSearcher`]: choice of line search used by L-BFGS.
//! - [`OptimOutcome`]: normalized result returned by [`minimize`](super::minimize).
//!
//! Convention: the objective is minimized directly. Analytic gradients, when
//! supplied, are gradients of that same objective.
use crate::optimization::{
    block_optimizer::{
        Cost, FnEvalMap, Grad, Theta,
        validation::{validate_theta_hat, validate_value, verify_tol_cost, verify_tol_grad},
    },
    errors::{OptError, OptResult},
};
use argmin::core::TerminationStatus;
use argmin_math::ArgminL2Norm;
use std::str::FromStr;

/// Scalar objective over a flattened parameter block.
///
/// - `type Data`: state held fixed while this block is optimized (for the
///   mixed model this is the model itself, with the other blocks frozen).
///
/// Required:
/// - `value(&Theta, &Data) -> OptResult<Cost>`: evaluate the objective.
/// - `check(&Theta, &Data) -> OptResult<()>`: called once before the solver
///   starts, to reject malformed starting points.
///
/// Optional:
/// - `grad(&Theta, &Data) -> OptResult<Grad>`: analytic gradient. The
///   default reports [`OptError::GradientNotImplemented`], which switches the
///   adapter to finite differences.
pub trait BlockObjective {
    type Data;

    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<Cost>;
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()>;

    fn grad(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Choice of line search used inside the L-BFGS solver.
///
/// Parses case-insensitively from `"MoreThuente"` / `"HagerZhang"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Configuration of one block sub-minimization.
///
/// Fields:
/// - `tols`: numerical tolerances and the hard iteration cap.
/// - `line_searcher`: line search used by L-BFGS.
/// - `verbose`: attach argmin's slog observer (only with the `obs_slog`
///   feature).
/// - `lbfgs_mem`: L-BFGS history size; `None` uses [`DEFAULT_LBFGS_MEM`](super::DEFAULT_LBFGS_MEM).
///
/// Default: `tol_grad = 1e-8`, no cost tolerance, `max_iter = 1000`,
/// More–Thuente, quiet.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub tols: Tolerances,
    pub line_searcher: LineSearcher,
    pub verbose: bool,
    pub lbfgs_mem: Option<usize>,
}

impl SolverOptions {
    /// Build solver options; numeric validation of tolerances happens in
    /// [`Tolerances::new`].
    ///
    /// # Errors
    /// [`OptError::InvalidLBFGSMem`] if `lbfgs_mem == Some(0)`.
    pub fn new(
        tols: Tolerances, line_searcher: LineSearcher, verbose: bool, lbfgs_mem: Option<usize>,
    ) -> OptResult<Self> {
        if let Some(mem) = lbfgs_mem {
            if mem == 0 {
                return Err(OptError::InvalidLBFGSMem {
                    mem,
                    reason: "L-BFGS memory must be greater than zero.",
                });
            }
        }
        Ok(Self { tols, line_searcher, verbose, lbfgs_mem })
    }

    /// Default options with a different iteration cap.
    ///
    /// # Errors
    /// [`OptError::InvalidMaxIter`] if `max_iter == 0`.
    pub fn with_max_iter(max_iter: usize) -> OptResult<Self> {
        let tols = Tolerances::new(Some(DEFAULT_TOL_GRAD), None, Some(max_iter))?;
        Self::new(tols, LineSearcher::MoreThuente, false, None)
    }
}

/// Gradient-norm tolerance used by [`SolverOptions::default`].
pub const DEFAULT_TOL_GRAD: f64 = 1e-8;

/// Iteration cap used by [`SolverOptions::default`].
pub const DEFAULT_BLOCK_MAX_ITER: usize = 1000;

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tols: Tolerances {
                tol_grad: Some(DEFAULT_TOL_GRAD),
                tol_cost: None,
                max_iter: Some(DEFAULT_BLOCK_MAX_ITER),
            },
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            lbfgs_mem: None,
        }
    }
}

/// Numerical tolerances and iteration limits for one sub-minimization.
///
/// At least one field must be provided (see [`Tolerances::new`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// Construct validated tolerances.
    ///
    /// # Errors
    /// - [`OptError::NoTolerancesProvided`] if all three are `None`.
    /// - [`OptError::InvalidTolGrad`] / [`OptError::InvalidTolCost`] for
    ///   non-finite or non-positive tolerances.
    /// - [`OptError::InvalidMaxIter`] if `max_iter == Some(0)`.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_cost(tol_cost)?;
        verify_tol_grad(tol_grad)?;
        if let Some(max_iter) = max_iter {
            if max_iter == 0 {
                return Err(OptError::InvalidMaxIter {
                    max_iter,
                    reason: "Maximum iterations must be greater than zero.",
                });
            }
        }
        Ok(Self { tol_grad, tol_cost, max_iter })
    }
}

/// Result of one sub-minimization.
///
/// - `theta_hat`: best block vector found (never worse than the start,
///   since argmin tracks the best state including the initial one).
/// - `value`: objective at `theta_hat`.
/// - `converged`: the solver reported a terminating status.
/// - `status`: human-readable termination status.
/// - `iterations`, `fn_evals`: argmin counters.
/// - `grad_norm`: norm of the last available gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    pub value: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
}

impl OptimOutcome {
    /// Build a validated outcome from raw solver state.
    ///
    /// # Errors
    /// Propagates validation errors for `theta_hat` or `value`.
    pub fn new(
        theta_hat_opt: Option<Theta>, value: f64, termination: TerminationStatus, iterations: u64,
        fn_evals: FnEvalMap, grad: Option<Grad>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat_opt)?;
        validate_value(value)?;
        let (converged, status) = match termination {
            TerminationStatus::NotTerminated => (false, "Not terminated".to_string()),
            other => (true, format!("{other:?}")),
        };
        let grad_norm = grad.map(|g| g.l2_norm());
        Ok(Self {
            theta_hat,
            value,
            converged,
            status,
            iterations: iterations as usize,
            fn_evals,
            grad_norm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argmin::core::TerminationReason;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // `Tolerances::new` enforces the "at least one" and positivity rules.
    fn tolerances_validate_inputs() {
        assert_eq!(Tolerances::new(None, None, None), Err(OptError::NoTolerancesProvided));
        assert!(matches!(
            Tolerances::new(None, None, Some(0)),
            Err(OptError::InvalidMaxIter { max_iter: 0, .. })
        ));
        assert!(matches!(
            Tolerances::new(Some(-1.0), None, None),
            Err(OptError::InvalidTolGrad { .. })
        ));
        let tols = Tolerances::new(None, Some(1e-9), Some(5)).expect("valid tolerances");
        assert_eq!(tols.max_iter, Some(5));
    }

    #[test]
    fn solver_options_reject_zero_memory() {
        let tols = Tolerances::new(Some(1e-6), None, Some(10)).expect("valid tolerances");
        assert!(matches!(
            SolverOptions::new(tols, LineSearcher::HagerZhang, false, Some(0)),
            Err(OptError::InvalidLBFGSMem { mem: 0, .. })
        ));
        let opts = SolverOptions::with_max_iter(25).expect("valid cap");
        assert_eq!(opts.tols.max_iter, Some(25));
        assert_eq!(SolverOptions::default().tols.max_iter, Some(DEFAULT_BLOCK_MAX_ITER));
    }

    #[test]
    fn line_searcher_parses_case_insensitively() {
        assert_eq!("morethuente".parse::<LineSearcher>(), Ok(LineSearcher::MoreThuente));
        assert_eq!("HAGERZHANG".parse::<LineSearcher>(), Ok(LineSearcher::HagerZhang));
        assert!(matches!(
            "bisection".parse::<LineSearcher>(),
            Err(OptError::InvalidLineSearch { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Termination status maps onto `(converged, status)` and the gradient
    // norm is derived from the last gradient.
    fn optim_outcome_maps_termination() {
        let outcome = OptimOutcome::new(
            Some(array![1.0, 2.0]),
            0.5,
            TerminationStatus::Terminated(TerminationReason::SolverConverged),
            4,
            FnEvalMap::new(),
            Some(array![3.0, 4.0]),
        )
        .expect("valid outcome");
        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 4);
        assert_eq!(outcome.grad_norm, Some(5.0));

        let pending = OptimOutcome::new(
            Some(array![1.0]),
            0.0,
            TerminationStatus::NotTerminated,
            0,
            FnEvalMap::new(),
            None,
        )
        .expect("valid outcome");
        assert!(!pending.converged);
        assert_eq!(pending.status, "Not terminated");
    }
}
