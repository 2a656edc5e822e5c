//! driver — block-coordinate fitting of a [`CorrelatedModel`].
//!
//! Purpose
//! -------
//! Alternate between the three parameter blocks of the mixed model until
//! the iteration budget runs out or the parameters stop moving:
//!
//! 1. fixed effects `beta`: L-BFGS on the penalized objective with `U`, `D`
//!    frozen;
//! 2. random effects `U`: L-BFGS with `beta`, `D` frozen;
//! 3. covariance `D`: closed-form update `D[k] = U[k]ᵀ U[k] / groups`.
//!
//! Key behaviors
//! -------------
//! - [`FixedEffectsBlock`] and [`RandomEffectsBlock`] adapt the model to
//!   [`BlockObjective`]; the frozen model is the objective's `Data`, and
//!   gradients come from finite differences in the block optimizer.
//! - Every block is committed through `update_params`, so `P` is refreshed
//!   after each block and a failed block leaves the state untouched.
//! - Per block, the relative change `‖new − old‖ / max(‖old‖, 1e-10)` is
//!   recorded (upper triangle only for `D`); the iteration error is their
//!   mean, `0` when no block is enabled.
//!
//! Invariants & assumptions
//! ------------------------
//! - With `D` frozen, a beta or U step never increases the objective, since
//!   the sub-minimizer returns its best state including the start.
//! - The objective is evaluated and reported after every iteration,
//!   including the one that triggers early stopping.
//! - Errors raised inside a sub-objective come back as the original
//!   [`ModelError`](crate::correlated::errors::ModelError).
use std::marker::PhantomData;

use log::Level;
use ndarray::{Array1, Array3, ArrayView3, s};

use crate::{
    correlated::{
        core::{
            family::OutcomeModel, likelihood::covariance_update, options::FitOptions, params::Beta,
        },
        errors::ModelResult,
        models::correlated::CorrelatedModel,
    },
    optimization::{
        block_optimizer::{BlockObjective, Cost, SolverOptions, Theta, minimize, validation::validate_theta},
        errors::{OptError, OptResult},
        numerical_stability::relative_change,
    },
};

/// Relative changes of one driver iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockErrors {
    pub beta: Option<f64>,
    pub u: Option<f64>,
    pub d: Option<f64>,
    /// Mean over the enabled blocks; `0` if none ran.
    pub total: f64,
}

impl BlockErrors {
    pub fn new(beta: Option<f64>, u: Option<f64>, d: Option<f64>) -> Self {
        let ran: Vec<f64> = [beta, u, d].into_iter().flatten().collect();
        let total = if ran.is_empty() { 0.0 } else { ran.iter().sum::<f64>() / ran.len() as f64 };
        Self { beta, u, d, total }
    }
}

/// Summary of a call to `optimize_params`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FitReport {
    /// Iterations actually run.
    pub iterations: usize,
    /// Whether `rel_tol` was reached. Always `false` without a tolerance.
    pub converged: bool,
    /// Penalized objective after each iteration.
    pub objective_trace: Vec<f64>,
    pub block_errors: Vec<BlockErrors>,
}

impl FitReport {
    pub fn final_objective(&self) -> Option<f64> {
        self.objective_trace.last().copied()
    }
}

/// Fixed-effect block: `theta` is every `beta[k][j]` concatenated in
/// `(k, j)` row-major order.
#[derive(Debug, Clone)]
pub struct FixedEffectsBlock<M> {
    template: Beta,
    len: usize,
    _outcome: PhantomData<fn() -> M>,
}

impl<M: OutcomeModel> FixedEffectsBlock<M> {
    pub fn new(template: &Beta) -> Self {
        let len = template.iter().map(|(_, cell)| cell.len()).sum();
        Self { template: template.clone(), len, _outcome: PhantomData }
    }

    pub fn flatten(beta: &Beta) -> Theta {
        beta.iter().flat_map(|(_, cell)| cell.iter().copied()).collect()
    }

    /// Inverse of [`FixedEffectsBlock::flatten`] for the template's layout.
    pub fn unflatten(&self, theta: &Theta) -> OptResult<Beta> {
        if theta.len() != self.len {
            return Err(OptError::ThetaLengthMismatch { expected: self.len, actual: theta.len() });
        }
        let mut start = 0;
        Ok(self.template.map(|_, cell| {
            let end = start + cell.len();
            let part = theta.slice(s![start..end]).to_owned();
            start = end;
            part
        }))
    }
}

impl<M: OutcomeModel> BlockObjective for FixedEffectsBlock<M> {
    type Data = CorrelatedModel<M>;

    fn value(&self, theta: &Theta, model: &CorrelatedModel<M>) -> OptResult<Cost> {
        let beta = self.unflatten(theta)?;
        Ok(model.neg_log_likelihood(Some(&beta), None, None)?)
    }

    fn check(&self, theta: &Theta, _model: &CorrelatedModel<M>) -> OptResult<()> {
        validate_theta(theta, self.len)
    }
}

/// Random-effect block: `theta` is `U` flattened in standard `(l, G, n)`
/// order.
#[derive(Debug, Clone, Copy)]
pub struct RandomEffectsBlock<M> {
    shape: (usize, usize, usize),
    _outcome: PhantomData<fn() -> M>,
}

impl<M: OutcomeModel> RandomEffectsBlock<M> {
    pub fn new(shape: (usize, usize, usize)) -> Self {
        Self { shape, _outcome: PhantomData }
    }

    fn len(&self) -> usize {
        self.shape.0 * self.shape.1 * self.shape.2
    }

    pub fn flatten(u: ArrayView3<f64>) -> Theta {
        u.iter().copied().collect()
    }

    pub fn unflatten(&self, theta: &Theta) -> OptResult<Array3<f64>> {
        Array3::from_shape_vec(self.shape, theta.to_vec())
            .map_err(|_| OptError::ThetaLengthMismatch { expected: self.len(), actual: theta.len() })
    }
}

impl<M: OutcomeModel> BlockObjective for RandomEffectsBlock<M> {
    type Data = CorrelatedModel<M>;

    fn value(&self, theta: &Theta, model: &CorrelatedModel<M>) -> OptResult<Cost> {
        let u = self.unflatten(theta)?;
        Ok(model.neg_log_likelihood(None, Some(u.view()), None)?)
    }

    fn check(&self, theta: &Theta, _model: &CorrelatedModel<M>) -> OptResult<()> {
        validate_theta(theta, self.len())
    }
}

/// Upper-triangular entries (diagonal included) of every `D[k]`, row-major.
pub fn upper_triangle(d: ArrayView3<f64>) -> Array1<f64> {
    let mut out = Vec::new();
    for d_k in d.outer_iter() {
        for (r, row) in d_k.outer_iter().enumerate() {
            out.extend(row.iter().skip(r).copied());
        }
    }
    Array1::from(out)
}

impl<M: OutcomeModel> CorrelatedModel<M> {
    /// Fit the enabled blocks by block-coordinate descent.
    ///
    /// Runs at most `opts.max_iters` iterations. When `opts.rel_tol` is set
    /// and an iteration's mean relative change is at or below it, the fit
    /// stops early and the report is marked converged.
    ///
    /// Errors
    /// ------
    /// Any model error raised while evaluating the objective (for example
    /// `NonFiniteParameter` or `NonFiniteLikelihood`) and
    /// `ModelError::Optimization` for solver failures. The state is left as
    /// it was after the last committed block.
    pub fn optimize_params(&mut self, opts: &FitOptions) -> ModelResult<FitReport> {
        self.notify(Level::Info, "Optimizing the parameters.");
        let mut report = FitReport::default();

        for iter in 0..opts.max_iters {
            self.notify(Level::Info, &format!("On iteration {}...", iter + 1));

            let beta_err = if opts.optimize_beta { Some(self.fixed_effects_step(&opts.beta_opts)?) } else { None };
            let u_err = if opts.optimize_u { Some(self.random_effects_step(&opts.u_opts)?) } else { None };
            let d_err = if opts.compute_d { Some(self.covariance_step()?) } else { None };
            let errors = BlockErrors::new(beta_err, u_err, d_err);
            for (name, err) in [("beta", errors.beta), ("U", errors.u), ("D", errors.d)] {
                if let Some(err) = err {
                    self.notify(Level::Debug, &format!("relative error for {name}: {err:.6e}"));
                }
            }
            self.notify(Level::Debug, &format!("total relative error: {:.6e}", errors.total));

            let objective = self.neg_log_likelihood(None, None, None)?;
            report.iterations = iter + 1;
            report.objective_trace.push(objective);
            report.block_errors.push(errors);

            if let Some(tol) = opts.rel_tol.filter(|&tol| errors.total <= tol) {
                self.notify(Level::Info, &format!("optimization converged with tolerance {tol:e}"));
                report.converged = true;
            }
            self.notify(Level::Info, &format!("objective function value {objective:8.2e}"));
            if report.converged {
                break;
            }
        }
        Ok(report)
    }

    fn fixed_effects_step(&mut self, solver: &SolverOptions) -> ModelResult<f64> {
        let block = FixedEffectsBlock::<M>::new(&self.beta);
        let theta0 = FixedEffectsBlock::<M>::flatten(&self.beta);
        let outcome = minimize(&block, theta0.clone(), &*self, solver)?;
        let beta = block.unflatten(&outcome.theta_hat)?;
        self.update_params(Some(beta), None, None, None)?;
        Ok(relative_change(&theta0, &outcome.theta_hat))
    }

    fn random_effects_step(&mut self, solver: &SolverOptions) -> ModelResult<f64> {
        let block = RandomEffectsBlock::<M>::new(self.u.dim());
        let theta0 = RandomEffectsBlock::<M>::flatten(self.u.view());
        let outcome = minimize(&block, theta0.clone(), &*self, solver)?;
        let u = block.unflatten(&outcome.theta_hat)?;
        self.update_params(None, Some(u), None, None)?;
        Ok(relative_change(&theta0, &outcome.theta_hat))
    }

    fn covariance_step(&mut self) -> ModelResult<f64> {
        let d = covariance_update(self.u.view());
        let err = relative_change(&upper_triangle(self.d.view()), &upper_triangle(d.view()));
        self.update_params(None, None, Some(d), None)?;
        Ok(err)
    }
}
