//! block_optimizer::builders — L-BFGS solver construction helpers.
//!
//! Builders hide argmin's generic wiring and apply the tolerances and
//! memory size from [`SolverOptions`]. The starting point and the iteration
//! cap are applied by the runner ([`run_lbfgs`](super::run::run_lbfgs)),
//! which keeps these functions free of per-run state.
use argmin::solver::quasinewton::LBFGS;

use crate::optimization::{
    block_optimizer::{
        traits::SolverOptions,
        types::{
            Cost, DEFAULT_LBFGS_MEM, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente,
            MoreThuenteLS, Theta,
        },
    },
    errors::OptResult,
};

/// Construct L-BFGS with the Hager–Zhang line search.
///
/// # Errors
/// Tolerance rejections from argmin, converted into `OptError`.
pub fn build_optimizer_hager_zhang(opts: &SolverOptions) -> OptResult<LbfgsHagerZhang> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    configure_lbfgs(LbfgsHagerZhang::new(HagerZhangLS::new(), mem), opts)
}

/// Construct L-BFGS with the More–Thuente line search.
///
/// # Errors
/// Tolerance rejections from argmin, converted into `OptError`.
pub fn build_optimizer_more_thuente(opts: &SolverOptions) -> OptResult<LbfgsMoreThuente> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    configure_lbfgs(LbfgsMoreThuente::new(MoreThuenteLS::new(), mem), opts)
}

/// Apply the optional gradient and cost-change tolerances to an L-BFGS
/// solver, whatever its line search. Absent tolerances keep argmin's
/// defaults.
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &SolverOptions,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(g) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(c)?;
    }
    Ok(solver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::block_optimizer::traits::{LineSearcher, Tolerances};

    #[test]
    // Purpose
    // -------
    // Both builders succeed with default and explicit L-BFGS memory.
    fn builders_accept_default_and_explicit_memory() {
        let tols = Tolerances::new(Some(1e-6), Some(1e-10), Some(50)).expect("valid tolerances");
        let default_mem = SolverOptions::new(tols, LineSearcher::HagerZhang, false, None)
            .expect("valid options");
        let explicit_mem = SolverOptions::new(tols, LineSearcher::MoreThuente, false, Some(11))
            .expect("valid options");

        assert!(build_optimizer_hager_zhang(&default_mem).is_ok());
        assert!(build_optimizer_more_thuente(&explicit_mem).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // `configure_lbfgs` leaves the solver usable when only an iteration cap
    // is configured.
    fn configure_lbfgs_respects_absent_tolerances() {
        let raw = LBFGS::new(MoreThuenteLS::new(), DEFAULT_LBFGS_MEM);
        let tols = Tolerances::new(None, None, Some(20)).expect("valid tolerances");
        let opts = SolverOptions::new(tols, LineSearcher::MoreThuente, false, None)
            .expect("valid options");

        assert!(configure_lbfgs(raw, &opts).is_ok());
    }
}
