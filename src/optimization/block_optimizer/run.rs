//! Executes an argmin solver on a block objective.
use crate::optimization::{
    block_optimizer::{
        BlockObjective, Grad, OptimOutcome, SolverOptions, Theta, adapter::ArgMinAdapter,
    },
    errors::OptResult,
};
#[cfg(feature = "obs_slog")]
use argmin::core::{CostFunction, Gradient, observers::ObserverMode};
use argmin::core::{Executor, IterState, Solver, State};
#[cfg(feature = "obs_slog")]
use argmin_math::ArgminL2Norm;

/// argmin state shared by every L-BFGS variant built in this module tree.
pub type BlockState = IterState<Theta, Grad, (), (), (), f64>;

/// Run `solver` from `theta0` under the iteration cap of `opts`.
///
/// The outcome carries argmin's best state, which includes the starting
/// point, so `theta_hat` never has a higher objective than `theta0`.
///
/// With the `obs_slog` feature and `opts.verbose`, the starting objective
/// is printed once and argmin's terminal logger is attached.
///
/// # Errors
/// - argmin runtime errors, including errors raised by the objective,
///   through `From<argmin::core::Error>`.
/// - Validation errors while building the outcome.
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &SolverOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: BlockObjective,
    S: Solver<ArgMinAdapter<'a, F>, BlockState> + 'static,
{
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        print_start(&theta0, &problem)?;
    }
    let cap = opts.tols.max_iter.map(|n| n as u64);
    #[allow(unused_mut)]
    let mut executor = Executor::new(problem, solver).configure(|state| {
        let state = state.param(theta0);
        match cap {
            Some(n) => state.max_iters(n),
            None => state,
        }
    });
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        executor = executor.add_observer(argmin_observer_slog::SlogLogger::term_noblock(), ObserverMode::Always);
    }

    let finished = executor.run()?;
    let mut state = finished.state().clone();
    let iterations = state.get_iter();
    let fn_evals = state.get_func_counts().clone();
    let status = state.get_termination_status().clone();
    let last_grad = state.take_gradient();
    let best_cost = state.get_best_cost();
    OptimOutcome::new(state.take_best_param(), best_cost, status, iterations, fn_evals, last_grad)
}

#[cfg(feature = "obs_slog")]
fn print_start<F: BlockObjective>(theta0: &Theta, problem: &ArgMinAdapter<'_, F>) -> OptResult<()> {
    let cost = problem.cost(theta0)?;
    match problem.gradient(theta0) {
        Ok(grad) => eprintln!("start: objective {cost:.6}, |grad| {:.6}", grad.l2_norm()),
        Err(_) => eprintln!("start: objective {cost:.6}"),
    }
    Ok(())
}
