//! Finite-difference gradients for block objectives.
//!
//! Purpose
//! -------
//! Block objectives in this crate are black boxes (the link functions and
//! likelihood come from the caller), so gradients are approximated
//! numerically. The `finitediff` crate does the differencing; this module
//! adds error capture and validation around it.
//!
//! Conventions
//! -----------
//! - The differenced closure must return `f64`, so any evaluation error is
//!   parked in a `RefCell` and the closure returns `NaN`. Callers inspect
//!   the cell after differencing.
//! - Central differences are preferred; forward differences are the
//!   fallback when a central evaluation fails or yields a non-finite
//!   gradient (e.g. a step crossed into a region where the link overflows).
use crate::optimization::{
    block_optimizer::{Grad, Theta, validation::validate_grad},
    errors::OptResult,
};
use argmin::core::Error;
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// Central-difference gradient with a forward-difference fallback.
///
/// Returns the central gradient when every evaluation succeeded and the
/// result validates; otherwise retries once with [`run_fd_diff`].
///
/// # Errors
/// - The first error captured from `func` during the forward pass.
/// - `GradientDimMismatch` / `InvalidGradient` from [`validate_grad`].
pub fn robust_gradient<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> OptResult<Grad> {
    closure_err.replace(None);
    let central = theta.central_diff(func);
    if closure_err.borrow().is_none() && validate_grad(&central, theta.len()).is_ok() {
        return Ok(central);
    }
    run_fd_diff(theta, func, closure_err)
}

/// Forward-difference gradient with error capture and validation.
///
/// Clears `closure_err`, runs `forward_diff`, then surfaces any captured
/// error before validating the gradient.
///
/// # Errors
/// - The error captured from `func`, converted via `From<Error> for OptError`.
/// - `GradientDimMismatch` / `InvalidGradient` from [`validate_grad`].
pub fn run_fd_diff<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> OptResult<Grad> {
    closure_err.replace(None);
    let fd_grad = theta.forward_diff(func);
    if let Some(err) = closure_err.take() {
        return Err(err.into());
    }
    validate_grad(&fd_grad, theta.len())?;
    Ok(fd_grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::errors::OptError;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Central and forward gradients on a smooth quadratic.
    // - Fallback from central to forward differencing.
    // - Propagation of errors captured inside the objective closure.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // The central gradient of a quadratic matches the analytic one.
    //
    // Given
    // -----
    // - `f(θ) = Σ (θ_i − 1)²` at `θ = (0, 3)`.
    //
    // Expect
    // ------
    // - gradient ≈ `(−2, 4)`.
    fn robust_gradient_matches_quadratic() {
        let theta: Theta = array![0.0, 3.0];
        let closure_err: RefCell<Option<Error>> = RefCell::new(None);
        let f = |x: &Theta| x.mapv(|v| (v - 1.0).powi(2)).sum();

        let grad = robust_gradient(&theta, &f, &closure_err).expect("smooth objective");

        assert_abs_diff_eq!(grad[0], -2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(grad[1], 4.0, epsilon = 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // A failure only on the backward side of a central difference is
    // recovered by the forward fallback.
    //
    // Given
    // -----
    // - An objective that errors for `θ < 0`, evaluated at `θ = 0`.
    //
    // Expect
    // ------
    // - A finite forward-difference gradient ≈ 1.
    fn robust_gradient_falls_back_to_forward() {
        let theta: Theta = array![0.0];
        let closure_err: RefCell<Option<Error>> = RefCell::new(None);
        let f = |x: &Theta| {
            if x[0] < 0.0 {
                closure_err.replace(Some(OptError::NonFiniteCost { value: f64::NAN }.into()));
                f64::NAN
            } else {
                x[0]
            }
        };

        let grad = robust_gradient(&theta, &f, &closure_err).expect("forward side is valid");

        assert_abs_diff_eq!(grad[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // An error raised on every evaluation is surfaced, not swallowed.
    fn run_fd_diff_propagates_closure_error() {
        let theta: Theta = array![1.0];
        let closure_err: RefCell<Option<Error>> = RefCell::new(None);
        let f = |_: &Theta| {
            closure_err.replace(Some(OptError::MissingThetaHat.into()));
            f64::NAN
        };

        let err = run_fd_diff(&theta, &f, &closure_err).expect_err("closure always fails");

        assert_eq!(err, OptError::MissingThetaHat);
    }
}
