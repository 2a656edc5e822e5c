//! Adapter that exposes a [`BlockObjective`] as an `argmin` problem.
//!
//! The objective is handed to argmin as-is (no sign flip). When the block
//! does not provide an analytic gradient, the cost closure is finite
//! differenced with error capture.
use std::cell::RefCell;

use crate::optimization::{
    block_optimizer::{
        finite_diff::robust_gradient,
        traits::BlockObjective,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
    errors::OptError,
};
use argmin::core::{CostFunction, Error, Gradient};

/// Bridges a [`BlockObjective`] to argmin's `CostFunction` and `Gradient`.
pub struct ArgMinAdapter<'a, F: BlockObjective> {
    pub f: &'a F,
    pub data: &'a F::Data,
}

impl<'a, F: BlockObjective> ArgMinAdapter<'a, F> {
    /// Construct a new adapter over a block objective and the frozen state.
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data }
    }
}

impl<'a, F: BlockObjective> CostFunction for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Output = Cost;

    /// Evaluate the block objective; non-finite values are rejected with
    /// [`OptError::NonFiniteCost`].
    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        let output = self.f.value(theta, self.data)?;
        if !output.is_finite() {
            return Err((OptError::NonFiniteCost { value: output }).into());
        }
        Ok(output)
    }
}

impl<'a, F: BlockObjective> Gradient for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    /// Analytic gradient if the block provides one, else a finite-difference
    /// gradient of [`CostFunction::cost`].
    ///
    /// # Errors
    /// - Errors from `grad` other than `GradientNotImplemented`.
    /// - Errors captured while differencing the cost.
    /// - Dimension / finiteness validation failures.
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        match self.f.grad(theta, self.data) {
            Ok(g) => {
                validate_grad(&g, theta.len())?;
                Ok(g)
            }
            Err(OptError::GradientNotImplemented) => {
                let closure_err: RefCell<Option<Error>> = RefCell::new(None);
                let cost_func = |theta: &Theta| -> f64 {
                    match self.cost(theta) {
                        Ok(val) => val,
                        Err(e) => {
                            let mut slot = closure_err.borrow_mut();
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                            f64::NAN
                        }
                    }
                };
                Ok(robust_gradient(theta, &cost_func, &closure_err)?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::errors::OptResult;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    struct Shifted;

    impl BlockObjective for Shifted {
        type Data = f64;

        fn value(&self, theta: &Theta, shift: &f64) -> OptResult<Cost> {
            Ok(theta.mapv(|v| (v - shift).powi(2)).sum())
        }

        fn check(&self, _theta: &Theta, _shift: &f64) -> OptResult<()> {
            Ok(())
        }
    }

    struct Exploding;

    impl BlockObjective for Exploding {
        type Data = ();

        fn value(&self, _theta: &Theta, _: &()) -> OptResult<Cost> {
            Ok(f64::INFINITY)
        }

        fn check(&self, _theta: &Theta, _: &()) -> OptResult<()> {
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // Without an analytic gradient the adapter differences the cost.
    //
    // Given
    // -----
    // - `c(θ) = (θ − 2)²` at `θ = 0`.
    //
    // Expect
    // ------
    // - cost 4, gradient ≈ −4.
    fn adapter_uses_finite_differences() {
        let shift = 2.0;
        let adapter = ArgMinAdapter::new(&Shifted, &shift);
        let theta = array![0.0];

        let cost = adapter.cost(&theta).expect("finite cost");
        let grad = adapter.gradient(&theta).expect("finite gradient");

        assert_abs_diff_eq!(cost, 4.0);
        assert_abs_diff_eq!(grad[0], -4.0, epsilon = 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // A non-finite objective is rejected with `NonFiniteCost`.
    fn adapter_rejects_non_finite_cost() {
        let adapter = ArgMinAdapter::new(&Exploding, &());

        let err = adapter.cost(&array![0.0]).expect_err("infinite cost must fail");

        assert!(matches!(OptError::from(err), OptError::NonFiniteCost { .. }));
    }
}
