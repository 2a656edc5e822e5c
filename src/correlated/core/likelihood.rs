//! likelihood — penalized negative log-likelihood of the mixed model.
//!
//! The objective minimized by the block-coordinate driver is
//!
//! ```text
//! J(beta, U, D) = mean_i Σ_j W[i, j] · f(Y, P)[i, j]
//!               + Σ_k ½ · mean_g  U[k, g, :] · pinv(D[k]) · U[k, g, :]ᵀ
//! ```
//!
//! The first term is the data fit, the second the Gaussian prior on the
//! random effects. `pinv` is the symmetric pseudo-inverse from
//! `optimization::numerical_stability`, so singular covariances are fine.
use ndarray::{Array3, ArrayView2, ArrayView3, Axis};

use crate::{
    correlated::errors::{ModelError, ModelResult},
    optimization::numerical_stability::symmetric_pinv,
};

/// The two parts of the penalized objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LikelihoodTerms {
    pub data: f64,
    pub penalty: f64,
}

impl LikelihoodTerms {
    pub fn total(&self) -> f64 {
        self.data + self.penalty
    }
}

/// Mean over individuals of the weighted row sums of `nll`.
///
/// # Errors
/// - `ObjectiveShapeMismatch` if `nll` and `weights` differ in shape.
/// - `NonFiniteLikelihood` if the result is NaN or infinite.
pub fn data_term(nll: ArrayView2<f64>, weights: ArrayView2<f64>) -> ModelResult<f64> {
    if nll.dim() != weights.dim() {
        return Err(ModelError::ObjectiveShapeMismatch { expected: weights.dim(), found: nll.dim() });
    }
    let weighted = &nll * &weights;
    let value = weighted.sum_axis(Axis(1)).mean().unwrap_or(0.0);
    if !value.is_finite() {
        return Err(ModelError::NonFiniteLikelihood { value });
    }
    Ok(value)
}

/// Gaussian prior penalty `Σ_k ½ · mean_g uᵀ pinv(D[k]) u`.
///
/// # Errors
/// - `CovarianceShapeMismatch` unless `d` is `(l, n, n)` for `u` of shape
///   `(l, groups, n)`.
/// - `NonFiniteCovariance` for any non-finite entry of `d`.
pub fn prior_penalty(u: ArrayView3<f64>, d: ArrayView3<f64>) -> ModelResult<f64> {
    let (l, _, n) = u.dim();
    check_covariance(d, l, n)?;
    let mut penalty = 0.0;
    for (u_k, d_k) in u.outer_iter().zip(d.outer_iter()) {
        let precision = symmetric_pinv(d_k);
        let quad = (&u_k.dot(&precision) * &u_k).sum_axis(Axis(1));
        penalty += 0.5 * quad.mean().unwrap_or(0.0);
    }
    Ok(penalty)
}

/// Shape and finiteness check for a covariance stack.
pub fn check_covariance(d: ArrayView3<f64>, l: usize, n: usize) -> ModelResult<()> {
    if d.dim() != (l, n, n) {
        return Err(ModelError::CovarianceShapeMismatch { expected: (l, n, n), found: d.dim() });
    }
    if let Some(((param, _, _), &value)) = d.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(ModelError::NonFiniteCovariance { param, value });
    }
    Ok(())
}

/// Closed-form covariance update `D[k] = U[k]ᵀ U[k] / groups`.
///
/// After this update [`prior_penalty`] evaluates to `0.5 · Σ_k rank(D[k])`,
/// whatever the scale of `U`. The step therefore re-prices the penalty
/// rather than descending on it, and the penalized objective can rise
/// across an iteration that runs it.
pub fn covariance_update(u: ArrayView3<f64>) -> Array3<f64> {
    let (l, groups, n) = u.dim();
    let mut d = Array3::<f64>::zeros((l, n, n));
    let scale = 1.0 / groups.max(1) as f64;
    for (mut d_k, u_k) in d.outer_iter_mut().zip(u.outer_iter()) {
        d_k.assign(&(u_k.t().dot(&u_k) * scale));
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    #[test]
    // Purpose
    // -------
    // The data term averages weighted row sums.
    //
    // Given
    // -----
    // - nll = [[1, 2], [3, 4]], weights = [[1, 0], [1, 1]].
    //
    // Expect
    // ------
    // - (1 + 7) / 2 = 4.
    fn data_term_weights_row_sums() {
        let nll = array![[1.0, 2.0], [3.0, 4.0]];
        let w = array![[1.0, 0.0], [1.0, 1.0]];

        assert_abs_diff_eq!(data_term(nll.view(), w.view()).expect("finite"), 4.0);
    }

    #[test]
    fn data_term_rejects_non_finite_and_bad_shapes() {
        let nll = array![[f64::INFINITY]];
        let w = array![[1.0]];
        assert!(matches!(
            data_term(nll.view(), w.view()),
            Err(ModelError::NonFiniteLikelihood { .. })
        ));

        let w2 = Array2::<f64>::ones((2, 1));
        assert!(matches!(
            data_term(nll.view(), w2.view()),
            Err(ModelError::ObjectiveShapeMismatch { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // The penalty is the averaged Gaussian quadratic form, and a singular
    // covariance is handled through the pseudo-inverse.
    //
    // Given
    // -----
    // - l = 1, n = 2, U = [[1, 0], [0, 2]], D = diag(1, 4).
    // - Second case: D = diag(1, 0) ignores the second coordinate.
    //
    // Expect
    // ------
    // - ½ · mean(1, 1) = 0.5.
    // - ½ · mean(1, 0) = 0.25.
    fn prior_penalty_uses_pseudo_inverse() {
        let u = array![[[1.0, 0.0], [0.0, 2.0]]];
        let d = array![[[1.0, 0.0], [0.0, 4.0]]];
        assert_abs_diff_eq!(prior_penalty(u.view(), d.view()).expect("valid"), 0.5, epsilon = 1e-12);

        let singular = array![[[1.0, 0.0], [0.0, 0.0]]];
        assert_abs_diff_eq!(
            prior_penalty(u.view(), singular.view()).expect("valid"),
            0.25,
            epsilon = 1e-12
        );
    }

    #[test]
    fn covariance_checks_shape_and_finiteness() {
        let u = Array3::<f64>::zeros((1, 3, 2));
        let wrong = Array3::<f64>::zeros((1, 3, 3));
        assert!(matches!(
            prior_penalty(u.view(), wrong.view()),
            Err(ModelError::CovarianceShapeMismatch { .. })
        ));

        let nan = array![[[f64::NAN, 0.0], [0.0, 1.0]]];
        assert!(matches!(
            prior_penalty(u.view(), nan.view()),
            Err(ModelError::NonFiniteCovariance { param: 0, .. })
        ));
    }

    #[test]
    fn covariance_update_is_scaled_gram_matrix() {
        let u = array![[[1.0, 2.0], [3.0, 0.0]]];

        let d = covariance_update(u.view());

        assert_eq!(d, array![[[5.0, 1.0], [1.0, 2.0]]]);
    }

    #[test]
    // Purpose
    // -------
    // Right after the closed-form update the prior penalty depends only on
    // the rank of the covariance.
    //
    // Given
    // -----
    // - Three groups, two outcomes, full-rank `U`, and the same `U` scaled
    //   by 10.
    //
    // Expect
    // ------
    // - Penalty 0.5 · rank = 1.0 in both cases.
    fn penalty_after_covariance_update_is_half_rank() {
        let u = array![[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]];
        let scaled = &u * 10.0;

        let small = prior_penalty(u.view(), covariance_update(u.view()).view()).expect("valid");
        let large =
            prior_penalty(scaled.view(), covariance_update(scaled.view()).view()).expect("valid");

        assert_abs_diff_eq!(small, 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(large, 1.0, epsilon = 1e-10);
    }
}
