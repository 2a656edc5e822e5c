//! Numerical stability utilities.
//!
//! # Provided items
//! - [`PINV_RCOND`]: relative eigenvalue cutoff for pseudo-inverses.
//! - [`CHANGE_FLOOR`]: denominator floor for relative-change metrics.
//! - [`symmetric_pinv`]: Moore–Penrose pseudo-inverse of a symmetric matrix.
//! - [`relative_change`]: normalized distance between two parameter snapshots.
//! - [`safe_logistic`], [`safe_exp`]: overflow-guarded inverse links for
//!   callers building an `OutcomeModel`.
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2};

/// Relative cutoff for [`symmetric_pinv`].
///
/// Eigenvalues with `|λ| ≤ PINV_RCOND · max|λ|` are treated as zero, which
/// matches the usual SVD-based pseudo-inverse convention.
pub const PINV_RCOND: f64 = 1e-15;

/// Floor applied to `‖old‖` in [`relative_change`].
pub const CHANGE_FLOOR: f64 = 1e-10;

/// Upper clamp used by [`safe_exp`]; `exp(709.0)` is the largest finite value.
pub const EXP_CLAMP: f64 = 709.0;

/// Moore–Penrose pseudo-inverse of a symmetric matrix.
///
/// The input is symmetrized as `(A + Aᵀ)/2`, decomposed with nalgebra's
/// symmetric eigensolver, and rebuilt as `Σ_{|λ_k| > cutoff} q_k q_kᵀ / λ_k`.
/// Singular and all-zero matrices are fine: the zero matrix maps to zero.
///
/// The caller must ensure every entry is finite.
pub fn symmetric_pinv(matrix: ArrayView2<f64>) -> Array2<f64> {
    let n = matrix.nrows();
    let mut dense = DMatrix::<f64>::zeros(n, n);
    for j in 0..n {
        for i in j..n {
            let value = 0.5 * (matrix[[i, j]] + matrix[[j, i]]);
            dense[(i, j)] = value;
            dense[(j, i)] = value;
        }
    }
    let eigen = dense.symmetric_eigen();
    let q = eigen.eigenvectors;
    let max_abs = eigen.eigenvalues.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let cutoff = PINV_RCOND * max_abs;

    let mut pinv = Array2::<f64>::zeros((n, n));
    for (k, &lambda) in eigen.eigenvalues.iter().enumerate() {
        if lambda.abs() <= cutoff {
            continue;
        }
        for i in 0..n {
            for j in 0..n {
                pinv[[i, j]] += q[(i, k)] * q[(j, k)] / lambda;
            }
        }
    }
    pinv
}

/// Relative change `‖new − old‖₂ / max(‖old‖₂, CHANGE_FLOOR)`.
///
/// Both vectors must have the same length. Two all-zero snapshots give 0.
pub fn relative_change(old: &Array1<f64>, new: &Array1<f64>) -> f64 {
    let diff_norm = (new - old).mapv(|v| v * v).sum().sqrt();
    let old_norm = old.mapv(|v| v * v).sum().sqrt().max(CHANGE_FLOOR);
    diff_norm / old_norm
}

/// Numerically stable logistic σ(x) = 1 / (1 + e^{−x}).
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `exp(x)` with the argument clamped to [`EXP_CLAMP`].
///
/// Saturation is silent: every `x ≥ 709` returns `exp(709) ≈ 8.2e307`, so a
/// diverging linear predictor stays finite and will not trip the
/// `NonFiniteParameter` check. Call `f64::exp` directly when overflow has to
/// surface as an error.
pub fn safe_exp(x: f64) -> f64 {
    x.min(EXP_CLAMP).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // For an invertible matrix the pseudo-inverse is the inverse.
    //
    // Given
    // -----
    // - `A = [[2, 1], [1, 2]]`, with inverse `[[2, −1], [−1, 2]] / 3`.
    //
    // Expect
    // ------
    // - entrywise agreement to 1e-12.
    fn symmetric_pinv_inverts_full_rank() {
        let a = array![[2.0, 1.0], [1.0, 2.0]];

        let pinv = symmetric_pinv(a.view());

        let expected = array![[2.0, -1.0], [-1.0, 2.0]] / 3.0;
        for (got, want) in pinv.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(got, want, epsilon = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Singular inputs are tolerated.
    //
    // Given
    // -----
    // - The rank-one matrix `[[1, 1], [1, 1]]` and the zero matrix.
    //
    // Expect
    // ------
    // - pinv of the rank-one matrix is `[[1, 1], [1, 1]] / 4`.
    // - pinv of zero is zero.
    fn symmetric_pinv_handles_singular_matrices() {
        let rank_one = array![[1.0, 1.0], [1.0, 1.0]];
        let pinv = symmetric_pinv(rank_one.view());
        for &v in pinv.iter() {
            assert_abs_diff_eq!(v, 0.25, epsilon = 1e-12);
        }

        let zero = Array2::<f64>::zeros((3, 3));
        assert!(symmetric_pinv(zero.view()).iter().all(|&v| v == 0.0));
    }

    #[test]
    // Purpose
    // -------
    // Tiny but non-zero scales are kept, not truncated.
    fn symmetric_pinv_keeps_small_scaled_identity() {
        let tiny = array![[1e-10, 0.0], [0.0, 1e-10]];

        let pinv = symmetric_pinv(tiny.view());

        assert_abs_diff_eq!(pinv[[0, 0]], 1e10, epsilon = 1e-2);
        assert_abs_diff_eq!(pinv[[0, 1]], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn relative_change_is_scaled_by_old_norm() {
        assert_abs_diff_eq!(relative_change(&array![3.0, 4.0], &array![3.0, 4.0]), 0.0);
        assert_abs_diff_eq!(relative_change(&array![3.0, 4.0], &array![6.0, 8.0]), 1.0);
        assert_abs_diff_eq!(relative_change(&array![0.0], &array![0.0]), 0.0);
        assert!(relative_change(&array![0.0], &array![1.0]) > 1e9);
    }

    #[test]
    fn inverse_link_helpers_stay_finite() {
        assert_abs_diff_eq!(safe_logistic(0.0), 0.5);
        assert!(safe_logistic(-800.0) >= 0.0 && safe_logistic(800.0) <= 1.0);
        assert!(safe_exp(1e6).is_finite());
        assert_eq!(safe_exp(1e6), EXP_CLAMP.exp());
        assert_abs_diff_eq!(safe_exp(1.0), std::f64::consts::E);
    }
}
