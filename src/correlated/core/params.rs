//! params — fixed + random effects → parameter tensor.
//!
//! Purpose
//! -------
//! Compute the `(l, m, n)` parameter tensor `P` from canonical design
//! matrices, fixed effects, random effects and offsets:
//!
//! ```text
//! P[k, i, j] = offset[k, i] · g_k( X[k][j][i, :] · beta[k][j] + U[k, group(i), j] )
//! ```
//!
//! Key behaviors
//! -------------
//! - Random effects are broadcast over contiguous group blocks: group `g`
//!   covers the `group_sizes[g]` rows that follow the previous groups.
//! - Offsets multiply the link-transformed value.
//! - Every precondition (grid shapes, beta lengths, the group partition,
//!   offset shape) is checked and reported as a `ModelError`; nothing here
//!   panics on bad shapes.
//! - Any non-finite entry of `P` is a `NonFiniteParameter` error.
//!
//! Downstream usage
//! ----------------
//! - Training: `CorrelatedModel` passes its sorted data and fitted groups.
//! - Prediction: the group resolver passes gathered random effects and the
//!   sizes of the groups present in the new rows.
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis, s};

use crate::correlated::{
    core::{family::OutcomeModel, grid::Grid, groups::broadcast_random_effects},
    errors::{ModelError, ModelResult},
};

/// Fixed effects, one coefficient vector per `(parameter, outcome)` cell.
pub type Beta = Grid<Array1<f64>>;

/// Zero fixed effects matching the column counts of `x`.
pub fn zero_beta(x: &Grid<Array2<f64>>) -> Beta {
    x.map(|_, cell| Array1::zeros(cell.ncols()))
}

/// Compute the parameter tensor `P`, shape `(l, rows, n)`.
///
/// Parameters
/// ----------
/// - `x`: canonical design matrices, all with `rows` rows, grid `(l, n)`.
/// - `beta`: fixed effects; `beta[(k, j)].len() == x[(k, j)].ncols()`.
/// - `u`: random effects `(l, groups, n)`.
/// - `group_sizes`: contiguous block sizes; `groups` entries summing to `rows`.
/// - `offsets`: `(l, rows)` multiplicative offsets.
/// - `outcome`: supplies the inverse links.
///
/// Errors
/// ------
/// - `CovariateGridMismatch`, `CoefficientShapeMismatch`,
///   `RandomEffectShapeMismatch`, `GroupPartitionMismatch`,
///   `OffsetShapeMismatch` for inconsistent inputs.
/// - `NonFiniteParameter` for the first non-finite entry of `P`.
pub fn compute_p<M: OutcomeModel + ?Sized>(
    x: &Grid<Array2<f64>>, beta: &Beta, u: ArrayView3<f64>, group_sizes: &[usize],
    offsets: ArrayView2<f64>, outcome: &M,
) -> ModelResult<Array3<f64>> {
    let (l, n) = x.shape();
    let rows = x.get(0, 0).map_or(0, |cell| cell.nrows());
    check_inputs(x, beta, u, group_sizes, offsets, rows)?;

    let mut p = Array3::<f64>::zeros((l, rows, n));
    for ((k, j), cell) in x.iter() {
        let eta = cell.dot(&beta[(k, j)]);
        p.slice_mut(s![k, .., j]).assign(&eta);
    }

    p += &broadcast_random_effects(u, group_sizes);

    for k in 0..l {
        let mut slice = p.index_axis_mut(Axis(0), k);
        slice.mapv_inplace(|eta| outcome.inverse_link(k, eta));
        for (mut row, &scale) in slice.outer_iter_mut().zip(offsets.row(k)) {
            row *= scale;
        }
    }

    check_finite_p(p.view())?;
    Ok(p)
}

/// First non-finite entry of `P`, as an error.
pub fn check_finite_p(p: ArrayView3<f64>) -> ModelResult<()> {
    match p.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((param, row, outcome), &value)) => {
            Err(ModelError::NonFiniteParameter { param, row, outcome, value })
        }
        None => Ok(()),
    }
}

fn check_inputs(
    x: &Grid<Array2<f64>>, beta: &Beta, u: ArrayView3<f64>, group_sizes: &[usize],
    offsets: ArrayView2<f64>, rows: usize,
) -> ModelResult<()> {
    let (l, n) = x.shape();
    if beta.shape() != (l, n) {
        return Err(ModelError::CovariateGridMismatch { expected: (l, n), found: beta.shape() });
    }
    for ((k, j), cell) in x.iter() {
        if cell.nrows() != rows {
            return Err(ModelError::CovariateShapeMismatch {
                param: k,
                outcome: j,
                expected: (rows, cell.ncols()),
                found: cell.dim(),
            });
        }
        let b = &beta[(k, j)];
        if b.len() != cell.ncols() {
            return Err(ModelError::CoefficientShapeMismatch {
                param: k,
                outcome: j,
                expected: cell.ncols(),
                found: b.len(),
            });
        }
    }
    let (ul, groups, un) = u.dim();
    if ul != l || un != n || groups != group_sizes.len() {
        return Err(ModelError::RandomEffectShapeMismatch {
            expected: (l, group_sizes.len(), n),
            found: u.dim(),
        });
    }
    let sum: usize = group_sizes.iter().sum();
    if sum != rows {
        return Err(ModelError::GroupPartitionMismatch {
            rows,
            sum,
            groups: group_sizes.len(),
            u_groups: groups,
        });
    }
    if offsets.dim() != (l, rows) {
        let param = if offsets.nrows() == l { 0 } else { offsets.nrows().min(l) };
        return Err(ModelError::OffsetShapeMismatch { param, expected_params: l, expected_len: rows });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    /// Identity link for parameter 0, exp for parameter 1.
    struct TwoLinks;

    impl OutcomeModel for TwoLinks {
        fn num_params(&self) -> usize {
            2
        }

        fn inverse_link(&self, k: usize, eta: f64) -> f64 {
            if k == 0 { eta } else { eta.exp() }
        }

        fn neg_log_likelihood(
            &self, y: ArrayView2<f64>, _p: ArrayView3<f64>,
        ) -> Array2<f64> {
            Array2::zeros(y.raw_dim())
        }
    }

    fn intercept_grid(l: usize, n: usize, m: usize) -> Grid<Array2<f64>> {
        Grid::from_fn(l, n, |_, _| Array2::ones((m, 1)))
    }

    #[test]
    // Purpose
    // -------
    // The four-row intercept-only scenario returns zeros at the start.
    //
    // Given
    // -----
    // - m = 4 in two groups of two, n = 1, l = 1, beta = 0, U = 0, offsets 1.
    //
    // Expect
    // ------
    // - `P == [[0], [0], [0], [0]]` for the identity link.
    fn zero_effects_give_zero_parameters() {
        struct Identity;
        impl OutcomeModel for Identity {
            fn num_params(&self) -> usize {
                1
            }
            fn inverse_link(&self, _k: usize, eta: f64) -> f64 {
                eta
            }
            fn neg_log_likelihood(&self, y: ArrayView2<f64>, _p: ArrayView3<f64>) -> Array2<f64> {
                Array2::zeros(y.raw_dim())
            }
        }
        let x = intercept_grid(1, 1, 4);
        let beta = zero_beta(&x);
        let u = Array3::<f64>::zeros((1, 2, 1));
        let offsets = Array2::<f64>::ones((1, 4));

        let p = compute_p(&x, &beta, u.view(), &[2, 2], offsets.view(), &Identity)
            .expect("valid inputs");

        assert_eq!(p, Array3::<f64>::zeros((1, 4, 1)));
    }

    #[test]
    // Purpose
    // -------
    // Random effects follow their blocks, links apply per parameter, and
    // offsets multiply after the link.
    //
    // Given
    // -----
    // - l = 2, n = 1, m = 3, groups of sizes [1, 2].
    // - beta = 0.5 everywhere, U[0] = [1, −1], U[1] = [0, 1].
    // - offsets row 1 = [1, 2, 3].
    //
    // Expect
    // ------
    // - P[0] = [1.5, −0.5, −0.5] (identity).
    // - P[1] = [e^0.5, 2·e^1.5, 3·e^1.5] (exp then offset).
    fn links_blocks_and_offsets_compose() {
        let x = intercept_grid(2, 1, 3);
        let beta = x.map(|_, _| array![0.5]);
        let u = array![[[1.0], [-1.0]], [[0.0], [1.0]]];
        let offsets = array![[1.0, 1.0, 1.0], [1.0, 2.0, 3.0]];

        let p = compute_p(&x, &beta, u.view(), &[1, 2], offsets.view(), &TwoLinks)
            .expect("valid inputs");

        assert_abs_diff_eq!(p[[0, 0, 0]], 1.5);
        assert_abs_diff_eq!(p[[0, 2, 0]], -0.5);
        assert_abs_diff_eq!(p[[1, 0, 0]], 0.5_f64.exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(p[[1, 1, 0]], 2.0 * 1.5_f64.exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(p[[1, 2, 0]], 3.0 * 1.5_f64.exp(), epsilon = 1e-12);
    }

    #[test]
    fn preconditions_are_reported_not_panicked() {
        let x = intercept_grid(2, 1, 3);
        let beta = zero_beta(&x);
        let offsets = Array2::<f64>::ones((2, 3));

        let u = Array3::<f64>::zeros((2, 2, 1));
        let err = compute_p(&x, &beta, u.view(), &[1, 1], offsets.view(), &TwoLinks)
            .expect_err("sizes sum to 2, not 3");
        assert!(matches!(err, ModelError::GroupPartitionMismatch { rows: 3, sum: 2, .. }));

        let err = compute_p(&x, &beta, u.view(), &[3], offsets.view(), &TwoLinks)
            .expect_err("one size for two random-effect rows");
        assert!(matches!(err, ModelError::RandomEffectShapeMismatch { .. }));

        let mut long_beta = beta.clone();
        long_beta[(1, 0)] = array![0.0, 0.0];
        let err = compute_p(&x, &long_beta, u.view(), &[1, 2], offsets.view(), &TwoLinks)
            .expect_err("beta longer than X");
        assert_eq!(
            err,
            ModelError::CoefficientShapeMismatch { param: 1, outcome: 0, expected: 1, found: 2 }
        );
    }

    #[test]
    fn overflowing_link_is_non_finite_parameter() {
        let x = intercept_grid(2, 1, 2);
        let mut beta = zero_beta(&x);
        beta[(1, 0)] = array![1000.0];
        let u = Array3::<f64>::zeros((2, 1, 1));
        let offsets = Array2::<f64>::ones((2, 2));

        let err = compute_p(&x, &beta, u.view(), &[2], offsets.view(), &TwoLinks)
            .expect_err("exp(1000) overflows");

        assert!(matches!(err, ModelError::NonFiniteParameter { param: 1, row: 0, outcome: 0, .. }));
    }
}
