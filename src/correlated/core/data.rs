//! Data containers for the correlated mixed model.
//!
//! Purpose
//! -------
//! Provide the raw input bundle ([`ModelInputs`]) and its validated,
//! canonical counterpart ([`ModelData`]). All construction-time checks of
//! the model live here so downstream code (parameter engine, likelihood,
//! driver) can assume consistent shapes, finite values and a grouped row
//! order.
//!
//! Key behaviors
//! -------------
//! - [`ModelData::new`] checks dimensions, shapes and finiteness, builds the
//!   canonical covariate design, and stable-sorts every per-individual array
//!   (covariates, observations, weights, offsets, group ids) by ascending
//!   group id.
//! - Unique group ids and per-group sizes are derived once, after sorting.
//!
//! Invariants & assumptions
//! ------------------------
//! - `m`, `n`, `l` are positive.
//! - After construction, individuals with the same group id are contiguous,
//!   `unique_group_ids` is strictly increasing and `group_sizes` sums to `m`.
//! - Covariates, offsets and weights are finite; weights are non-negative.
//! - Observations are not checked for finiteness; the outcome model decides
//!   what values it accepts and a bad value surfaces as a non-finite
//!   likelihood.
//!
//! Conventions
//! -----------
//! - Missing group ids default to `0..m` (every individual its own group).
//! - Missing offsets (or a `None` entry for a parameter) default to ones.
//! - Missing weights default to ones.
//! - `sort_order[i]` is the input row stored at position `i`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the happy path, sorting, defaults and each error that
//!   is raised here rather than in `covariates`.
use ndarray::{Array1, Array2, Axis};

use crate::correlated::{
    core::{
        covariates::{CovariateDesign, CovariateGrid},
        grid::Grid,
        groups::{group_runs, stable_group_order},
        options::ModelOptions,
        splines::SplineInputs,
    },
    errors::{ModelError, ModelResult},
};

/// Raw inputs of a correlated model, in the caller's row order.
///
/// Fields
/// ------
/// - `m`, `n`, `l`: individuals, outcomes, distribution parameters.
/// - `covariate_counts`: declared raw covariate counts `d`, `(l, n)`.
/// - `y`: observations, `(m, n)`.
/// - `x`: covariate cells, grid `(l, n)`.
/// - `group_ids`: optional length-`m` group assignment.
/// - `offsets`: optional `l` entries, each `None` or a length-`m` vector.
/// - `weights`: optional `(m, n)` likelihood weights.
/// - `splines`: optional spline terms per cell.
#[derive(Debug, Clone)]
pub struct ModelInputs {
    pub m: usize,
    pub n: usize,
    pub l: usize,
    pub covariate_counts: Array2<usize>,
    pub y: Array2<f64>,
    pub x: CovariateGrid,
    pub group_ids: Option<Vec<i64>>,
    pub offsets: Option<Vec<Option<Array1<f64>>>>,
    pub weights: Option<Array2<f64>>,
    pub splines: Option<SplineInputs>,
}

impl ModelInputs {
    /// Inputs with default groups, offsets, weights and no splines.
    pub fn new(
        m: usize, n: usize, l: usize, covariate_counts: Array2<usize>, y: Array2<f64>,
        x: CovariateGrid,
    ) -> Self {
        Self {
            m,
            n,
            l,
            covariate_counts,
            y,
            x,
            group_ids: None,
            offsets: None,
            weights: None,
            splines: None,
        }
    }

    pub fn with_group_ids(mut self, group_ids: Vec<i64>) -> Self {
        self.group_ids = Some(group_ids);
        self
    }

    pub fn with_offsets(mut self, offsets: Vec<Option<Array1<f64>>>) -> Self {
        self.offsets = Some(offsets);
        self
    }

    pub fn with_weights(mut self, weights: Array2<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_splines(mut self, splines: SplineInputs) -> Self {
        self.splines = Some(splines);
        self
    }
}

/// Validated model data in grouped row order.
///
/// Fields
/// ------
/// - `x`: normalized canonical design, each cell `(m, d[k][j])`.
/// - `d`: post-augmentation covariate counts, `(l, n)`.
/// - `y`, `weights`: `(m, n)`, sorted.
/// - `offsets`: `(l, m)`, sorted.
/// - `group_ids`: sorted group ids; `unique_group_ids` / `group_sizes`
///   describe the contiguous blocks.
/// - `sort_order`: input row of each stored row.
/// - `design`: augmentation layout, spline bases and normalization
///   statistics reused at prediction.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub m: usize,
    pub n: usize,
    pub l: usize,
    pub d: Array2<usize>,
    pub x: Grid<Array2<f64>>,
    pub y: Array2<f64>,
    pub weights: Array2<f64>,
    pub offsets: Array2<f64>,
    pub group_ids: Array1<i64>,
    pub unique_group_ids: Vec<i64>,
    pub group_sizes: Vec<usize>,
    pub sort_order: Vec<usize>,
    pub design: CovariateDesign,
}

impl ModelData {
    /// Validate and canonicalize raw inputs.
    ///
    /// Errors
    /// ------
    /// - `NonPositiveDimension` if `m`, `n` or `l` is zero.
    /// - `ObservationShapeMismatch`, `GroupIdLengthMismatch`,
    ///   `OffsetShapeMismatch`, `WeightShapeMismatch` for shape errors.
    /// - `NonFiniteOffset`, `NonFiniteWeight`, `NegativeWeight` for values.
    /// - Every covariate error of [`CovariateDesign::fit`].
    pub fn new(inputs: &ModelInputs, opts: &ModelOptions) -> ModelResult<Self> {
        let ModelInputs { m, n, l, .. } = *inputs;
        for (name, value) in [("m", m), ("n", n), ("l", l)] {
            if value == 0 {
                return Err(ModelError::NonPositiveDimension { name });
            }
        }
        if inputs.y.dim() != (m, n) {
            return Err(ModelError::ObservationShapeMismatch { expected: (m, n), found: inputs.y.dim() });
        }
        let group_ids: Vec<i64> = match &inputs.group_ids {
            Some(ids) if ids.len() != m => {
                return Err(ModelError::GroupIdLengthMismatch { expected: m, found: ids.len() });
            }
            Some(ids) => ids.clone(),
            None => (0..m as i64).collect(),
        };
        let offsets = offsets_matrix(inputs.offsets.as_deref(), l, m)?;
        let weights = weights_matrix(inputs.weights.as_ref(), m, n)?;

        let sort_order = stable_group_order(&group_ids);
        let (design, x) = CovariateDesign::fit(
            &inputs.x,
            &inputs.covariate_counts,
            (l, n),
            m,
            &sort_order,
            opts,
            inputs.splines.as_ref(),
        )?;

        let sorted_ids: Array1<i64> = sort_order.iter().map(|&row| group_ids[row]).collect();
        let (unique_group_ids, group_sizes) = group_runs(sorted_ids.iter().copied());

        Ok(Self {
            m,
            n,
            l,
            d: design.covariate_counts(),
            x,
            y: inputs.y.select(Axis(0), &sort_order),
            weights: weights.select(Axis(0), &sort_order),
            offsets: offsets.select(Axis(1), &sort_order),
            group_ids: sorted_ids,
            unique_group_ids,
            group_sizes,
            sort_order,
            design,
        })
    }

    pub fn num_groups(&self) -> usize {
        self.unique_group_ids.len()
    }
}

/// `(l, rows)` offsets from optional per-parameter vectors.
pub(crate) fn offsets_matrix(
    offsets: Option<&[Option<Array1<f64>>]>, l: usize, rows: usize,
) -> ModelResult<Array2<f64>> {
    let mut out = Array2::<f64>::ones((l, rows));
    let Some(entries) = offsets else {
        return Ok(out);
    };
    if entries.len() != l {
        return Err(ModelError::OffsetShapeMismatch {
            param: entries.len().min(l),
            expected_params: l,
            expected_len: rows,
        });
    }
    for (param, entry) in entries.iter().enumerate() {
        let Some(values) = entry else { continue };
        if values.len() != rows {
            return Err(ModelError::OffsetShapeMismatch { param, expected_params: l, expected_len: rows });
        }
        if let Some((row, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::NonFiniteOffset { param, row, value });
        }
        out.row_mut(param).assign(values);
    }
    Ok(out)
}

fn weights_matrix(weights: Option<&Array2<f64>>, m: usize, n: usize) -> ModelResult<Array2<f64>> {
    let Some(w) = weights else {
        return Ok(Array2::ones((m, n)));
    };
    if w.dim() != (m, n) {
        return Err(ModelError::WeightShapeMismatch { expected: (m, n), found: w.dim() });
    }
    for ((row, col), &value) in w.indexed_iter() {
        if !value.is_finite() {
            return Err(ModelError::NonFiniteWeight { row, col, value });
        }
        if value < 0.0 {
            return Err(ModelError::NegativeWeight { row, col, value });
        }
    }
    Ok(w.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlated::core::covariates::CovariateCell;
    use ndarray::array;

    fn intercept_inputs(y: Array2<f64>, groups: Vec<i64>) -> ModelInputs {
        let m = y.nrows();
        let x = Grid::from_fn(1, 1, |_, _| CovariateCell::InterceptOnly);
        ModelInputs::new(m, 1, 1, array![[0_usize]], y, x).with_group_ids(groups)
    }

    #[test]
    // Purpose
    // -------
    // Rows are stable-sorted by group id and blocks are derived after sorting.
    //
    // Given
    // -----
    // - y = [10, 20, 30, 40, 50] with groups [2, 1, 2, 1, 7].
    //
    // Expect
    // ------
    // - sort order [1, 3, 0, 2, 4]; y = [20, 40, 10, 30, 50].
    // - unique [1, 2, 7], sizes [2, 2, 1].
    fn construction_sorts_by_group() {
        let y = array![[10.0], [20.0], [30.0], [40.0], [50.0]];
        let inputs = intercept_inputs(y, vec![2, 1, 2, 1, 7]);

        let data = ModelData::new(&inputs, &ModelOptions::default()).expect("valid inputs");

        assert_eq!(data.sort_order, vec![1, 3, 0, 2, 4]);
        assert_eq!(data.y.column(0).to_vec(), vec![20.0, 40.0, 10.0, 30.0, 50.0]);
        assert_eq!(data.unique_group_ids, vec![1, 2, 7]);
        assert_eq!(data.group_sizes, vec![2, 2, 1]);
        assert_eq!(data.d, array![[1_usize]]);
        assert_eq!(data.offsets, Array2::<f64>::ones((1, 5)));
    }

    #[test]
    fn default_groups_are_singletons() {
        let mut inputs = intercept_inputs(array![[1.0], [2.0], [3.0]], vec![]);
        inputs.group_ids = None;

        let data = ModelData::new(&inputs, &ModelOptions::default()).expect("valid inputs");

        assert_eq!(data.num_groups(), 3);
        assert_eq!(data.group_sizes, vec![1, 1, 1]);
    }

    #[test]
    // Purpose
    // -------
    // Each construction error raised here is distinguishable.
    fn construction_errors_are_distinguishable() {
        let opts = ModelOptions::default();
        let base = intercept_inputs(array![[1.0], [2.0]], vec![0, 0]);

        let mut zero_l = base.clone();
        zero_l.l = 0;
        assert_eq!(
            ModelData::new(&zero_l, &opts).expect_err("l = 0"),
            ModelError::NonPositiveDimension { name: "l" }
        );

        let mut bad_y = base.clone();
        bad_y.y = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(matches!(
            ModelData::new(&bad_y, &opts),
            Err(ModelError::ObservationShapeMismatch { .. })
        ));

        let bad_groups = base.clone().with_group_ids(vec![0]);
        assert_eq!(
            ModelData::new(&bad_groups, &opts).expect_err("one id for two rows"),
            ModelError::GroupIdLengthMismatch { expected: 2, found: 1 }
        );

        let bad_offset = base.clone().with_offsets(vec![Some(array![1.0, f64::INFINITY])]);
        assert!(matches!(
            ModelData::new(&bad_offset, &opts),
            Err(ModelError::NonFiniteOffset { param: 0, row: 1, .. })
        ));

        let short_offset = base.clone().with_offsets(vec![Some(array![1.0])]);
        assert!(matches!(
            ModelData::new(&short_offset, &opts),
            Err(ModelError::OffsetShapeMismatch { param: 0, .. })
        ));

        let negative = base.clone().with_weights(array![[1.0], [-0.5]]);
        assert!(matches!(
            ModelData::new(&negative, &opts),
            Err(ModelError::NegativeWeight { row: 1, col: 0, .. })
        ));

        let nan_weight = base.clone().with_weights(array![[f64::NAN], [1.0]]);
        assert!(matches!(
            ModelData::new(&nan_weight, &opts),
            Err(ModelError::NonFiniteWeight { row: 0, .. })
        ));

        let wide_weight = base.with_weights(Array2::ones((2, 2)));
        assert!(matches!(
            ModelData::new(&wide_weight, &opts),
            Err(ModelError::WeightShapeMismatch { .. })
        ));
    }

    #[test]
    fn offsets_follow_the_sort() {
        let inputs = intercept_inputs(array![[1.0], [2.0], [3.0]], vec![5, 3, 4])
            .with_offsets(vec![Some(array![0.5, 1.5, 2.5])]);

        let data = ModelData::new(&inputs, &ModelOptions::default()).expect("valid inputs");

        assert_eq!(data.offsets.row(0).to_vec(), vec![1.5, 2.5, 0.5]);
    }
}
