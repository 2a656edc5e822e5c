//! groups — stable group ordering and random-effect index resolution.
//!
//! Purpose
//! -------
//! Random effects are stored one row per fit-time group, and individuals are
//! kept sorted so each group occupies a contiguous block. This module owns
//! that ordering and the mapping used at prediction time, when new rows may
//! carry group ids that were never seen during the fit.
//!
//! Key behaviors
//! -------------
//! - [`stable_group_order`] returns the stable ascending permutation of a
//!   group-id vector; ties keep their input order.
//! - [`group_runs`] collapses a sorted id vector into unique ids and sizes.
//! - [`resolve_groups`] maps every group present in new data to
//!   [`GroupIndex::Existing`] (a row of the fitted `U`) or
//!   [`GroupIndex::Synthetic`] (an all-zero random effect).
//! - [`gather_random_effects`] materializes the `(l, present, n)` random
//!   effects for a resolution; duplicates share the same fitted row.
//! - [`broadcast_random_effects`] repeats each group's row over its
//!   contiguous block, the canonical per-individual layout.
//!
//! Invariants & assumptions
//! ------------------------
//! - `fitted_unique` passed to [`resolve_groups`] is strictly increasing
//!   (guaranteed by `ModelData`); lookup is a binary search.
//! - `order[i]` is the input row placed at sorted position `i`;
//!   `inverse[r]` is the sorted position of input row `r`.
use ndarray::{Array3, ArrayView3, Axis, s};

/// Random-effect source for one group present in new data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupIndex {
    /// Row of the fitted random-effect tensor.
    Existing(usize),
    /// Group unseen at fit time; its random effect is zero.
    Synthetic,
}

/// Outcome of [`resolve_groups`] for one batch of new rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupResolution {
    /// Sorted position → input row.
    pub order: Vec<usize>,
    /// Input row → sorted position.
    pub inverse: Vec<usize>,
    /// Unique group ids present in the new data, ascending. Empty when the
    /// caller supplied no ids.
    pub present: Vec<i64>,
    /// Rows per present group, aligned with `present`.
    pub sizes: Vec<usize>,
    /// Random-effect source per present group, aligned with `present`.
    pub indices: Vec<GroupIndex>,
}

impl GroupResolution {
    /// Every row its own unseen group, in input order.
    pub fn all_synthetic(rows: usize) -> Self {
        let order: Vec<usize> = (0..rows).collect();
        Self {
            inverse: order.clone(),
            present: Vec::new(),
            sizes: vec![1; rows],
            indices: vec![GroupIndex::Synthetic; rows],
            order,
        }
    }

    /// Number of present groups that were not seen at fit time.
    pub fn num_synthetic(&self) -> usize {
        self.indices.iter().filter(|idx| matches!(idx, GroupIndex::Synthetic)).count()
    }
}

/// Stable ascending permutation of `ids`.
pub fn stable_group_order(ids: &[i64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..ids.len()).collect();
    order.sort_by_key(|&row| ids[row]);
    order
}

/// Inverse of a permutation.
pub fn invert_permutation(order: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; order.len()];
    for (pos, &row) in order.iter().enumerate() {
        inverse[row] = pos;
    }
    inverse
}

/// Unique ids and run lengths of an already sorted id sequence.
pub fn group_runs<I>(sorted_ids: I) -> (Vec<i64>, Vec<usize>)
where
    I: IntoIterator<Item = i64>,
{
    let mut unique: Vec<i64> = Vec::new();
    let mut sizes: Vec<usize> = Vec::new();
    for id in sorted_ids {
        if unique.last() == Some(&id) {
            if let Some(size) = sizes.last_mut() {
                *size += 1;
            }
        } else {
            unique.push(id);
            sizes.push(1);
        }
    }
    (unique, sizes)
}

/// Resolve the groups of new rows against the fit-time unique ids.
pub fn resolve_groups(fitted_unique: &[i64], new_ids: &[i64]) -> GroupResolution {
    let order = stable_group_order(new_ids);
    let inverse = invert_permutation(&order);
    let (present, sizes) = group_runs(order.iter().map(|&row| new_ids[row]));
    let indices = present
        .iter()
        .map(|id| match fitted_unique.binary_search(id) {
            Ok(row) => GroupIndex::Existing(row),
            Err(_) => GroupIndex::Synthetic,
        })
        .collect();
    GroupResolution { order, inverse, present, sizes, indices }
}

/// Random effects `(l, indices.len(), n)` gathered from the fitted `u`.
///
/// Synthetic entries stay zero. Existing indices must be in range for `u`.
pub fn gather_random_effects(u: ArrayView3<f64>, indices: &[GroupIndex]) -> Array3<f64> {
    let (l, _, n) = u.dim();
    let mut gathered = Array3::<f64>::zeros((l, indices.len(), n));
    for (slot, idx) in indices.iter().enumerate() {
        if let GroupIndex::Existing(row) = *idx {
            gathered.slice_mut(s![.., slot, ..]).assign(&u.slice(s![.., row, ..]));
        }
    }
    gathered
}

/// Per-individual random effects `(l, Σ sizes, n)`: row `g` of `u` repeated
/// `group_sizes[g]` times, in block order.
///
/// `group_sizes.len()` must equal the group axis of `u`.
pub fn broadcast_random_effects(u: ArrayView3<f64>, group_sizes: &[usize]) -> Array3<f64> {
    let (l, _, n) = u.dim();
    let rows: usize = group_sizes.iter().sum();
    let mut out = Array3::<f64>::zeros((l, rows, n));
    let mut start = 0;
    for (g, &size) in group_sizes.iter().enumerate() {
        let row = u.index_axis(Axis(1), g);
        for i in start..start + size {
            out.slice_mut(s![.., i, ..]).assign(&row);
        }
        start += size;
    }
    out
}
