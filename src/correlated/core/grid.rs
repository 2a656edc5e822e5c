//! Grid — dense container keyed by (distribution parameter, outcome).
//!
//! Purpose
//! -------
//! Every per-cell quantity in the mixed model (covariate matrices, declared
//! covariate counts, coefficient vectors, normalization statistics, spline
//! specs) is indexed by `(k, j)` with `k < l` distribution parameters and
//! `j < n` outcomes. [`Grid`] stores such a table in row-major order so the
//! rest of the crate never has to juggle nested `Vec<Vec<_>>`.
//!
//! Conventions
//! -----------
//! - Storage index of `(k, j)` is `k * n + j`.
//! - Shapes are reported as `(l, n)`, matching the `ModelError` shape fields.
use std::ops::{Index, IndexMut};

/// Row-major `(l × n)` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    cells: Vec<T>,
    num_params: usize,
    num_outcomes: usize,
}

impl<T> Grid<T> {
    /// Build a grid by evaluating `f(k, j)` for every cell.
    pub fn from_fn(num_params: usize, num_outcomes: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut cells = Vec::with_capacity(num_params * num_outcomes);
        for k in 0..num_params {
            for j in 0..num_outcomes {
                cells.push(f(k, j));
            }
        }
        Self { cells, num_params, num_outcomes }
    }

    /// Build a grid from nested rows (`rows[k][j]`).
    ///
    /// Returns `None` when the rows are ragged.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Option<Self> {
        let num_params = rows.len();
        let num_outcomes = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != num_outcomes) {
            return None;
        }
        let cells = rows.into_iter().flatten().collect();
        Some(Self { cells, num_params, num_outcomes })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.num_params, self.num_outcomes)
    }

    pub fn num_params(&self) -> usize {
        self.num_params
    }

    pub fn num_outcomes(&self) -> usize {
        self.num_outcomes
    }

    pub fn get(&self, k: usize, j: usize) -> Option<&T> {
        if k < self.num_params && j < self.num_outcomes {
            self.cells.get(k * self.num_outcomes + j)
        } else {
            None
        }
    }

    /// Iterate `((k, j), &cell)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &T)> + '_ {
        let n = self.num_outcomes.max(1);
        self.cells.iter().enumerate().map(move |(idx, cell)| ((idx / n, idx % n), cell))
    }

    /// Iterate `((k, j), &mut cell)` in storage order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = ((usize, usize), &mut T)> + '_ {
        let n = self.num_outcomes.max(1);
        self.cells.iter_mut().enumerate().map(move |(idx, cell)| ((idx / n, idx % n), cell))
    }

    /// Map every cell, keeping the layout.
    pub fn map<U>(&self, mut f: impl FnMut((usize, usize), &T) -> U) -> Grid<U> {
        let cells = self.iter().map(|(kj, cell)| f(kj, cell)).collect();
        Grid { cells, num_params: self.num_params, num_outcomes: self.num_outcomes }
    }

    /// Fallible [`Grid::map`]; stops at the first error.
    pub fn try_map<U, E>(&self, mut f: impl FnMut((usize, usize), &T) -> Result<U, E>) -> Result<Grid<U>, E> {
        let cells = self.iter().map(|(kj, cell)| f(kj, cell)).collect::<Result<Vec<_>, E>>()?;
        Ok(Grid { cells, num_params: self.num_params, num_outcomes: self.num_outcomes })
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    fn index(&self, (k, j): (usize, usize)) -> &T {
        assert!(k < self.num_params && j < self.num_outcomes, "grid index ({k}, {j}) out of bounds");
        &self.cells[k * self.num_outcomes + j]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    fn index_mut(&mut self, (k, j): (usize, usize)) -> &mut T {
        assert!(k < self.num_params && j < self.num_outcomes, "grid index ({k}, {j}) out of bounds");
        &mut self.cells[k * self.num_outcomes + j]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // `(k, j)` addressing is row-major and `iter` reports the same indices.
    fn grid_is_row_major() {
        let grid = Grid::from_fn(2, 3, |k, j| 10 * k + j);

        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid[(1, 2)], 12);
        let seen: Vec<_> = grid.iter().map(|(kj, &v)| (kj, v)).collect();
        assert_eq!(seen[4], ((1, 1), 11));
        assert_eq!(grid.get(2, 0), None);
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        assert!(Grid::from_rows(vec![vec![1, 2], vec![3]]).is_none());
        let grid = Grid::from_rows(vec![vec![1, 2], vec![3, 4]]).expect("rectangular rows");
        assert_eq!(grid[(1, 0)], 3);
    }

    #[test]
    fn try_map_short_circuits() {
        let grid = Grid::from_fn(1, 3, |_, j| j);
        let res: Result<Grid<usize>, usize> =
            grid.try_map(|(_, j), &v| if j == 1 { Err(v) } else { Ok(v * 2) });
        assert_eq!(res, Err(1));
    }
}
