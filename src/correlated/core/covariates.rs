//! covariates — tri-state covariate cells and their canonical design.
//!
//! Purpose
//! -------
//! Turn the caller's per-cell covariates into the design matrices the
//! parameter engine multiplies with `beta`, and remember exactly how that
//! was done so prediction can repeat it on new rows.
//!
//! Key behaviors
//! -------------
//! - [`CovariateCell`] makes the three cell states explicit: a matrix of
//!   real covariates, an intercept-only cell, or an unused cell.
//! - Column layout of every canonical cell is
//!   `[intercept?] [raw covariates] [spline columns]`; [`CellLayout`]
//!   records the widths and the normalization statistics.
//! - [`CovariateDesign::fit`] validates cells, evaluates spline bases,
//!   stable-sorts rows by the supplied order, computes normalization
//!   statistics on the sorted rows and returns the normalized design.
//! - [`CovariateDesign::transform`] applies the stored layout, bases and
//!   statistics to new raw cells.
//!
//! Invariants & assumptions
//! ------------------------
//! - An `InterceptOnly` cell always carries an intercept column. An `Unused`
//!   cell becomes intercept-only under `add_intercepts`, and is a
//!   `MissingCovariates` error otherwise.
//! - `InterceptOnly` / `Unused` cells declare zero raw covariates.
//! - Intercept columns are stored with mean 0 / std 1, so normalization is a
//!   single `(x - mean) / std` with no branch on the column kind.
//! - Columns whose population std is negligible relative to their mean are
//!   left as they are (mean 0 / std 1), so a caller-supplied constant column
//!   still acts as an intercept. They are listed in
//!   [`CovariateDesign::zero_variance`].
//!
//! Conventions
//! -----------
//! - Declared covariate counts `d[k][j]` are raw counts (before intercept
//!   and spline augmentation). The post-augmentation count is
//!   [`CellLayout::num_cols`].
use std::{ops::Range, sync::Arc};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};

use crate::correlated::{
    core::{
        grid::Grid,
        options::ModelOptions,
        splines::{SplineBasis, SplineInputs},
    },
    errors::{ModelError, ModelResult},
};

/// Relative threshold under which a column's std counts as zero.
pub const ZERO_STD_TOL: f64 = 1e-12;

/// Covariates for one `(parameter, outcome)` cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CovariateCell {
    /// Real covariates, `rows × d[k][j]`.
    Matrix(Array2<f64>),
    /// No covariates; the cell gets an intercept column regardless of
    /// `add_intercepts`.
    InterceptOnly,
    /// No covariates; valid only under `add_intercepts`.
    Unused,
}

impl CovariateCell {
    /// Number of raw covariate columns carried by the cell.
    pub fn raw_cols(&self) -> usize {
        match self {
            CovariateCell::Matrix(x) => x.ncols(),
            CovariateCell::InterceptOnly | CovariateCell::Unused => 0,
        }
    }
}

/// Covariate cells keyed by `(parameter, outcome)`.
pub type CovariateGrid = Grid<CovariateCell>;

/// Canonical column layout and normalization statistics of one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellLayout {
    pub intercept: bool,
    pub raw_cols: usize,
    pub spline_cols: usize,
    /// Column means over the full canonical layout (0 for the intercept).
    pub mean: Array1<f64>,
    /// Column standard deviations over the full layout (1 for the intercept).
    pub std: Array1<f64>,
}

impl CellLayout {
    /// Index of the first non-intercept column (0 or 1).
    pub fn ci(&self) -> usize {
        usize::from(self.intercept)
    }

    pub fn num_cols(&self) -> usize {
        self.ci() + self.raw_cols + self.spline_cols
    }

    /// Column range of the raw (non-intercept, non-spline) covariates.
    pub fn raw_range(&self) -> Range<usize> {
        self.ci()..self.ci() + self.raw_cols
    }
}

/// How raw covariates become the canonical design; reused at prediction.
#[derive(Debug, Clone)]
pub struct CovariateDesign {
    pub cells: Grid<CellLayout>,
    pub bases: Grid<Vec<Arc<dyn SplineBasis>>>,
    /// `(k, j, column)` of constant columns left unnormalized.
    pub zero_variance: Vec<(usize, usize, usize)>,
}

impl CovariateDesign {
    /// Validate raw cells, augment, sort and normalize them.
    ///
    /// Parameters
    /// ----------
    /// - `cells`: raw covariates in input row order.
    /// - `declared`: raw covariate counts `d`, shape `(l, n)`.
    /// - `shape`: expected `(l, n)`.
    /// - `rows`: number of individuals `m`.
    /// - `order`: stable sort permutation (sorted position → input row).
    ///
    /// Returns
    /// -------
    /// The fitted design and the normalized, sorted design matrices.
    ///
    /// Errors
    /// ------
    /// `DimensionShapeMismatch`, `CovariateGridMismatch`, `MissingCovariates`,
    /// `CovariateShapeMismatch`, `NonFiniteCovariate`, the spline errors, and
    /// `NonPositiveCovariateCount` for a cell left with no columns.
    pub fn fit(
        cells: &CovariateGrid, declared: &Array2<usize>, shape: (usize, usize), rows: usize,
        order: &[usize], opts: &ModelOptions, splines: Option<&SplineInputs>,
    ) -> ModelResult<(Self, Grid<Array2<f64>>)> {
        if declared.dim() != shape {
            return Err(ModelError::DimensionShapeMismatch { expected: shape, found: declared.dim() });
        }
        if cells.shape() != shape {
            return Err(ModelError::CovariateGridMismatch { expected: shape, found: cells.shape() });
        }
        if !opts.add_intercepts {
            if let Some(((param, outcome), _)) =
                cells.iter().find(|(_, cell)| matches!(cell, CovariateCell::Unused))
            {
                return Err(ModelError::MissingCovariates { param, outcome });
            }
        }
        for ((k, j), cell) in cells.iter() {
            check_training_cell(k, j, cell, declared[[k, j]], rows)?;
        }

        let bases = build_bases(splines, shape, rows)?;
        let spline_blocks: Grid<Option<Array2<f64>>> = match splines {
            Some(inputs) => bases.try_map(|(k, j), cell_bases| {
                let vars: Vec<ArrayView1<f64>> =
                    inputs.specs[(k, j)].iter().map(|spec| spec.variable.view()).collect();
                spline_columns(k, j, cell_bases, &vars, rows)
            })?,
            None => Grid::from_fn(shape.0, shape.1, |_, _| None),
        };

        let mut zero_variance = Vec::new();
        let mut layouts = Vec::with_capacity(shape.0);
        let mut design = Vec::with_capacity(shape.0);
        for k in 0..shape.0 {
            let mut layout_row = Vec::with_capacity(shape.1);
            let mut design_row = Vec::with_capacity(shape.1);
            for j in 0..shape.1 {
                let cell = &cells[(k, j)];
                let intercept = opts.add_intercepts || matches!(cell, CovariateCell::InterceptOnly);
                let spline = spline_blocks[(k, j)].as_ref().map(|block| block.view());
                let augmented = assemble(cell, intercept, spline, rows).select(Axis(0), order);
                if augmented.ncols() == 0 {
                    return Err(ModelError::NonPositiveCovariateCount { param: k, outcome: j });
                }
                let ci = usize::from(intercept);
                let (mean, std) = if opts.normalize_x {
                    column_stats(augmented.view(), ci, |col| zero_variance.push((k, j, col)))
                } else {
                    (Array1::zeros(augmented.ncols()), Array1::ones(augmented.ncols()))
                };
                let layout = CellLayout {
                    intercept,
                    raw_cols: cell.raw_cols(),
                    spline_cols: spline.map_or(0, |b| b.ncols()),
                    mean,
                    std,
                };
                design_row.push(normalize(augmented, &layout));
                layout_row.push(layout);
            }
            layouts.push(layout_row);
            design.push(design_row);
        }

        let cells = grid_from_rows(layouts, shape)?;
        let design = grid_from_rows(design, shape)?;
        Ok((Self { cells, bases, zero_variance }, design))
    }

    /// Apply the stored augmentation and normalization to new raw cells.
    ///
    /// `spline_vars[(k, j)]` must hold one vector per spline term of that
    /// cell, in the order the terms were fitted.
    ///
    /// Errors
    /// ------
    /// `CovariateGridMismatch`, `NewRowCountMismatch`,
    /// `NewCovariateShapeMismatch`, `NonFiniteCovariate`,
    /// `MissingSplineVariables`, `SplineGridMismatch` and spline basis errors.
    pub fn transform(
        &self, cells: &CovariateGrid, spline_vars: Option<&Grid<Vec<Array1<f64>>>>, rows: usize,
    ) -> ModelResult<Grid<Array2<f64>>> {
        let shape = self.cells.shape();
        if cells.shape() != shape {
            return Err(ModelError::CovariateGridMismatch { expected: shape, found: cells.shape() });
        }
        if let Some(vars) = spline_vars {
            if vars.shape() != shape {
                return Err(ModelError::SplineGridMismatch { expected: shape, found: vars.shape() });
            }
        }
        self.cells.try_map(|(k, j), layout| {
            let cell = &cells[(k, j)];
            check_new_cell(k, j, cell, layout, rows)?;
            let bases = &self.bases[(k, j)];
            let spline = if bases.is_empty() {
                None
            } else {
                let vars = spline_vars
                    .map(|grid| &grid[(k, j)])
                    .filter(|vars| vars.len() == bases.len())
                    .ok_or(ModelError::MissingSplineVariables { param: k, outcome: j })?;
                if let Some(var) = vars.iter().find(|var| var.len() != rows) {
                    return Err(ModelError::NewRowCountMismatch {
                        param: k,
                        outcome: j,
                        expected: rows,
                        found: var.len(),
                    });
                }
                let views: Vec<ArrayView1<f64>> = vars.iter().map(|v| v.view()).collect();
                spline_columns(k, j, bases, &views, rows)?
            };
            if spline.as_ref().map_or(0, |b| b.ncols()) != layout.spline_cols {
                return Err(ModelError::NewCovariateShapeMismatch {
                    param: k,
                    outcome: j,
                    expected: layout.num_cols(),
                    found: layout.ci() + cell.raw_cols() + spline.as_ref().map_or(0, |b| b.ncols()),
                });
            }
            let augmented = assemble(cell, layout.intercept, spline.as_ref().map(|b| b.view()), rows);
            Ok(normalize(augmented, layout))
        })
    }

    /// Post-augmentation covariate counts, shape `(l, n)`.
    pub fn covariate_counts(&self) -> Array2<usize> {
        let (l, n) = self.cells.shape();
        Array2::from_shape_fn((l, n), |(k, j)| self.cells[(k, j)].num_cols())
    }
}

fn check_training_cell(
    k: usize, j: usize, cell: &CovariateCell, declared: usize, rows: usize,
) -> ModelResult<()> {
    match cell {
        CovariateCell::Matrix(x) => {
            if x.dim() != (rows, declared) {
                return Err(ModelError::CovariateShapeMismatch {
                    param: k,
                    outcome: j,
                    expected: (rows, declared),
                    found: x.dim(),
                });
            }
            check_finite(k, j, x.view(), 0)
        }
        CovariateCell::InterceptOnly | CovariateCell::Unused => {
            if declared != 0 {
                return Err(ModelError::CovariateShapeMismatch {
                    param: k,
                    outcome: j,
                    expected: (rows, declared),
                    found: (rows, 0),
                });
            }
            Ok(())
        }
    }
}

fn check_new_cell(
    k: usize, j: usize, cell: &CovariateCell, layout: &CellLayout, rows: usize,
) -> ModelResult<()> {
    if let CovariateCell::Matrix(x) = cell {
        if x.nrows() != rows {
            return Err(ModelError::NewRowCountMismatch {
                param: k,
                outcome: j,
                expected: rows,
                found: x.nrows(),
            });
        }
    }
    if cell.raw_cols() != layout.raw_cols {
        return Err(ModelError::NewCovariateShapeMismatch {
            param: k,
            outcome: j,
            expected: layout.num_cols(),
            found: layout.ci() + cell.raw_cols() + layout.spline_cols,
        });
    }
    if let CovariateCell::Matrix(x) = cell {
        check_finite(k, j, x.view(), layout.ci())?;
    }
    Ok(())
}

fn check_finite(k: usize, j: usize, x: ArrayView2<f64>, col_offset: usize) -> ModelResult<()> {
    for ((row, col), &value) in x.indexed_iter() {
        if !value.is_finite() {
            return Err(ModelError::NonFiniteCovariate {
                param: k,
                outcome: j,
                row,
                col: col + col_offset,
                value,
            });
        }
    }
    Ok(())
}

fn build_bases(
    splines: Option<&SplineInputs>, shape: (usize, usize), rows: usize,
) -> ModelResult<Grid<Vec<Arc<dyn SplineBasis>>>> {
    let Some(inputs) = splines else {
        return Ok(Grid::from_fn(shape.0, shape.1, |_, _| Vec::new()));
    };
    if inputs.specs.shape() != shape {
        return Err(ModelError::SplineGridMismatch { expected: shape, found: inputs.specs.shape() });
    }
    inputs.specs.try_map(|(k, j), specs| {
        specs
            .iter()
            .map(|spec| {
                if spec.variable.len() != rows {
                    return Err(ModelError::SplineRowMismatch {
                        param: k,
                        outcome: j,
                        expected: rows,
                        found: spec.variable.len(),
                    });
                }
                inputs.factory.build(spec)
            })
            .collect()
    })
}

/// Spline design columns of one cell (first basis column dropped), or
/// `None` when the cell has no spline terms.
fn spline_columns(
    k: usize, j: usize, bases: &[Arc<dyn SplineBasis>], vars: &[ArrayView1<'_, f64>], rows: usize,
) -> ModelResult<Option<Array2<f64>>> {
    if bases.is_empty() {
        return Ok(None);
    }
    let mut blocks = Vec::with_capacity(bases.len());
    for (basis, var) in bases.iter().zip(vars) {
        let full = basis.design_matrix(*var)?;
        if full.nrows() != rows {
            return Err(ModelError::SplineRowMismatch {
                param: k,
                outcome: j,
                expected: rows,
                found: full.nrows(),
            });
        }
        if full.ncols() == 0 {
            return Err(ModelError::SplineBasis {
                reason: format!("empty design matrix for (param {k}, outcome {j})"),
            });
        }
        blocks.push(full.slice(s![.., 1..]).to_owned());
    }
    let width: usize = blocks.iter().map(Array2::ncols).sum();
    let mut out = Array2::<f64>::zeros((rows, width));
    let mut start = 0;
    for block in &blocks {
        out.slice_mut(s![.., start..start + block.ncols()]).assign(block);
        start += block.ncols();
    }
    Ok(Some(out))
}

/// `[intercept?] [raw] [spline]`, in the input row order of `cell`.
fn assemble(
    cell: &CovariateCell, intercept: bool, spline: Option<ArrayView2<f64>>, rows: usize,
) -> Array2<f64> {
    let ci = usize::from(intercept);
    let raw = cell.raw_cols();
    let spline_cols = spline.as_ref().map_or(0, |b| b.ncols());
    let mut out = Array2::<f64>::zeros((rows, ci + raw + spline_cols));
    if intercept {
        out.column_mut(0).fill(1.0);
    }
    if let CovariateCell::Matrix(x) = cell {
        out.slice_mut(s![.., ci..ci + raw]).assign(x);
    }
    if let Some(block) = spline {
        out.slice_mut(s![.., ci + raw..]).assign(&block);
    }
    out
}

/// Column mean and population std, skipping the first `ci` columns.
fn column_stats(
    x: ArrayView2<f64>, ci: usize, mut on_constant: impl FnMut(usize),
) -> (Array1<f64>, Array1<f64>) {
    let cols = x.ncols();
    let mut mean = Array1::<f64>::zeros(cols);
    let mut std = Array1::<f64>::ones(cols);
    for col in ci..cols {
        let column = x.column(col);
        let mu = column.mean().unwrap_or(0.0);
        let sigma = column.std(0.0);
        if sigma <= ZERO_STD_TOL * mu.abs().max(1.0) {
            on_constant(col);
        } else {
            mean[col] = mu;
            std[col] = sigma;
        }
    }
    (mean, std)
}

fn normalize(mut x: Array2<f64>, layout: &CellLayout) -> Array2<f64> {
    x -= &layout.mean;
    x /= &layout.std;
    x
}

fn grid_from_rows<T>(rows: Vec<Vec<T>>, shape: (usize, usize)) -> ModelResult<Grid<T>> {
    Grid::from_rows(rows).ok_or(ModelError::CovariateGridMismatch { expected: shape, found: shape })
}
