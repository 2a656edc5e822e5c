//! Correlated mixed model: state, objective, prediction and summary.
//!
//! [`CorrelatedModel`] owns the validated data, the fitted state
//! (`beta`, `U`, `D`, `P`) and the injected outcome model. The state only
//! changes through [`CorrelatedModel::update_params`] and the block driver
//! (`optimize_params`, in `models::driver`), and every update is checked
//! before it is committed, so a failed call leaves the model untouched.
//!
//! Prediction reuses the fit-time design: intercepts and spline columns are
//! re-added, the stored normalization is applied, group ids are resolved
//! against the fitted groups (unseen groups get a zero random effect), and
//! the outcome model maps the resulting parameters to mean outcomes.
use std::{fmt, io, sync::Arc};

use log::Level;
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis, s};

use crate::correlated::{
    core::{
        covariates::CovariateGrid,
        data::{ModelData, ModelInputs, offsets_matrix},
        family::OutcomeModel,
        grid::Grid,
        groups::{GroupResolution, gather_random_effects, resolve_groups},
        likelihood::{LikelihoodTerms, check_covariance, data_term, prior_penalty},
        observer::{FitObserver, LogObserver},
        options::ModelOptions,
        params::{self, Beta, check_finite_p, zero_beta},
    },
    errors::{ModelError, ModelResult},
};

/// New rows for [`CorrelatedModel::predict`].
///
/// - `x`: raw covariates without intercept or spline columns.
/// - `spline_vars`: per cell, one vector per fitted spline term.
/// - `group_ids`: `None` treats every row as its own unseen group.
/// - `offsets`: `None` (or a `None` entry) means ones.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub rows: usize,
    pub x: CovariateGrid,
    pub spline_vars: Option<Grid<Vec<Array1<f64>>>>,
    pub group_ids: Option<Vec<i64>>,
    pub offsets: Option<Vec<Option<Array1<f64>>>>,
}

impl PredictRequest {
    pub fn new(rows: usize, x: CovariateGrid) -> Self {
        Self { rows, x, spline_vars: None, group_ids: None, offsets: None }
    }

    pub fn with_group_ids(mut self, group_ids: Vec<i64>) -> Self {
        self.group_ids = Some(group_ids);
        self
    }

    pub fn with_offsets(mut self, offsets: Vec<Option<Array1<f64>>>) -> Self {
        self.offsets = Some(offsets);
        self
    }

    pub fn with_spline_vars(mut self, spline_vars: Grid<Vec<Array1<f64>>>) -> Self {
        self.spline_vars = Some(spline_vars);
        self
    }
}

/// Multi-outcome mixed-effects model over an injected [`OutcomeModel`].
///
/// State after construction: `beta = 0`, `U = 0` with shape
/// `(l, groups, n)`, `D[k] = I_n`, and `P` computed from that state.
#[derive(Clone)]
pub struct CorrelatedModel<M: OutcomeModel> {
    pub(crate) outcome: M,
    pub(crate) data: ModelData,
    pub(crate) options: ModelOptions,
    pub(crate) beta: Beta,
    pub(crate) u: Array3<f64>,
    pub(crate) d: Array3<f64>,
    pub(crate) p: Array3<f64>,
    pub(crate) observer: Arc<dyn FitObserver>,
}

impl<M: OutcomeModel> fmt::Debug for CorrelatedModel<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelatedModel")
            .field("model_type", &self.outcome.model_type())
            .field("m", &self.data.m)
            .field("n", &self.data.n)
            .field("l", &self.data.l)
            .field("num_groups", &self.data.num_groups())
            .finish_non_exhaustive()
    }
}

impl<M: OutcomeModel> CorrelatedModel<M> {
    /// Build a model that reports through [`LogObserver`].
    ///
    /// See [`CorrelatedModel::with_observer`].
    pub fn new(outcome: M, inputs: &ModelInputs, options: ModelOptions) -> ModelResult<Self> {
        Self::with_observer(outcome, inputs, options, Arc::new(LogObserver))
    }

    /// Validate inputs, canonicalize covariates and initialize the state.
    ///
    /// Errors
    /// ------
    /// - Every construction error of `ModelData::new`.
    /// - `LinkCountMismatch` if `outcome.num_params() != inputs.l`.
    /// - `NonFiniteParameter` if the links are not finite at zero effects.
    pub fn with_observer(
        outcome: M, inputs: &ModelInputs, options: ModelOptions, observer: Arc<dyn FitObserver>,
    ) -> ModelResult<Self> {
        observer.notify(Level::Info, "checking model inputs...");
        let data = ModelData::new(inputs, &options)?;
        if outcome.num_params() != data.l {
            return Err(ModelError::LinkCountMismatch { expected: data.l, found: outcome.num_params() });
        }
        observer.notify(
            Level::Info,
            &format!(
                "...passed: {} individuals, {} outcomes, {} parameters, {} groups",
                data.m,
                data.n,
                data.l,
                data.num_groups()
            ),
        );
        for &(k, j, col) in &data.design.zero_variance {
            observer.notify(
                Level::Warn,
                &format!(
                    "covariate column {col} of (param {k}, outcome {j}) has zero variance; \
                     it is left unnormalized"
                ),
            );
        }

        let (l, n, g) = (data.l, data.n, data.num_groups());
        let beta = zero_beta(&data.x);
        let u = Array3::<f64>::zeros((l, g, n));
        let mut d = Array3::<f64>::zeros((l, n, n));
        for mut d_k in d.outer_iter_mut() {
            d_k.diag_mut().fill(1.0);
        }
        let p = params::compute_p(&data.x, &beta, u.view(), &data.group_sizes, data.offsets.view(), &outcome)?;

        Ok(Self { outcome, data, options, beta, u, d, p, observer })
    }

    /// Replace the observer (e.g. to silence a refit).
    pub fn set_observer(&mut self, observer: Arc<dyn FitObserver>) {
        self.observer = observer;
    }

    pub fn outcome(&self) -> &M {
        &self.outcome
    }

    pub fn data(&self) -> &ModelData {
        &self.data
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    pub fn beta(&self) -> &Beta {
        &self.beta
    }

    pub fn u(&self) -> &Array3<f64> {
        &self.u
    }

    pub fn d(&self) -> &Array3<f64> {
        &self.d
    }

    pub fn p(&self) -> &Array3<f64> {
        &self.p
    }

    pub(crate) fn notify(&self, level: Level, message: &str) {
        self.observer.notify(level, message);
    }

    /// Overwrite any subset of the state and refresh `P`.
    ///
    /// If `p` is given it replaces `P` as-is (after shape and finiteness
    /// checks); otherwise `P` is recomputed from the updated `beta` and `U`.
    /// Nothing is written unless every check passes.
    ///
    /// Errors
    /// ------
    /// `CoefficientShapeMismatch`, `RandomEffectShapeMismatch`,
    /// `CovarianceShapeMismatch`, `NonFiniteCovariance`,
    /// `ParameterShapeMismatch`, `NonFiniteParameter`.
    pub fn update_params(
        &mut self, beta: Option<Beta>, u: Option<Array3<f64>>, d: Option<Array3<f64>>,
        p: Option<Array3<f64>>,
    ) -> ModelResult<()> {
        let (m, n, l) = (self.data.m, self.data.n, self.data.l);
        if let Some(d) = &d {
            check_covariance(d.view(), l, n)?;
        }
        let new_p = match p {
            Some(p) => {
                if p.dim() != (l, m, n) {
                    return Err(ModelError::ParameterShapeMismatch { expected: (l, m, n), found: p.dim() });
                }
                check_finite_p(p.view())?;
                self.check_beta(beta.as_ref().unwrap_or(&self.beta))?;
                self.check_u(u.as_ref().map_or(self.u.view(), |u| u.view()))?;
                p
            }
            None => self.compute_p(
                beta.as_ref().unwrap_or(&self.beta),
                u.as_ref().map_or(self.u.view(), |u| u.view()),
            )?,
        };

        if let Some(beta) = beta {
            self.beta = beta;
        }
        if let Some(u) = u {
            self.u = u;
        }
        if let Some(d) = d {
            self.d = d;
        }
        self.p = new_p;
        Ok(())
    }

    /// Parameter tensor of the training rows for the given effects.
    pub fn compute_p(&self, beta: &Beta, u: ArrayView3<f64>) -> ModelResult<Array3<f64>> {
        params::compute_p(
            &self.data.x,
            beta,
            u,
            &self.data.group_sizes,
            self.data.offsets.view(),
            &self.outcome,
        )
    }

    /// Data term and prior penalty; `None` arguments use the fitted state.
    pub fn likelihood_terms<'a>(
        &'a self, beta: Option<&'a Beta>, u: Option<ArrayView3<'a, f64>>,
        d: Option<ArrayView3<'a, f64>>,
    ) -> ModelResult<LikelihoodTerms> {
        let u = u.unwrap_or_else(|| self.u.view());
        let d = d.unwrap_or_else(|| self.d.view());
        let p = self.compute_p(beta.unwrap_or(&self.beta), u)?;
        let nll = self.outcome.neg_log_likelihood(self.data.y.view(), p.view());
        let data = data_term(nll.view(), self.data.weights.view())?;
        let penalty = prior_penalty(u, d)?;
        Ok(LikelihoodTerms { data, penalty })
    }

    /// Penalized negative log-likelihood; `None` arguments use the fitted
    /// state.
    ///
    /// Errors
    /// ------
    /// Parameter engine errors, `NonFiniteLikelihood`, `ObjectiveShapeMismatch`
    /// and covariance errors.
    pub fn neg_log_likelihood<'a>(
        &'a self, beta: Option<&'a Beta>, u: Option<ArrayView3<'a, f64>>,
        d: Option<ArrayView3<'a, f64>>,
    ) -> ModelResult<f64> {
        self.likelihood_terms(beta, u, d).map(|terms| terms.total())
    }

    /// Parameter tensor `(l, rows, n)` for new, already canonical rows.
    ///
    /// `x` must carry the fitted column layout (intercept, raw, spline) and
    /// the stored normalization. Rows are returned in the caller's order.
    /// Groups seen at fit time reuse their fitted random effects; unseen
    /// groups get zero. `beta` is reused unchanged.
    ///
    /// With `group_ids = None` every row is its own unseen group, so no
    /// fitted random effect is applied (training ids are never assumed).
    ///
    /// Errors
    /// ------
    /// `CovariateGridMismatch`, `NewRowCountMismatch`,
    /// `NewCovariateShapeMismatch`, `GroupIdLengthMismatch`,
    /// `OffsetShapeMismatch`, `NonFiniteParameter`.
    pub fn compute_new_p(
        &self, x: &Grid<Array2<f64>>, group_ids: Option<&[i64]>, offsets: ArrayView2<f64>,
    ) -> ModelResult<Array3<f64>> {
        let (l, n) = (self.data.l, self.data.n);
        let rows = offsets.ncols();
        if x.shape() != (l, n) {
            return Err(ModelError::CovariateGridMismatch { expected: (l, n), found: x.shape() });
        }
        for ((k, j), cell) in x.iter() {
            if cell.nrows() != rows {
                return Err(ModelError::NewRowCountMismatch {
                    param: k,
                    outcome: j,
                    expected: rows,
                    found: cell.nrows(),
                });
            }
            if cell.ncols() != self.data.d[[k, j]] {
                return Err(ModelError::NewCovariateShapeMismatch {
                    param: k,
                    outcome: j,
                    expected: self.data.d[[k, j]],
                    found: cell.ncols(),
                });
            }
        }
        let resolution = match group_ids {
            Some(ids) if ids.len() != rows => {
                return Err(ModelError::GroupIdLengthMismatch { expected: rows, found: ids.len() });
            }
            Some(ids) => resolve_groups(&self.data.unique_group_ids, ids),
            None => GroupResolution::all_synthetic(rows),
        };
        self.notify(
            Level::Debug,
            &format!(
                "resolved {} groups for prediction, {} unseen",
                resolution.sizes.len(),
                resolution.num_synthetic()
            ),
        );

        let sorted_x = x.map(|_, cell| cell.select(Axis(0), &resolution.order));
        let sorted_offsets = offsets.select(Axis(1), &resolution.order);
        let u = gather_random_effects(self.u.view(), &resolution.indices);
        let p = params::compute_p(
            &sorted_x,
            &self.beta,
            u.view(),
            &resolution.sizes,
            sorted_offsets.view(),
            &self.outcome,
        )?;
        Ok(p.select(Axis(1), &resolution.inverse))
    }

    /// Predicted mean outcomes `(rows, n)` for new raw covariates.
    ///
    /// Errors
    /// ------
    /// Design errors from the stored covariate transform, the errors of
    /// [`CorrelatedModel::compute_new_p`], and whatever
    /// `OutcomeModel::mean_outcome` returns (by default
    /// `MeanOutcomeUnavailable`).
    pub fn predict(&self, request: &PredictRequest) -> ModelResult<Array2<f64>> {
        if self.options.add_intercepts {
            self.notify(
                Level::Info,
                "adding an intercept because it was added in the original model",
            );
        }
        let rows = request.rows;
        let x = self.data.design.transform(&request.x, request.spline_vars.as_ref(), rows)?;
        let offsets = offsets_matrix(request.offsets.as_deref(), self.data.l, rows)?;
        let p = self.compute_new_p(&x, request.group_ids.as_deref(), offsets.view())?;
        self.outcome.mean_outcome(p.view())
    }

    /// Write a human-readable summary of the fitted model.
    ///
    /// Fixed effects are shown on the original covariate scale
    /// (`beta / std`, spline coefficients omitted) and through the inverse
    /// link; random effects are listed per parameter and group.
    pub fn summarize<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        const RULE: &str = "------------------------------------------";
        let names = self.parameter_names();
        writeln!(out, "MODEL SUMMARY FOR {}", self.outcome.model_type().to_uppercase())?;
        writeln!(out, "{RULE}")?;
        writeln!(out, "NUM OBSERVATIONS: {}", self.data.m)?;
        writeln!(out, "NUM OUTCOMES: {}", self.data.n)?;
        writeln!(out, "NUM PARAMETERS: {}", self.data.l)?;
        writeln!(out, "NUM GROUPS: {}", self.data.num_groups())?;
        writeln!(out, "{RULE}")?;
        writeln!(out, "FIXED EFFECTS")?;
        writeln!(out, "{RULE}")?;
        for transformed in [false, true] {
            writeln!(out, "{}", if transformed { "\nTRANSFORMED" } else { "UNTRANSFORMED" })?;
            for (k, name) in names.iter().enumerate() {
                writeln!(out, "\n{}", name.to_uppercase())?;
                for j in 0..self.data.n {
                    let layout = &self.data.design.cells[(k, j)];
                    let beta = &self.beta[(k, j)];
                    let link = |v: f64| if transformed { self.outcome.inverse_link(k, v) } else { v };
                    writeln!(out, "OUTCOME {j}")?;
                    if layout.intercept {
                        writeln!(
                            out,
                            "value for observations with average covariate values: {}",
                            link(beta[0])
                        )?;
                    }
                    let range = layout.raw_range();
                    let coefs: Array1<f64> = beta
                        .slice(s![range.clone()])
                        .iter()
                        .zip(layout.std.slice(s![range]))
                        .map(|(b, s)| link(b / s))
                        .collect();
                    writeln!(out, "estimated coefficients: {coefs}")?;
                }
            }
        }
        writeln!(out, "{RULE}")?;
        writeln!(out, "RANDOM EFFECTS")?;
        writeln!(out, "{RULE}")?;
        writeln!(out, "RANDOM EFFECTS VARIANCE-COVARIANCE MATRIX")?;
        for (k, name) in names.iter().enumerate() {
            writeln!(out, "\n{}", name.to_uppercase())?;
            writeln!(out, "{}", self.d.index_axis(Axis(0), k))?;
        }
        writeln!(out, "{RULE}")?;
        writeln!(out, "RANDOM EFFECTS BY GROUP")?;
        for (k, name) in names.iter().enumerate() {
            writeln!(out, "\n{}", name.to_uppercase())?;
            for (g, id) in self.data.unique_group_ids.iter().enumerate() {
                writeln!(out, "group id {id}: {}", self.u.slice(s![k, g, ..]))?;
            }
        }
        Ok(())
    }

    fn parameter_names(&self) -> Vec<String> {
        let mut names = self.outcome.parameter_names();
        names.truncate(self.data.l);
        for k in names.len()..self.data.l {
            names.push(format!("parameter {k}"));
        }
        names
    }

    fn check_beta(&self, beta: &Beta) -> ModelResult<()> {
        for ((k, j), cell) in self.data.x.iter() {
            let found = beta.get(k, j).map_or(0, Array1::len);
            if beta.shape() != self.data.x.shape() || found != cell.ncols() {
                return Err(ModelError::CoefficientShapeMismatch {
                    param: k,
                    outcome: j,
                    expected: cell.ncols(),
                    found,
                });
            }
        }
        Ok(())
    }

    fn check_u(&self, u: ArrayView3<f64>) -> ModelResult<()> {
        let expected = (self.data.l, self.data.num_groups(), self.data.n);
        if u.dim() != expected {
            return Err(ModelError::RandomEffectShapeMismatch { expected, found: u.dim() });
        }
        Ok(())
    }
}
