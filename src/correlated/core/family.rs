//! Outcome-model capability injected into the correlated model.
//!
//! A concrete distribution supplies its inverse links, its elementwise
//! negative log-likelihood and, when prediction is needed, the mapping from
//! parameters to mean outcomes. The engine is generic over this trait and
//! never ships a family of its own.
use ndarray::{Array2, ArrayView2, ArrayView3};

use crate::correlated::errors::{ModelError, ModelResult};

/// Distribution capability for `CorrelatedModel`.
///
/// Required:
/// - `num_params()`: number `l` of distribution parameters; must match the
///   `l` the model is built with.
/// - `inverse_link(k, eta)`: link for parameter `k`, applied elementwise to
///   the linear predictor.
/// - `neg_log_likelihood(y, p)`: elementwise negative log-likelihood of the
///   `m × n` observations given the `(l, m, n)` parameter tensor; must return
///   an `m × n` array.
///
/// Optional:
/// - `mean_outcome(p)`: expected outcomes for prediction. The default fails
///   with [`ModelError::MeanOutcomeUnavailable`].
/// - `model_type()` / `parameter_names()`: labels used by the summary.
pub trait OutcomeModel {
    fn num_params(&self) -> usize;

    fn inverse_link(&self, k: usize, eta: f64) -> f64;

    fn neg_log_likelihood(&self, y: ArrayView2<f64>, p: ArrayView3<f64>) -> Array2<f64>;

    fn mean_outcome(&self, _p: ArrayView3<f64>) -> ModelResult<Array2<f64>> {
        Err(ModelError::MeanOutcomeUnavailable)
    }

    fn model_type(&self) -> &str {
        "correlated model"
    }

    fn parameter_names(&self) -> Vec<String> {
        (0..self.num_params()).map(|k| format!("parameter {k}")).collect()
    }
}
