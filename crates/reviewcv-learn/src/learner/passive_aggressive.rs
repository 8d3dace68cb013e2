use rand::{SeedableRng as _, seq::SliceRandom as _};
use rand_pcg::Pcg64;
use reviewcv_data::vectorizer::FeatureMatrix;
use reviewcv_stats::metrics;

use super::{
    BoxedLearner, FitError, Fittable, IncrementallyFittable, Learner, LearnerKind, check_features,
    check_lengths,
};
use crate::{params::ParamSet, weights::WeightVector};

const NAME: &str = "PassiveAggressiveRegressor";
const PARAMS: &[&str] = &["C", "epsilon", "loss", "n_iter", "random_state"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Loss {
    /// PA-I: the step is capped at `C`.
    EpsilonInsensitive,
    /// PA-II: `C` acts as a soft penalty on the step.
    SquaredEpsilonInsensitive,
}

/// Online linear regressor.
///
/// Samples predicted within `epsilon` of their label leave the model
/// untouched; others move the weights just far enough to fix the error,
/// bounded by the aggressiveness parameter `C`.
#[derive(Debug, Clone)]
pub struct PassiveAggressiveRegressor {
    params: ParamSet,
    c: f64,
    epsilon: f64,
    loss: Loss,
    n_iter: usize,
    random_state: u64,
    weights: Option<WeightVector>,
    intercept: f64,
}

impl PassiveAggressiveRegressor {
    pub fn new(params: &ParamSet) -> Result<Self, FitError> {
        params.check_names(NAME, PARAMS)?;
        let loss = match params.choice(
            NAME,
            "loss",
            &["epsilon_insensitive", "squared_epsilon_insensitive"],
            "epsilon_insensitive",
        )? {
            "squared_epsilon_insensitive" => Loss::SquaredEpsilonInsensitive,
            _ => Loss::EpsilonInsensitive,
        };
        Ok(Self {
            params: params.clone(),
            c: params.float(NAME, "C", 1.0)?,
            epsilon: params.float(NAME, "epsilon", 0.1)?,
            loss,
            n_iter: params.count(NAME, "n_iter", 5)?,
            random_state: params.count(NAME, "random_state", 0)? as u64,
            weights: None,
            intercept: 0.0,
        })
    }

    fn step_size(&self, loss: f64, norm_squared: f64) -> f64 {
        match self.loss {
            Loss::EpsilonInsensitive if norm_squared == 0.0 => self.c,
            Loss::EpsilonInsensitive => self.c.min(loss / norm_squared),
            Loss::SquaredEpsilonInsensitive => loss / (norm_squared + 1.0 / (2.0 * self.c)),
        }
    }

    fn epoch(&mut self, x: &FeatureMatrix, y: &[f64], order: &[usize]) {
        for &row in order {
            let Some(w) = &self.weights else {
                return;
            };
            let error = y[row] - (w.dot_row(x, row) + self.intercept);
            let loss = error.abs() - self.epsilon;
            if loss <= 0.0 {
                continue;
            }
            // The intercept is an implicit feature fixed at 1.
            let tau = self.step_size(loss, x.row_norm_squared(row) + 1.0);
            let update = tau * error.signum();
            if let Some(w) = &mut self.weights {
                w.add_row(x, row, update);
            }
            self.intercept += update;
        }
    }

    fn prepare(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError> {
        check_lengths(x, y)?;
        match &self.weights {
            Some(w) => check_features(w.len(), x),
            None => {
                self.weights = Some(WeightVector::zeros(x.n_cols()));
                self.intercept = 0.0;
                Ok(())
            }
        }
    }
}

impl Fittable for PassiveAggressiveRegressor {
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError> {
        self.weights = None;
        self.prepare(x, y)?;
        let mut rng = Pcg64::seed_from_u64(self.random_state);
        let mut order = (0..x.n_rows()).collect::<Vec<_>>();
        for _ in 0..self.n_iter {
            order.shuffle(&mut rng);
            self.epoch(x, y, &order);
        }
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, FitError> {
        let Some(w) = &self.weights else {
            return Err(FitError::NotFitted { learner: NAME });
        };
        check_features(w.len(), x)?;
        Ok((0..x.n_rows())
            .map(|row| w.dot_row(x, row) + self.intercept)
            .collect())
    }

    /// R² of the predictions.
    fn default_score(&self, x: &FeatureMatrix, y: &[f64]) -> Result<f64, FitError> {
        let predicted = self.predict(x)?;
        Ok(metrics::r2_score(y, &predicted).unwrap_or(0.0))
    }
}

impl IncrementallyFittable for PassiveAggressiveRegressor {
    fn partial_fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError> {
        self.prepare(x, y)?;
        let order = (0..x.n_rows()).collect::<Vec<_>>();
        self.epoch(x, y, &order);
        Ok(())
    }
}

impl Learner for PassiveAggressiveRegressor {
    fn kind(&self) -> LearnerKind {
        LearnerKind::PassiveAggressiveRegressor
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn clone_boxed(&self) -> BoxedLearner {
        Box::new(self.clone())
    }

    fn incremental(&mut self) -> Option<&mut dyn IncrementallyFittable> {
        Some(self)
    }
}
