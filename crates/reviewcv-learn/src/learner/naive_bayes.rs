//! Naive Bayes classifiers over count and binary features

use reviewcv_data::vectorizer::FeatureMatrix;

use super::{
    BoxedLearner, Coefficients, FitError, Fittable, IncrementallyFittable, Introspectable,
    IntrospectionError, Learner, LearnerKind, accuracy_of, argmax, check_features, check_lengths,
    class_index,
};
use crate::params::{ParamError, ParamSet};

const MIN_ALPHA: f64 = 1e-10;

fn smoothing(learner: &'static str, params: &ParamSet) -> Result<f64, ParamError> {
    let alpha = params.float(learner, "alpha", 1.0)?;
    if alpha < 0.0 {
        return Err(ParamError::Invalid {
            learner,
            name: "alpha".to_owned(),
            value: format!("{alpha:?}"),
            expected: "a non-negative number",
        });
    }
    Ok(alpha.max(MIN_ALPHA))
}

/// Per-class sample counts and per-class feature totals.
#[derive(Debug, Clone, Default)]
struct Counts {
    classes: Vec<f64>,
    class_counts: Vec<f64>,
    feature_counts: Vec<Vec<f64>>,
}

impl Counts {
    fn new(classes: &[f64]) -> Self {
        Self {
            classes: classes.to_vec(),
            ..Self::default()
        }
    }

    fn is_fitted(&self) -> bool {
        self.class_counts.iter().any(|&c| c > 0.0)
    }

    fn n_features(&self) -> Option<usize> {
        self.feature_counts.first().map(Vec::len)
    }

    fn reset(&mut self, n_features: usize) {
        self.class_counts = vec![0.0; self.classes.len()];
        self.feature_counts = vec![vec![0.0; n_features]; self.classes.len()];
    }

    /// Validates a batch and prepares storage, returning the class index of
    /// every sample.
    fn prepare(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<Vec<usize>, FitError> {
        check_lengths(x, y)?;
        let targets = y
            .iter()
            .map(|&label| class_index(&self.classes, label))
            .collect::<Result<Vec<_>, _>>()?;
        match self.n_features() {
            Some(n) => check_features(n, x)?,
            None => self.reset(x.n_cols()),
        }
        Ok(targets)
    }

    fn add<F>(&mut self, x: &FeatureMatrix, targets: &[usize], mut feature_value: F)
    where
        F: FnMut(f64) -> f64,
    {
        for (row, &k) in targets.iter().enumerate() {
            self.class_counts[k] += 1.0;
            for (col, value) in x.row(row) {
                self.feature_counts[k][col] += feature_value(value);
            }
        }
    }

    fn log_priors(&self) -> Vec<f64> {
        let total = self.class_counts.iter().sum::<f64>();
        self.class_counts.iter().map(|c| (c / total).ln()).collect()
    }

    /// Predicts the class with the highest joint log likelihood.
    fn predict<F>(&self, x: &FeatureMatrix, mut joint_log_likelihood: F) -> Vec<f64>
    where
        F: FnMut(usize, usize) -> f64,
    {
        (0..x.n_rows())
            .map(|row| {
                let scores = (0..self.classes.len()).map(|k| joint_log_likelihood(k, row));
                argmax(scores.collect::<Vec<_>>()).map_or(f64::NAN, |k| self.classes[k])
            })
            .collect()
    }

    fn coefficients(&self, feature_log_prob: &[Vec<f64>]) -> Vec<Coefficients> {
        self.classes
            .iter()
            .zip(feature_log_prob)
            .map(|(&class, values)| Coefficients {
                class: Some(class),
                values: values.clone(),
            })
            .collect()
    }
}

const MULTINOMIAL: &str = "MultinomialNB";

/// Multinomial naive Bayes for non-negative count features.
#[derive(Debug, Clone)]
pub struct MultinomialNb {
    params: ParamSet,
    alpha: f64,
    counts: Counts,
}

impl MultinomialNb {
    pub fn new(params: &ParamSet, classes: &[f64]) -> Result<Self, FitError> {
        params.check_names(MULTINOMIAL, &["alpha"])?;
        Ok(Self {
            params: params.clone(),
            alpha: smoothing(MULTINOMIAL, params)?,
            counts: Counts::new(classes),
        })
    }

    /// `log P(feature | class)` with additive smoothing.
    #[expect(clippy::cast_precision_loss)]
    fn feature_log_prob(&self) -> Vec<Vec<f64>> {
        self.counts
            .feature_counts
            .iter()
            .map(|fc| {
                let total = fc.iter().sum::<f64>() + self.alpha * fc.len() as f64;
                fc.iter().map(|c| ((c + self.alpha) / total).ln()).collect()
            })
            .collect()
    }
}

impl Fittable for MultinomialNb {
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError> {
        self.counts = Counts::new(&self.counts.classes);
        self.partial_fit(x, y)
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, FitError> {
        if !self.counts.is_fitted() {
            return Err(FitError::NotFitted {
                learner: MULTINOMIAL,
            });
        }
        check_features(self.counts.n_features().unwrap_or_default(), x)?;
        let priors = self.counts.log_priors();
        let log_prob = self.feature_log_prob();
        Ok(self.counts.predict(x, |k, row| {
            priors[k]
                + x.row(row)
                    .map(|(col, value)| value * log_prob[k][col])
                    .sum::<f64>()
        }))
    }

    fn default_score(&self, x: &FeatureMatrix, y: &[f64]) -> Result<f64, FitError> {
        Ok(accuracy_of(&self.predict(x)?, y))
    }
}

impl IncrementallyFittable for MultinomialNb {
    fn partial_fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError> {
        if (0..x.n_rows()).any(|row| x.row(row).any(|(_, v)| v < 0.0)) {
            return Err(FitError::NegativeFeature {
                learner: MULTINOMIAL,
            });
        }
        let targets = self.counts.prepare(x, y)?;
        self.counts.add(x, &targets, |v| v);
        Ok(())
    }
}

impl Introspectable for MultinomialNb {
    fn coefficients(&self) -> Result<Vec<Coefficients>, IntrospectionError> {
        if !self.counts.is_fitted() {
            return Err(IntrospectionError::NotFitted {
                learner: MULTINOMIAL,
            });
        }
        Ok(self.counts.coefficients(&self.feature_log_prob()))
    }
}

impl Learner for MultinomialNb {
    fn kind(&self) -> LearnerKind {
        LearnerKind::MultinomialNb
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

    fn introspectable(&self) -> Option<&dyn Introspectable> {
        Some(self)
    }
}

const BERNOULLI: &str = "BernoulliNB";

/// Bernoulli naive Bayes: features are reduced to present/absent by
/// comparing them with `binarize`.
#[derive(Debug, Clone)]
pub struct BernoulliNb {
    params: ParamSet,
    alpha: f64,
    binarize: f64,
    counts: Counts,
}

impl BernoulliNb {
    pub fn new(params: &ParamSet, classes: &[f64]) -> Result<Self, FitError> {
        params.check_names(BERNOULLI, &["alpha", "binarize"])?;
        Ok(Self {
            params: params.clone(),
            alpha: smoothing(BERNOULLI, params)?,
            binarize: params.float(BERNOULLI, "binarize", 0.0)?,
            counts: Counts::new(classes),
        })
    }

    /// `log P(feature present | class)` with additive smoothing.
    fn feature_log_prob(&self) -> Vec<Vec<f64>> {
        self.counts
            .feature_counts
            .iter()
            .zip(&self.counts.class_counts)
            .map(|(fc, cc)| {
                let total = cc + 2.0 * self.alpha;
                fc.iter().map(|c| ((c + self.alpha) / total).ln()).collect()
            })
            .collect()
    }
}

impl Fittable for BernoulliNb {
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError> {
        self.counts = Counts::new(&self.counts.classes);
        self.partial_fit(x, y)
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, FitError> {
        if !self.counts.is_fitted() {
            return Err(FitError::NotFitted { learner: BERNOULLI });
        }
        check_features(self.counts.n_features().unwrap_or_default(), x)?;
        let priors = self.counts.log_priors();
        let log_prob = self.feature_log_prob();
        let log_neg_prob = log_prob
            .iter()
            .map(|lp| lp.iter().map(|p| (-p.exp()).ln_1p()).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        let absent_sums = log_neg_prob
            .iter()
            .map(|lnp| lnp.iter().sum::<f64>())
            .collect::<Vec<_>>();
        Ok(self.counts.predict(x, |k, row| {
            let present = x
                .row(row)
                .filter(|&(_, value)| value > self.binarize)
                .map(|(col, _)| log_prob[k][col] - log_neg_prob[k][col])
                .sum::<f64>();
            priors[k] + absent_sums[k] + present
        }))
    }

    fn default_score(&self, x: &FeatureMatrix, y: &[f64]) -> Result<f64, FitError> {
        Ok(accuracy_of(&self.predict(x)?, y))
    }
}

impl IncrementallyFittable for BernoulliNb {
    fn partial_fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError> {
        let targets = self.counts.prepare(x, y)?;
        let binarize = self.binarize;
        self.counts
            .add(x, &targets, |v| if v > binarize { 1.0 } else { 0.0 });
        Ok(())
    }
}

impl Introspectable for BernoulliNb {
    fn coefficients(&self) -> Result<Vec<Coefficients>, IntrospectionError> {
        if !self.counts.is_fitted() {
            return Err(IntrospectionError::NotFitted { learner: BERNOULLI });
        }
        Ok(self.counts.coefficients(&self.feature_log_prob()))
    }
}

impl Learner for BernoulliNb {
    fn kind(&self) -> LearnerKind {
        LearnerKind::BernoulliNb
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

    fn introspectable(&self) -> Option<&dyn Introspectable> {
        Some(self)
    }
}
