//! Learners and their capabilities.
//!
//! Every learner can be fitted from scratch and used for prediction
//! ([`Fittable`]). On top of that a learner may support:
//!
//! - [`IncrementallyFittable`]: updating an existing model with a new batch
//!   of samples, needed by the incremental cross-validation stage
//! - [`Introspectable`]: exposing per-feature coefficients, needed for
//!   feature weight reports
//!
//! Learners are handled as [`BoxedLearner`] trait objects. The capabilities a
//! learner lacks are reported by [`Learner::incremental`] and
//! [`Learner::introspectable`] returning `None`.
//!
//! # Available learners
//!
//! | Learner | Abbreviation | Incremental | Introspectable |
//! |---|---|---|---|
//! | [`Perceptron`] | `perc` | yes | yes |
//! | [`MultinomialNb`] | `mnb` | yes | yes |
//! | [`BernoulliNb`] | `bnb` | yes | yes |
//! | [`PassiveAggressiveRegressor`] | `pagr` | yes | no |
//! | [`MiniBatchKMeans`] | `mbkm` | yes | no |

use std::{fmt, str::FromStr};

use reviewcv_data::vectorizer::FeatureMatrix;
use serde::{Deserialize, Serialize};

use crate::params::{ParamError, ParamGrid, ParamSet, ParamValue};

pub use self::{
    kmeans::MiniBatchKMeans,
    naive_bayes::{BernoulliNb, MultinomialNb},
    passive_aggressive::PassiveAggressiveRegressor,
    perceptron::Perceptron,
};

mod kmeans;
mod naive_bayes;
mod passive_aggressive;
mod perceptron;

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum FitError {
    #[display("{_0}")]
    Param(ParamError),
    #[display("label {label} is not one of the known classes")]
    #[from(ignore)]
    UnknownLabel { label: f64 },
    #[display("feature matrix has {rows} rows but {labels} labels were given")]
    #[from(ignore)]
    LengthMismatch { rows: usize, labels: usize },
    #[display("expected {expected} features, got {found}")]
    #[from(ignore)]
    FeatureCountMismatch { expected: usize, found: usize },
    #[display("{learner} requires non-negative feature values")]
    #[from(ignore)]
    NegativeFeature { learner: &'static str },
    #[display("{learner} needs at least {needed} samples, got {found}")]
    #[from(ignore)]
    TooFewSamples {
        learner: &'static str,
        needed: usize,
        found: usize,
    },
    #[display("{learner} has not been fitted")]
    #[from(ignore)]
    NotFitted { learner: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum IntrospectionError {
    #[display("{learner} has not been fitted")]
    NotFitted { learner: &'static str },
}

/// Fitting from scratch and prediction.
pub trait Fittable {
    /// Discards any learned state and fits the model on `x` and `y`.
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError>;

    /// Predicts one value per row of `x`.
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, FitError>;

    /// Score used when no objective is configured: accuracy for classifiers,
    /// R² for regressors and negative inertia for clustering.
    fn default_score(&self, x: &FeatureMatrix, y: &[f64]) -> Result<f64, FitError>;
}

/// Updating a model with one more batch of samples.
pub trait IncrementallyFittable {
    fn partial_fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError>;
}

/// Coefficients of one output of a linear model.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    /// Class the coefficients score, if the model has one output per class.
    pub class: Option<f64>,
    pub values: Vec<f64>,
}

pub trait Introspectable {
    /// One set of per-feature coefficients per model output.
    fn coefficients(&self) -> Result<Vec<Coefficients>, IntrospectionError>;
}

pub trait Learner: Fittable + fmt::Debug + Send + Sync {
    fn kind(&self) -> LearnerKind;
    fn params(&self) -> &ParamSet;
    fn clone_boxed(&self) -> BoxedLearner;

    fn incremental(&mut self) -> Option<&mut dyn IncrementallyFittable> {
        None
    }

    fn introspectable(&self) -> Option<&dyn Introspectable> {
        None
    }
}

pub type BoxedLearner = Box<dyn Learner>;

impl Clone for BoxedLearner {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LearnerKind {
    Perceptron,
    #[serde(rename = "MultinomialNB")]
    MultinomialNb,
    #[serde(rename = "BernoulliNB")]
    BernoulliNb,
    PassiveAggressiveRegressor,
    MiniBatchKMeans,
}

impl LearnerKind {
    pub const ALL: [Self; 5] = [
        Self::Perceptron,
        Self::MultinomialNb,
        Self::BernoulliNb,
        Self::PassiveAggressiveRegressor,
        Self::MiniBatchKMeans,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Perceptron => "Perceptron",
            Self::MultinomialNb => "MultinomialNB",
            Self::BernoulliNb => "BernoulliNB",
            Self::PassiveAggressiveRegressor => "PassiveAggressiveRegressor",
            Self::MiniBatchKMeans => "MiniBatchKMeans",
        }
    }

    #[must_use]
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::Perceptron => "perc",
            Self::MultinomialNb => "mnb",
            Self::BernoulliNb => "bnb",
            Self::PassiveAggressiveRegressor => "pagr",
            Self::MiniBatchKMeans => "mbkm",
        }
    }

    /// Whether the learner's grid gets `batch_size` set to the number of
    /// grid search samples.
    #[must_use]
    pub const fn takes_batch_size(self) -> bool {
        matches!(self, Self::MiniBatchKMeans)
    }

    /// Whether built learners expose coefficients through
    /// [`Learner::introspectable`].
    #[must_use]
    pub const fn is_introspectable(self) -> bool {
        !matches!(self, Self::PassiveAggressiveRegressor | Self::MiniBatchKMeans)
    }

    /// Grid searched when none is configured.
    #[must_use]
    pub fn default_param_grid(self) -> ParamGrid {
        let floats = |values: &[f64]| -> Vec<ParamValue> {
            values.iter().map(|&v| ParamValue::Float(v)).collect()
        };
        let mut grid = ParamGrid::new();
        match self {
            Self::Perceptron => {
                grid.insert("alpha".into(), floats(&[0.0001, 0.001, 0.01, 0.1]));
                grid.insert("penalty".into(), vec!["l2".into()]);
            }
            Self::MultinomialNb | Self::BernoulliNb => {
                grid.insert("alpha".into(), floats(&[0.1, 0.25, 0.5, 0.75, 1.0]));
            }
            Self::PassiveAggressiveRegressor => {
                grid.insert("C".into(), floats(&[0.01, 0.1, 1.0, 10.0, 100.0]));
            }
            Self::MiniBatchKMeans => {
                grid.insert(
                    "n_clusters".into(),
                    (3..=6).map(ParamValue::Int).collect(),
                );
                grid.insert("init".into(), vec!["k-means++".into(), "random".into()]);
            }
        }
        grid
    }

    /// Creates an unfitted learner.
    ///
    /// `classes` is the sorted label domain; classifiers predict one of them.
    pub fn build(self, params: &ParamSet, classes: &[f64]) -> Result<BoxedLearner, FitError> {
        let learner: BoxedLearner = match self {
            Self::Perceptron => Box::new(Perceptron::new(params, classes)?),
            Self::MultinomialNb => Box::new(MultinomialNb::new(params, classes)?),
            Self::BernoulliNb => Box::new(BernoulliNb::new(params, classes)?),
            Self::PassiveAggressiveRegressor => Box::new(PassiveAggressiveRegressor::new(params)?),
            Self::MiniBatchKMeans => Box::new(MiniBatchKMeans::new(params)?),
        };
        Ok(learner)
    }
}

impl fmt::Display for LearnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unrecognized learner: {name}")]
pub struct UnknownLearnerError {
    pub name: String,
}

impl FromStr for LearnerKind {
    type Err = UnknownLearnerError;

    /// Accepts full names and abbreviations.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s || k.abbreviation() == s)
            .ok_or_else(|| UnknownLearnerError { name: s.to_owned() })
    }
}

/// Parses a comma-separated list of learner names or abbreviations, or
/// `all`. Duplicates are dropped, keeping the first occurrence.
pub fn parse_learners_string(learners: &str) -> Result<Vec<LearnerKind>, UnknownLearnerError> {
    if learners.trim() == "all" {
        return Ok(LearnerKind::ALL.to_vec());
    }
    let mut kinds = vec![];
    for name in learners.split(',').filter(|s| !s.trim().is_empty()) {
        let kind = name.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

fn check_lengths(x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError> {
    if x.n_rows() == y.len() {
        Ok(())
    } else {
        Err(FitError::LengthMismatch {
            rows: x.n_rows(),
            labels: y.len(),
        })
    }
}

fn check_features(expected: usize, x: &FeatureMatrix) -> Result<(), FitError> {
    if x.n_cols() == expected {
        Ok(())
    } else {
        Err(FitError::FeatureCountMismatch {
            expected,
            found: x.n_cols(),
        })
    }
}

/// Index of `label` in `classes`.
fn class_index(classes: &[f64], label: f64) -> Result<usize, FitError> {
    classes
        .iter()
        .position(|c| (c - label).abs() < 1e-9)
        .ok_or(FitError::UnknownLabel { label })
}

/// Index of the largest score; ties go to the lowest index.
fn argmax(scores: impl IntoIterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, score) in scores.into_iter().enumerate() {
        if best.is_none_or(|(_, b)| score > b) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

#[expect(clippy::cast_precision_loss)]
fn accuracy_of(predicted: &[f64], y: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(y)
        .filter(|(p, t)| (*p - *t).abs() < 1e-9)
        .count();
    correct as f64 / y.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        for kind in LearnerKind::ALL {
            assert_eq!(kind.name().parse::<LearnerKind>().unwrap(), kind);
            assert_eq!(kind.abbreviation().parse::<LearnerKind>().unwrap(), kind);
        }
        assert!("SVC".parse::<LearnerKind>().is_err());
    }

    #[test]
    fn test_parse_learners_string() {
        assert_eq!(
            parse_learners_string("bnb,Perceptron,bnb").unwrap(),
            vec![LearnerKind::BernoulliNb, LearnerKind::Perceptron]
        );
        assert_eq!(parse_learners_string("all").unwrap().len(), 5);
    }

    #[test]
    fn test_default_grids_build() {
        let classes = [1.0, 2.0, 3.0];
        for kind in LearnerKind::ALL {
            for params in crate::params::expand_grid(&kind.default_param_grid()) {
                let learner = kind.build(&params, &classes).unwrap();
                assert_eq!(learner.kind(), kind);
            }
        }
    }

    #[test]
    fn test_capabilities() {
        let classes = [1.0, 2.0];
        let params = ParamSet::new();
        for kind in LearnerKind::ALL {
            let mut learner = kind.build(&params, &classes).unwrap();
            assert!(learner.incremental().is_some());
            assert_eq!(learner.introspectable().is_some(), kind.is_introspectable());
        }
    }

    #[test]
    fn test_unknown_param_is_rejected() {
        let params = ParamSet::new().with("gamma", 1.0);
        assert!(matches!(
            LearnerKind::BernoulliNb.build(&params, &[1.0]),
            Err(FitError::Param(ParamError::Unknown { .. }))
        ));
    }

    #[test]
    fn test_argmax_tie_goes_first() {
        assert_eq!(argmax([1.0, 3.0, 3.0]), Some(1));
        assert_eq!(argmax([]), None);
    }
}
