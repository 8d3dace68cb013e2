//! Objective functions used to rank grid search candidates.

use std::{fmt, str::FromStr};

use reviewcv_data::vectorizer::FeatureMatrix;
use reviewcv_stats::metrics::{self, KappaWeights, METRIC_NAMES, MetricError};

use crate::learner::{FitError, Learner};

/// A named objective computed from true labels and predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    PearsonR,
    Kappa {
        weights: KappaWeights,
        allow_off_by_one: bool,
    },
    /// Any other entry of [`METRIC_NAMES`], computed on predictions rounded
    /// to the nearest integer.
    Metric(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unrecognized objective function: {name}")]
pub struct UnknownObjectiveError {
    pub name: String,
}

impl FromStr for Objective {
    type Err = UnknownObjectiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(&name) = METRIC_NAMES.iter().find(|&&name| name == s) else {
            return Err(UnknownObjectiveError { name: s.to_owned() });
        };
        if name == "pearson_r" {
            return Ok(Self::PearsonR);
        }
        let (prefix, allow_off_by_one) = match name.strip_suffix("_off_by_one") {
            Some(prefix) => (prefix, true),
            None => (name, false),
        };
        let weights = match prefix {
            "uwk" => KappaWeights::Unweighted,
            "lwk" => KappaWeights::Linear,
            "qwk" => KappaWeights::Quadratic,
            _ => return Ok(Self::Metric(name)),
        };
        Ok(Self::Kappa {
            weights,
            allow_off_by_one,
        })
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PearsonR => f.write_str("pearson_r"),
            Self::Kappa {
                weights,
                allow_off_by_one,
            } => {
                let prefix = match weights {
                    KappaWeights::Unweighted => "uwk",
                    KappaWeights::Linear => "lwk",
                    KappaWeights::Quadratic => "qwk",
                };
                let suffix = if *allow_off_by_one { "_off_by_one" } else { "" };
                write!(f, "{prefix}{suffix}")
            }
            Self::Metric(name) => f.write_str(name),
        }
    }
}

impl Objective {
    pub fn evaluate(self, y_true: &[f64], y_pred: &[f64], classes: &[f64]) -> Result<f64, MetricError> {
        match self {
            Self::PearsonR => metrics::pearson_r(y_true, y_pred),
            Self::Kappa {
                weights,
                allow_off_by_one,
            } => metrics::kappa(y_true, y_pred, weights, allow_off_by_one),
            Self::Metric(name) => {
                let rounded = y_pred.iter().map(|y| y.round()).collect::<Vec<_>>();
                let all = metrics::compute_evaluation_metrics(y_true, &rounded, classes)?;
                Ok(all.get(name).unwrap_or_default())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ScoreError {
    #[display("{_0}")]
    Fit(FitError),
    #[display("{_0}")]
    Metric(MetricError),
}

/// Scores a fitted learner on held-out data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scorer {
    /// The learner's own [`default_score`](crate::learner::Fittable::default_score).
    #[default]
    Default,
    Objective(Objective),
}

impl Scorer {
    #[must_use]
    pub fn new(objective: Option<Objective>) -> Self {
        objective.map_or(Self::Default, Self::Objective)
    }

    pub fn score(
        self,
        learner: &dyn Learner,
        x: &FeatureMatrix,
        y: &[f64],
        classes: &[f64],
    ) -> Result<f64, ScoreError> {
        match self {
            Self::Default => Ok(learner.default_score(x, y)?),
            Self::Objective(objective) => {
                let predicted = learner.predict(x)?;
                Ok(objective.evaluate(y, &predicted, classes)?)
            }
        }
    }
}

impl fmt::Display for Scorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Objective(objective) => write!(f, "{objective}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_metric_name() {
        for name in METRIC_NAMES {
            let objective = name.parse::<Objective>().unwrap();
            assert_eq!(objective.to_string(), name);
        }
        assert!("roc_auc".parse::<Objective>().is_err());
    }

    #[test]
    fn test_kappa_dispatch() {
        assert_eq!(
            "qwk".parse::<Objective>().unwrap(),
            Objective::Kappa {
                weights: KappaWeights::Quadratic,
                allow_off_by_one: false,
            }
        );
        assert_eq!(
            "lwk_off_by_one".parse::<Objective>().unwrap(),
            Objective::Kappa {
                weights: KappaWeights::Linear,
                allow_off_by_one: true,
            }
        );
        assert_eq!(
            "f1_macro".parse::<Objective>().unwrap(),
            Objective::Metric("f1_macro")
        );
    }

    #[test]
    fn test_quadratic_differs_from_linear() {
        let truth = [1.0, 2.0, 3.0, 4.0, 1.0, 4.0];
        let predicted = [1.0, 3.0, 3.0, 1.0, 2.0, 4.0];
        let classes = [1.0, 2.0, 3.0, 4.0];
        let qwk = "qwk".parse::<Objective>().unwrap();
        let lwk = "lwk".parse::<Objective>().unwrap();
        let q = qwk.evaluate(&truth, &predicted, &classes).unwrap();
        let l = lwk.evaluate(&truth, &predicted, &classes).unwrap();
        assert!((q - l).abs() > 1e-6);
    }

    #[test]
    fn test_metric_rounds_predictions() {
        let accuracy = Objective::Metric("accuracy");
        let score = accuracy
            .evaluate(&[1.0, 2.0], &[1.2, 1.9], &[1.0, 2.0])
            .unwrap();
        assert_eq!(score, 1.0);
    }
}
