//! Evaluation metrics for ordinal label predictions
//!
//! Every function takes aligned slices of true and predicted labels. Labels
//! are stored as `f64` but the classification metrics and kappa treat them
//! as discrete values (kappa rounds them to integers first).
//!
//! [`compute_evaluation_metrics`] is the single entry point used to evaluate
//! learners and the majority baseline, so every stats record carries the
//! same metric set ([`METRIC_NAMES`]).
//!
//! # Kappa
//!
//! [`kappa`] follows the usual Cohen's kappa definition with an optional
//! weighting scheme:
//!
//! - [`KappaWeights::Unweighted`] - any disagreement costs 1
//! - [`KappaWeights::Linear`] - cost grows with `|i - j|`
//! - [`KappaWeights::Quadratic`] - cost grows with `(i - j)²`
//!
//! With `allow_off_by_one`, disagreements are measured as `|i - j| - 1`, so
//! predictions one rating away from the truth count as agreement.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Names of the metrics produced by [`compute_evaluation_metrics`].
pub const METRIC_NAMES: [&str; 14] = [
    "accuracy",
    "precision_macro",
    "precision_weighted",
    "recall_macro",
    "recall_weighted",
    "f1_macro",
    "f1_weighted",
    "pearson_r",
    "uwk",
    "uwk_off_by_one",
    "lwk",
    "lwk_off_by_one",
    "qwk",
    "qwk_off_by_one",
];

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum MetricError {
    #[display("cannot compute metrics over an empty label set")]
    Empty,
    #[display("true and predicted labels differ in length ({truth} vs {predicted})")]
    LengthMismatch { truth: usize, predicted: usize },
}

fn check_aligned(y_true: &[f64], y_pred: &[f64]) -> Result<(), MetricError> {
    if y_true.len() != y_pred.len() {
        return Err(MetricError::LengthMismatch {
            truth: y_true.len(),
            predicted: y_pred.len(),
        });
    }
    if y_true.is_empty() {
        return Err(MetricError::Empty);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KappaWeights {
    Unweighted,
    Linear,
    Quadratic,
}

/// Cohen's kappa between two ordinal ratings.
///
/// Returns 1.0 when the weighting scheme assigns no cost to any
/// disagreement (e.g. every label is identical) and 0.0 when the expected
/// disagreement is zero but the observed one is not.
///
/// # Errors
///
/// Returns an error when the slices are empty or differ in length.
#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn kappa(
    y_true: &[f64],
    y_pred: &[f64],
    weights: KappaWeights,
    allow_off_by_one: bool,
) -> Result<f64, MetricError> {
    check_aligned(y_true, y_pred)?;

    let y_true = y_true.iter().map(|y| y.round() as i64).collect::<Vec<_>>();
    let y_pred = y_pred.iter().map(|y| y.round() as i64).collect::<Vec<_>>();

    // Only ratings that occur have non-zero counts, so the tables are kept
    // over those instead of the whole `min..=max` range.
    let ratings = y_true
        .iter()
        .chain(&y_pred)
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    let index = ratings
        .iter()
        .enumerate()
        .map(|(i, &rating)| (rating, i))
        .collect::<BTreeMap<_, _>>();

    let mut observed = BTreeMap::<(usize, usize), f64>::new();
    let mut hist_true = vec![0.0; ratings.len()];
    let mut hist_pred = vec![0.0; ratings.len()];
    for (t, p) in y_true.iter().zip(&y_pred) {
        let i = index[t];
        let j = index[p];
        *observed.entry((i, j)).or_default() += 1.0;
        hist_true[i] += 1.0;
        hist_pred[j] += 1.0;
    }

    let weight = |i: usize, j: usize| {
        let mut diff = ratings[i].abs_diff(ratings[j]) as f64;
        if allow_off_by_one && diff > 0.0 {
            diff -= 1.0;
        }
        match weights {
            KappaWeights::Unweighted => {
                if diff > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            KappaWeights::Linear => diff,
            KappaWeights::Quadratic => diff * diff,
        }
    };

    let span = match (ratings.first(), ratings.last()) {
        (Some(min), Some(max)) => max.abs_diff(*min),
        _ => 0,
    };
    if span <= u64::from(allow_off_by_one) {
        return Ok(1.0);
    }

    let num_scored_items = y_true.len() as f64;
    let weighted_observed = observed
        .iter()
        .map(|(&(i, j), &count)| weight(i, j) * count)
        .sum::<f64>();
    let mut weighted_expected = 0.0;
    for (i, &count_true) in hist_true.iter().enumerate() {
        for (j, &count_pred) in hist_pred.iter().enumerate() {
            weighted_expected += weight(i, j) * count_true * count_pred / num_scored_items;
        }
    }

    if weighted_expected == 0.0 {
        return Ok(if weighted_observed == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - weighted_observed / weighted_expected)
}

/// Pearson correlation coefficient.
///
/// Returns 0.0 when either side has no variance.
///
/// # Errors
///
/// Returns an error when the slices are empty or differ in length.
#[expect(clippy::cast_precision_loss)]
pub fn pearson_r(y_true: &[f64], y_pred: &[f64]) -> Result<f64, MetricError> {
    check_aligned(y_true, y_pred)?;
    let n = y_true.len() as f64;
    let mean_t = y_true.iter().sum::<f64>() / n;
    let mean_p = y_pred.iter().sum::<f64>() / n;
    let (mut cov, mut var_t, mut var_p) = (0.0, 0.0, 0.0);
    for (t, p) in y_true.iter().zip(y_pred) {
        let dt = t - mean_t;
        let dp = p - mean_p;
        cov += dt * dp;
        var_t += dt * dt;
        var_p += dp * dp;
    }
    if var_t == 0.0 || var_p == 0.0 {
        return Ok(0.0);
    }
    Ok(cov / (var_t.sqrt() * var_p.sqrt()))
}

/// Coefficient of determination (R²).
///
/// A constant truth yields 1.0 for a perfect prediction and 0.0 otherwise.
///
/// # Errors
///
/// Returns an error when the slices are empty or differ in length.
#[expect(clippy::cast_precision_loss)]
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> Result<f64, MetricError> {
    check_aligned(y_true, y_pred)?;
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>();
    let ss_tot = y_true.iter().map(|t| (t - mean).powi(2)).sum::<f64>();
    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Fraction of predictions equal to the truth.
///
/// # Errors
///
/// Returns an error when the slices are empty or differ in length.
#[expect(clippy::cast_precision_loss, clippy::float_cmp)]
pub fn accuracy(y_true: &[f64], y_pred: &[f64]) -> Result<f64, MetricError> {
    check_aligned(y_true, y_pred)?;
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Per-class precision, recall, F1 and support.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScores {
    pub label: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class scores for every label in `labels`.
///
/// Undefined ratios (no predictions or no support) are reported as 0.0.
///
/// # Errors
///
/// Returns an error when the slices are empty or differ in length.
#[expect(clippy::cast_precision_loss, clippy::float_cmp)]
pub fn class_scores(
    y_true: &[f64],
    y_pred: &[f64],
    labels: &[f64],
) -> Result<Vec<ClassScores>, MetricError> {
    check_aligned(y_true, y_pred)?;
    let ratio = |num: usize, den: usize| {
        if den == 0 {
            0.0
        } else {
            num as f64 / den as f64
        }
    };
    Ok(labels
        .iter()
        .map(|&label| {
            let tp = y_true
                .iter()
                .zip(y_pred)
                .filter(|&(&t, &p)| t == label && p == label)
                .count();
            let predicted = y_pred.iter().filter(|&&p| p == label).count();
            let support = y_true.iter().filter(|&&t| t == label).count();
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            ClassScores {
                label,
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect())
}

/// Sorted union of the labels appearing in `y_true`, `y_pred` and `classes`.
#[must_use]
pub fn label_union(y_true: &[f64], y_pred: &[f64], classes: &[f64]) -> Vec<f64> {
    let mut labels = y_true
        .iter()
        .chain(y_pred)
        .chain(classes)
        .copied()
        .collect::<Vec<_>>();
    labels.sort_by(f64::total_cmp);
    labels.dedup();
    labels
}

/// Named metric values for one evaluation, in stable (sorted) key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EvaluationMetrics(BTreeMap<String, f64>);

impl EvaluationMetrics {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Computes the full metric set comparing predictions against the truth.
///
/// `classes` is the label domain of the experiment; it widens the label set
/// used for macro/weighted averages so that classes absent from a fold
/// still count.
///
/// # Errors
///
/// Returns an error when the slices are empty or differ in length.
#[expect(clippy::cast_precision_loss)]
pub fn compute_evaluation_metrics(
    y_true: &[f64],
    y_pred: &[f64],
    classes: &[f64],
) -> Result<EvaluationMetrics, MetricError> {
    let labels = label_union(y_true, y_pred, classes);
    let scores = class_scores(y_true, y_pred, &labels)?;
    let total_support = y_true.len() as f64;
    let macro_avg = |f: fn(&ClassScores) -> f64| {
        scores.iter().map(f).sum::<f64>() / scores.len() as f64
    };
    let weighted_avg = |f: fn(&ClassScores) -> f64| {
        scores.iter().map(|s| f(s) * s.support as f64).sum::<f64>() / total_support
    };

    let mut metrics = EvaluationMetrics::default();
    metrics.insert("accuracy", accuracy(y_true, y_pred)?);
    metrics.insert("precision_macro", macro_avg(|s| s.precision));
    metrics.insert("precision_weighted", weighted_avg(|s| s.precision));
    metrics.insert("recall_macro", macro_avg(|s| s.recall));
    metrics.insert("recall_weighted", weighted_avg(|s| s.recall));
    metrics.insert("f1_macro", macro_avg(|s| s.f1));
    metrics.insert("f1_weighted", weighted_avg(|s| s.f1));
    metrics.insert("pearson_r", pearson_r(y_true, y_pred)?);
    for (prefix, weights) in [
        ("uwk", KappaWeights::Unweighted),
        ("lwk", KappaWeights::Linear),
        ("qwk", KappaWeights::Quadratic),
    ] {
        metrics.insert(prefix, kappa(y_true, y_pred, weights, false)?);
        metrics.insert(
            format!("{prefix}_off_by_one"),
            kappa(y_true, y_pred, weights, true)?,
        );
    }
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_perfect_agreement() {
        let y = [1.0, 2.0, 3.0, 2.0];
        for weights in [
            KappaWeights::Unweighted,
            KappaWeights::Linear,
            KappaWeights::Quadratic,
        ] {
            assert!(close(kappa(&y, &y, weights, false).unwrap(), 1.0));
        }
        assert!(close(accuracy(&y, &y).unwrap(), 1.0));
        assert!(close(pearson_r(&y, &y).unwrap(), 1.0));
    }

    #[test]
    fn test_unweighted_kappa_known_value() {
        // observed agreement 0.5, expected agreement 0.5 -> kappa 0
        let t = [1.0, 1.0, 2.0, 2.0];
        let p = [1.0, 2.0, 1.0, 2.0];
        assert!(close(
            kappa(&t, &p, KappaWeights::Unweighted, false).unwrap(),
            0.0
        ));
    }

    #[test]
    fn test_quadratic_penalizes_distant_errors_more() {
        let t = [1.0, 2.0, 3.0, 4.0, 5.0];
        let near = [2.0, 2.0, 3.0, 4.0, 5.0];
        let far = [5.0, 2.0, 3.0, 4.0, 5.0];
        let k_near = kappa(&t, &near, KappaWeights::Quadratic, false).unwrap();
        let k_far = kappa(&t, &far, KappaWeights::Quadratic, false).unwrap();
        assert!(k_near > k_far);
    }

    #[test]
    fn test_off_by_one_forgives_adjacent_errors() {
        let t = [1.0, 2.0, 3.0, 4.0];
        let p = [2.0, 3.0, 4.0, 3.0];
        let strict = kappa(&t, &p, KappaWeights::Linear, false).unwrap();
        let lenient = kappa(&t, &p, KappaWeights::Linear, true).unwrap();
        assert!(close(lenient, 1.0));
        assert!(strict < lenient);
    }

    #[test]
    fn test_length_mismatch() {
        assert_eq!(
            accuracy(&[1.0], &[1.0, 2.0]),
            Err(MetricError::LengthMismatch {
                truth: 1,
                predicted: 2
            })
        );
        assert_eq!(pearson_r(&[], &[]), Err(MetricError::Empty));
    }

    #[test]
    fn test_constant_prediction_has_zero_correlation() {
        assert!(close(
            pearson_r(&[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0]).unwrap(),
            0.0
        ));
    }

    #[test]
    fn test_r2_score() {
        let t = [1.0, 2.0, 3.0];
        assert!(close(r2_score(&t, &t).unwrap(), 1.0));
        assert!(close(r2_score(&t, &[2.0, 2.0, 2.0]).unwrap(), 0.0));
    }

    #[test]
    fn test_class_scores() {
        let t = [1.0, 1.0, 2.0, 2.0];
        let p = [1.0, 2.0, 2.0, 2.0];
        let scores = class_scores(&t, &p, &[1.0, 2.0]).unwrap();
        assert!(close(scores[0].precision, 1.0));
        assert!(close(scores[0].recall, 0.5));
        assert!(close(scores[1].precision, 2.0 / 3.0));
        assert!(close(scores[1].recall, 1.0));
        assert_eq!(scores[1].support, 2);
    }

    #[test]
    fn test_metric_set_is_complete() {
        let metrics =
            compute_evaluation_metrics(&[1.0, 2.0, 3.0], &[1.0, 2.0, 2.0], &[1.0, 2.0, 3.0])
                .unwrap();
        assert_eq!(metrics.len(), METRIC_NAMES.len());
        for name in METRIC_NAMES {
            assert!(metrics.get(name).is_some(), "missing {name}");
        }
        assert!(close(metrics.get("accuracy").unwrap(), 2.0 / 3.0));
    }

    #[test]
    fn test_absent_class_lowers_macro_average() {
        let t = [1.0, 1.0];
        let p = [1.0, 1.0];
        let without = compute_evaluation_metrics(&t, &p, &[]).unwrap();
        let with = compute_evaluation_metrics(&t, &p, &[1.0, 2.0]).unwrap();
        assert!(close(without.get("f1_macro").unwrap(), 1.0));
        assert!(close(with.get("f1_macro").unwrap(), 0.5));
    }

    #[test]
    fn test_metrics_serialize_as_flat_map() {
        let mut metrics = EvaluationMetrics::default();
        metrics.insert("kappa", 0.25);
        metrics.insert("accuracy", 0.5);
        let json = serde_json::to_string(&metrics).unwrap();
        assert_eq!(json, r#"{"accuracy":0.5,"kappa":0.25}"#);
    }

    #[test]
    fn test_kappa_with_distant_ratings() {
        let t = [0.0, 1e6, 0.0, 1e6];
        let p = [0.0, 1e6, 1e6, 0.0];
        for weights in [
            KappaWeights::Unweighted,
            KappaWeights::Linear,
            KappaWeights::Quadratic,
        ] {
            assert!(close(kappa(&t, &t, weights, false).unwrap(), 1.0));
            // half of the ratings disagree, exactly as often as chance
            assert!(close(kappa(&t, &p, weights, false).unwrap(), 0.0));
        }

        let t = [-1e18, 1e18, 0.0];
        assert!(close(kappa(&t, &t, KappaWeights::Quadratic, true).unwrap(), 1.0));
    }
}
