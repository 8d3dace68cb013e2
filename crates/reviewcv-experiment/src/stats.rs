//! Evaluation records and their aggregation across folds.

use std::collections::BTreeMap;

use reviewcv_data::label::Label;
use reviewcv_stats::{descriptive::mean_std, metrics::EvaluationMetrics};
use serde::Serialize;

/// Learner name used for the majority baseline's record.
pub const MAJORITY_BASELINE_LEARNER: &str = "majority_baseline_model";

/// Result of evaluating one learner on one held-out fold, or of the
/// majority baseline on every observed label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsRecord {
    pub learner: String,
    /// Held-out fold index; `None` for the majority baseline.
    pub fold: Option<usize>,
    /// Running number of training samples fed to the learner copies.
    pub samples_seen: usize,
    /// Number of samples the predictions were evaluated on.
    pub test_samples: usize,
    pub games: String,
    pub prediction_label: Label,
    pub non_nlp_features: String,
    pub nlp_features: bool,
    pub transformation: String,
    pub rescale: bool,
    pub bin_ranges: Option<String>,
    pub params: Option<String>,
    pub majority_label: Option<f64>,
    pub metrics: EvaluationMetrics,
}

impl StatsRecord {
    /// Column headers of the fixed (non-metric) fields.
    pub const FIELDS: [&str; 13] = [
        "learner",
        "fold",
        "samples_seen",
        "test_samples",
        "games",
        "prediction_label",
        "non_nlp_features",
        "nlp_features",
        "transformation",
        "rescale",
        "bin_ranges",
        "params",
        "majority_label",
    ];

    /// Values of the fixed fields, in [`Self::FIELDS`] order.
    #[must_use]
    pub fn field_values(&self) -> Vec<String> {
        let optional = |value: Option<String>| value.unwrap_or_default();
        vec![
            self.learner.clone(),
            optional(self.fold.map(|f| f.to_string())),
            self.samples_seen.to_string(),
            self.test_samples.to_string(),
            self.games.clone(),
            self.prediction_label.to_string(),
            self.non_nlp_features.clone(),
            self.nlp_features.to_string(),
            self.transformation.clone(),
            self.rescale.to_string(),
            optional(self.bin_ranges.clone()),
            optional(self.params.clone()),
            optional(self.majority_label.map(|l| l.to_string())),
        ]
    }
}

/// Mean and standard deviation of one metric across folds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std_dev: f64,
}

/// Cross-validation summary of one learner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearnerSummary {
    pub learner: String,
    pub folds: usize,
    pub metrics: BTreeMap<String, MetricSummary>,
}

/// Summarizes the per-fold records of one learner. Returns `None` when there
/// are no records.
#[must_use]
pub fn summarize(records: &[StatsRecord]) -> Option<LearnerSummary> {
    let first = records.first()?;
    let mut values = BTreeMap::<&str, Vec<f64>>::new();
    for record in records {
        for (name, value) in record.metrics.iter() {
            values.entry(name).or_default().push(value);
        }
    }
    let metrics = values
        .into_iter()
        .filter_map(|(name, values)| {
            let (mean, std_dev) = mean_std(&values)?;
            Some((name.to_owned(), MetricSummary { mean, std_dev }))
        })
        .collect();
    Some(LearnerSummary {
        learner: first.learner.clone(),
        folds: records.len(),
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fold: usize, accuracy: f64) -> StatsRecord {
        let mut metrics = EvaluationMetrics::default();
        metrics.insert("accuracy", accuracy);
        StatsRecord {
            learner: "Perceptron".to_owned(),
            fold: Some(fold),
            samples_seen: 10 * (fold + 1),
            test_samples: 5,
            games: "Dota_2".to_owned(),
            prediction_label: Label::TotalGameHoursBin,
            non_nlp_features: "none".to_owned(),
            nlp_features: true,
            transformation: "None".to_owned(),
            rescale: true,
            bin_ranges: None,
            params: Some("{alpha: 0.1}".to_owned()),
            majority_label: None,
            metrics,
        }
    }

    #[test]
    fn test_summarize() {
        let records = [record(0, 0.5), record(1, 0.7), record(2, 0.9)];
        let summary = summarize(&records).unwrap();
        assert_eq!(summary.learner, "Perceptron");
        assert_eq!(summary.folds, 3);
        let accuracy = summary.metrics["accuracy"];
        assert!((accuracy.mean - 0.7).abs() < 1e-12);
        assert!((accuracy.std_dev - (0.08_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_field_values_align_with_headers() {
        let values = record(1, 0.5).field_values();
        assert_eq!(values.len(), StatsRecord::FIELDS.len());
        assert_eq!(values[1], "1");
        assert_eq!(values[12], "");
    }
}
