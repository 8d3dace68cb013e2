//! CSV reports of an experiment.
//!
//! File names start with the games label of the run:
//!
//! - `<games>_<learner>_stats.csv`: one row per held-out fold
//! - `<games>_majority_baseline_model_stats.csv`: the baseline's single row
//! - `<games>_cross_validation_summary.csv`: mean and standard deviation of
//!   every metric per learner

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use reviewcv_data::game::{Game, games_label};
use tracing::info;

use crate::stats::{LearnerSummary, MAJORITY_BASELINE_LEARNER, StatsRecord};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ReportError {
    #[display("{_0}")]
    Io(std::io::Error),
    #[display("{_0}")]
    Csv(csv::Error),
    #[display("{_0}")]
    Json(serde_json::Error),
}

/// Writes report files into one output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    games: String,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>, games: &BTreeSet<Game>) -> Self {
        Self {
            dir: dir.into(),
            games: games_label(games),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn stats_path(&self, learner: &str) -> PathBuf {
        self.dir.join(format!("{}_{learner}_stats.csv", self.games))
    }

    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}_cross_validation_summary.csv", self.games))
    }

    /// Path of the coefficients of `learner` after training on held-out
    /// fold `fold` (0-based). File numbers start at 1.
    #[must_use]
    pub fn model_weights_path(&self, learner: &str, fold: usize) -> PathBuf {
        self.dir.join(format!(
            "{}_{learner}_model_weights_{}.csv",
            self.games,
            fold + 1
        ))
    }

    /// Writes the per-fold records of one learner. Nothing is written for an
    /// empty list.
    pub fn write_learner_stats(
        &self,
        records: &[StatsRecord],
    ) -> Result<Option<PathBuf>, ReportError> {
        let Some(first) = records.first() else {
            return Ok(None);
        };
        let path = self.stats_path(&first.learner);
        write_records(&path, records)?;
        info!(path = %path.display(), "wrote learner stats");
        Ok(Some(path))
    }

    pub fn write_majority_baseline(&self, record: &StatsRecord) -> Result<PathBuf, ReportError> {
        let path = self.stats_path(MAJORITY_BASELINE_LEARNER);
        write_records(&path, std::slice::from_ref(record))?;
        info!(path = %path.display(), "wrote majority baseline stats");
        Ok(path)
    }

    pub fn write_summary(&self, summaries: &[LearnerSummary]) -> Result<PathBuf, ReportError> {
        let path = self.summary_path();
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["learner", "folds", "metric", "mean", "std_dev"])?;
        for summary in summaries {
            for (metric, values) in &summary.metrics {
                writer.write_record([
                    summary.learner.clone(),
                    summary.folds.to_string(),
                    metric.clone(),
                    values.mean.to_string(),
                    values.std_dev.to_string(),
                ])?;
            }
        }
        writer.flush()?;
        info!(path = %path.display(), "wrote cross-validation summary");
        Ok(path)
    }

    /// Writes a JSON side file next to the reports.
    pub fn write_json<T>(&self, path: &Path, value: &T) -> Result<(), ReportError>
    where
        T: serde::Serialize,
    {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, value)?;
        Ok(())
    }
}

/// Writes records with the fixed fields followed by one column per metric.
fn write_records(path: &Path, records: &[StatsRecord]) -> Result<(), ReportError> {
    let metric_names = records
        .iter()
        .flat_map(|r| r.metrics.iter().map(|(name, _)| name))
        .collect::<BTreeSet<_>>();

    let mut writer = csv::Writer::from_path(path)?;
    let header = StatsRecord::FIELDS
        .iter()
        .copied()
        .chain(metric_names.iter().copied());
    writer.write_record(header)?;
    for record in records {
        let metrics = record.metrics.iter().collect::<BTreeMap<_, _>>();
        let row = record.field_values().into_iter().chain(
            metric_names
                .iter()
                .map(|name| metrics.get(name).map(ToString::to_string).unwrap_or_default()),
        );
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use reviewcv_data::label::Label;
    use reviewcv_stats::metrics::EvaluationMetrics;

    use super::*;
    use crate::stats::summarize;

    fn record(learner: &str, fold: Option<usize>) -> StatsRecord {
        let mut metrics = EvaluationMetrics::default();
        metrics.insert("accuracy", 0.5);
        metrics.insert("qwk", 0.25);
        StatsRecord {
            learner: learner.to_owned(),
            fold,
            samples_seen: 40,
            test_samples: 20,
            games: "Dota_2".to_owned(),
            prediction_label: Label::TotalGameHoursBin,
            non_nlp_features: "none".to_owned(),
            nlp_features: true,
            transformation: "None".to_owned(),
            rescale: false,
            bin_ranges: None,
            params: None,
            majority_label: fold.is_none().then_some(2.0),
            metrics,
        }
    }

    #[test]
    fn test_file_names() {
        let games = BTreeSet::from([Game::Dota2]);
        let writer = ReportWriter::new("/out", &games);
        assert_eq!(
            writer.stats_path("Perceptron"),
            Path::new("/out/Dota_2_Perceptron_stats.csv")
        );
        assert_eq!(
            writer.model_weights_path("BernoulliNB", 0),
            Path::new("/out/Dota_2_BernoulliNB_model_weights_1.csv")
        );
        let all = ReportWriter::new("/out", &Game::ALL.into_iter().collect());
        assert_eq!(
            all.stats_path(MAJORITY_BASELINE_LEARNER),
            Path::new("/out/all_games_majority_baseline_model_stats.csv")
        );
    }

    #[test]
    fn test_write_learner_stats() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path(), &BTreeSet::from([Game::Dota2]));
        let records = [record("Perceptron", Some(0)), record("Perceptron", Some(1))];
        let path = writer.write_learner_stats(&records).unwrap().unwrap();

        let mut reader = csv::Reader::from_path(path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "learner");
        assert_eq!(headers.len(), StatsRecord::FIELDS.len() + 2);
        assert_eq!(&headers[headers.len() - 1], "qwk");
        let rows = reader.records().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][1], "1");
        assert_eq!(&rows[1][headers.len() - 2], "0.5");

        assert!(writer.write_learner_stats(&[]).unwrap().is_none());
    }

    #[test]
    fn test_write_baseline_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path(), &BTreeSet::from([Game::Arma3]));
        let path = writer
            .write_majority_baseline(&record(MAJORITY_BASELINE_LEARNER, None))
            .unwrap();
        assert!(path.ends_with("Arma_3_majority_baseline_model_stats.csv"));

        let summary = summarize(&[record("Perceptron", Some(0))]).unwrap();
        let path = writer.write_summary(&[summary]).unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }
}
