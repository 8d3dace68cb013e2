//! Export of learned feature weights.
//!
//! For every introspectable learner, the coefficients of each held-out
//! fold's estimator are written to `<games>_<learner>_model_weights_<n>.csv`
//! (`n` counting from 1), ranked per class by descending weight. The
//! hyperparameters behind those files are collected in
//! `model_params_readme.json`, keyed by learner and 0-based fold.
//!
//! Failures of a single learner are logged and the learner is skipped.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use reviewcv_learn::{
    learner::{BoxedLearner, Coefficients, IntrospectionError},
    params::ParamSet,
    weights::rank_features,
};
use tracing::{debug, info, warn};

use crate::{
    report::{ReportError, ReportWriter},
    runner::CvResults,
};

/// File name of the hyperparameter index.
pub const MODEL_PARAMS_README: &str = "model_params_readme.json";

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
enum LearnerWeightsError {
    #[display("{_0}")]
    Introspection(IntrospectionError),
    #[display("{_0}")]
    Report(ReportError),
}

/// Files written by [`write_feature_weights`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureWeightFiles {
    pub weights: Vec<PathBuf>,
    pub readme: Option<PathBuf>,
}

/// Writes the coefficient tables of every introspectable learner.
///
/// Nothing is written when the features were hashed, since hashed columns
/// have no names.
pub fn write_feature_weights(
    results: &CvResults,
    writer: &ReportWriter,
) -> Result<FeatureWeightFiles, ReportError> {
    let Some(names) = results.vectorizer.feature_names() else {
        warn!("feature names are unavailable with feature hashing, skipping feature weights");
        return Ok(FeatureWeightFiles::default());
    };

    let mut files = FeatureWeightFiles::default();
    let mut readme = BTreeMap::<&str, BTreeMap<usize, &ParamSet>>::new();
    for run in &results.learners {
        let learner = run.kind.name();
        if run.estimators.iter().any(|e| e.introspectable().is_none()) {
            debug!(learner, "learner has no coefficients, skipping feature weights");
            continue;
        }
        match write_learner_weights(writer, learner, &run.estimators, names) {
            Ok(paths) => {
                files.weights.extend(paths);
                readme.insert(
                    learner,
                    run.estimators
                        .iter()
                        .map(|e| e.params())
                        .enumerate()
                        .collect(),
                );
            }
            Err(error) => warn!(learner, %error, "could not write feature weights"),
        }
    }

    if !readme.is_empty() {
        let path = writer.dir().join(MODEL_PARAMS_README);
        writer.write_json(&path, &readme)?;
        files.readme = Some(path);
    }
    info!(files = files.weights.len(), "wrote feature weights");
    Ok(files)
}

fn write_learner_weights(
    writer: &ReportWriter,
    learner: &str,
    estimators: &[BoxedLearner],
    names: &[String],
) -> Result<Vec<PathBuf>, LearnerWeightsError> {
    // No file is written unless every fold has coefficients.
    let tables = estimators
        .iter()
        .filter_map(|e| e.introspectable())
        .map(|e| e.coefficients())
        .collect::<Result<Vec<_>, _>>()?;

    let mut paths = vec![];
    for (fold, coefficients) in tables.iter().enumerate() {
        let path = writer.model_weights_path(learner, fold);
        write_table(&path, coefficients, names)?;
        paths.push(path);
    }
    Ok(paths)
}

fn write_table(
    path: &Path,
    coefficients: &[Coefficients],
    names: &[String],
) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["class", "feature", "coefficient"])?;
    for Coefficients { class, values } in coefficients {
        let class = class.map(|c| c.to_string()).unwrap_or_default();
        for (feature, coefficient) in rank_features(names, values) {
            writer.write_record([class.clone(), feature, coefficient.to_string()])?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_table_ranks_per_class() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.csv");
        let names = ["a".to_owned(), "b".to_owned(), "c".to_owned()];
        let coefficients = [
            Coefficients {
                class: Some(1.0),
                values: vec![0.5, -1.0, 2.0],
            },
            Coefficients {
                class: Some(2.0),
                values: vec![1.0, 0.0, -3.0],
            },
        ];
        write_table(&path, &coefficients, &names).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows = reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_owned).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0], ["1", "c", "2"]);
        assert_eq!(rows[2], ["1", "b", "-1"]);
        assert_eq!(rows[3], ["2", "a", "1"]);
        assert_eq!(rows[5], ["2", "c", "-3"]);
    }
}
