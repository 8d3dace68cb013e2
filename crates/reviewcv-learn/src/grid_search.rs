//! Exhaustive hyperparameter search scored with stratified k-fold
//! cross-validation.
//!
//! Every parameter set of the grid is fitted on the training part of each
//! split and scored on its test part. The set with the highest mean score
//! wins (the first one in grid order on ties) and is refitted on all the
//! data to become the best estimator.
//!
//! A candidate that fails to fit is scored `NaN` and can never win, so one
//! unusable combination does not take down the whole search.

use rand::SeedableRng as _;
use rand_pcg::Pcg64;
use reviewcv_data::vectorizer::FeatureMatrix;
use tracing::{debug, warn};

use crate::{
    kfold::{self, Split},
    learner::{BoxedLearner, FitError, LearnerKind},
    params::{ParamGrid, ParamSet, ParamValue, expand_grid},
    scoring::{ScoreError, Scorer},
};

/// Seed of the split shuffling, fixed so searches are reproducible.
pub const GRID_SEARCH_SEED: u64 = 12345;

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum GridSearchError {
    #[display("{_0}")]
    Fit(FitError),
    #[display("{_0}")]
    Score(ScoreError),
    #[display("parameter grid of {learner} has no candidates")]
    #[from(ignore)]
    EmptyGrid { learner: LearnerKind },
    #[display("no {learner} candidate could be scored")]
    #[from(ignore)]
    NoViableCandidate { learner: LearnerKind },
}

/// Cross-validation score of one parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub params: ParamSet,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best_estimator: BoxedLearner,
    pub best_params: ParamSet,
    pub candidates: Vec<CandidateScore>,
}

#[derive(Debug, Clone)]
pub struct GridSearch<'a> {
    pub kind: LearnerKind,
    pub grid: &'a ParamGrid,
    pub scorer: Scorer,
    /// Label domain passed to classifiers and metrics.
    pub classes: &'a [f64],
    pub folds: usize,
}

impl GridSearch<'_> {
    /// The grid actually searched: learners that take a `batch_size` get
    /// one equal to the number of samples.
    #[must_use]
    pub fn effective_grid(&self, n_samples: usize) -> ParamGrid {
        let mut grid = self.grid.clone();
        if self.kind.takes_batch_size() {
            let batch_size = i64::try_from(n_samples).unwrap_or(i64::MAX);
            grid.insert("batch_size".into(), vec![ParamValue::Int(batch_size)]);
        }
        grid
    }

    pub fn run(&self, x: &FeatureMatrix, y: &[f64]) -> Result<GridSearchResult, GridSearchError> {
        let candidates = expand_grid(&self.effective_grid(y.len()));
        if candidates.is_empty() {
            return Err(GridSearchError::EmptyGrid { learner: self.kind });
        }
        // Parameter errors are fatal, unlike fit failures on single splits.
        for params in &candidates {
            self.kind.build(params, self.classes)?;
        }

        let mut rng = Pcg64::seed_from_u64(GRID_SEARCH_SEED);
        let splits = kfold::stratified_k_fold(y, self.folds, &mut rng);

        let mut scores: Vec<CandidateScore> = vec![];
        let mut best: Option<usize> = None;
        for params in candidates {
            let fold_scores = splits
                .iter()
                .map(|split| self.score_split(&params, x, y, split))
                .collect::<Vec<_>>();
            #[expect(clippy::cast_precision_loss)]
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            debug!(learner = %self.kind, params = %params, mean_score);
            if !mean_score.is_nan()
                && best.is_none_or(|b: usize| mean_score > scores[b].mean_score)
            {
                best = Some(scores.len());
            }
            scores.push(CandidateScore {
                params,
                fold_scores,
                mean_score,
            });
        }

        let Some(best) = best else {
            return Err(GridSearchError::NoViableCandidate { learner: self.kind });
        };
        let best_params = scores[best].params.clone();
        let mut best_estimator = self.kind.build(&best_params, self.classes)?;
        best_estimator.fit(x, y)?;
        Ok(GridSearchResult {
            best_estimator,
            best_params,
            candidates: scores,
        })
    }

    fn score_split(&self, params: &ParamSet, x: &FeatureMatrix, y: &[f64], split: &Split) -> f64 {
        let select = |rows: &[usize]| {
            (
                x.select_rows(rows),
                rows.iter().map(|&i| y[i]).collect::<Vec<_>>(),
            )
        };
        let (x_train, y_train) = select(&split.train);
        let (x_test, y_test) = select(&split.test);
        let result = self.kind.build(params, self.classes).and_then(|mut learner| {
            learner.fit(&x_train, &y_train)?;
            Ok(learner)
        });
        let score = result.map_err(ScoreError::from).and_then(|learner| {
            self.scorer
                .score(&*learner, &x_test, &y_test, self.classes)
        });
        score.unwrap_or_else(|e| {
            warn!(learner = %self.kind, params = %params, "candidate failed: {e}");
            f64::NAN
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Objective;

    /// Two classes told apart by which of two features is set, with a
    /// noise feature shared by everyone.
    fn data() -> (FeatureMatrix, Vec<f64>) {
        let rows = (0..24).map(|i| {
            let feature = i % 2;
            vec![(feature, 1.0), (2, 1.0)]
        });
        let y = (0..24).map(|i| f64::from(i % 2) + 1.0).collect();
        (FeatureMatrix::from_rows(3, rows), y)
    }

    #[test]
    fn test_picks_best_and_refits() {
        let (x, y) = data();
        let grid = LearnerKind::BernoulliNb.default_param_grid();
        let search = GridSearch {
            kind: LearnerKind::BernoulliNb,
            grid: &grid,
            scorer: Scorer::new(Some("accuracy".parse::<Objective>().unwrap())),
            classes: &[1.0, 2.0],
            folds: 3,
        };
        let result = search.run(&x, &y).unwrap();
        assert_eq!(result.candidates.len(), 5);
        // every alpha separates the data, so the first one wins the tie
        assert_eq!(result.best_params, result.candidates[0].params);
        assert!(result.candidates.iter().all(|c| c.fold_scores.len() == 3));
        assert_eq!(result.best_estimator.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_is_deterministic() {
        let (x, y) = data();
        let grid = LearnerKind::Perceptron.default_param_grid();
        let search = GridSearch {
            kind: LearnerKind::Perceptron,
            grid: &grid,
            scorer: Scorer::Default,
            classes: &[1.0, 2.0],
            folds: 2,
        };
        let a = search.run(&x, &y).unwrap();
        let b = search.run(&x, &y).unwrap();
        assert_eq!(a.best_params, b.best_params);
        assert_eq!(a.candidates, b.candidates);
    }

    #[test]
    fn test_batch_size_is_injected() {
        let grid = LearnerKind::MiniBatchKMeans.default_param_grid();
        let search = GridSearch {
            kind: LearnerKind::MiniBatchKMeans,
            grid: &grid,
            scorer: Scorer::Default,
            classes: &[1.0, 2.0],
            folds: 2,
        };
        let effective = search.effective_grid(40);
        assert_eq!(effective["batch_size"], vec![ParamValue::Int(40)]);
        assert!(!LearnerKind::Perceptron.takes_batch_size());
    }

    #[test]
    fn test_unknown_param_fails_search() {
        let (x, y) = data();
        let mut grid = ParamGrid::new();
        grid.insert("gamma".into(), vec![ParamValue::Float(1.0)]);
        let search = GridSearch {
            kind: LearnerKind::MultinomialNb,
            grid: &grid,
            scorer: Scorer::Default,
            classes: &[1.0, 2.0],
            folds: 2,
        };
        assert!(matches!(search.run(&x, &y), Err(GridSearchError::Fit(_))));
    }

    #[test]
    fn test_empty_grid() {
        let (x, y) = data();
        let mut grid = ParamGrid::new();
        grid.insert("alpha".into(), vec![]);
        let search = GridSearch {
            kind: LearnerKind::BernoulliNb,
            grid: &grid,
            scorer: Scorer::Default,
            classes: &[1.0, 2.0],
            folds: 2,
        };
        assert!(matches!(
            search.run(&x, &y),
            Err(GridSearchError::EmptyGrid { .. })
        ));
    }
}
