//! The incremental cross-validation experiment.
//!
//! A run goes through these stages:
//!
//! 1. **Sampling**: disjoint grid search and training folds are drawn from
//!    the datastore ([`ExperimentalData`])
//! 2. **Vectorizing**: every sampled review is read once and the vectorizer
//!    is fitted over all of them
//! 3. **Grid search**: each learner's best hyperparameters are selected on
//!    the grid search folds
//! 4. **Cross-validation**: each training fold is held out in turn while a
//!    copy of every best estimator is updated with the other folds, then
//!    evaluated on the held-out fold
//! 5. **Majority baseline**: the most frequent label is evaluated as a
//!    constant prediction over every observed label

use rand::Rng;
use reviewcv_data::{
    context::ExperimentContext,
    experimental_data::{DataError, ExperimentalData},
    game::games_label,
    label::Label,
    sample::{DataPoint, SampleError, SampleSource},
    store::ReviewStore,
    vectorizer::{FeatureMatrix, Vectorizer},
};
use reviewcv_learn::{
    grid_search::{GridSearch, GridSearchError, GridSearchResult},
    learner::{BoxedLearner, FitError, LearnerKind},
    scoring::Scorer,
};
use reviewcv_stats::{
    binning::format_bin_ranges,
    descriptive::mean_std,
    frequency::LabelCounts,
    metrics::{EvaluationMetrics, MetricError, compute_evaluation_metrics},
};
use tracing::{debug, info};

use crate::{
    config::CvConfig,
    rescale::rescale_predictions,
    stats::{LearnerSummary, MAJORITY_BASELINE_LEARNER, StatsRecord, summarize},
};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ExperimentError {
    #[display("{_0}")]
    Data(DataError),
    #[display("{_0}")]
    Sample(SampleError),
    #[display("{_0}")]
    Metric(MetricError),
    #[display(
        "not enough data for grid search: {realized} of {requested} requested folds could be drawn"
    )]
    #[from(ignore)]
    InsufficientGridSearchFolds { requested: usize, realized: usize },
    #[display(
        "not enough data for cross-validation: {realized} of {requested} requested folds could be drawn"
    )]
    #[from(ignore)]
    InsufficientTrainingFolds { requested: usize, realized: usize },
    #[display("grid search of {learner} failed: {error}")]
    #[from(ignore)]
    GridSearch {
        learner: LearnerKind,
        error: GridSearchError,
    },
    #[display("{learner} cannot be updated incrementally")]
    #[from(ignore)]
    NotIncremental { learner: LearnerKind },
    #[display("{learner} failed on held-out fold {fold}: {error}")]
    #[from(ignore)]
    Fit {
        learner: LearnerKind,
        fold: usize,
        error: FitError,
    },
}

/// Outcome of one learner.
#[derive(Debug, Clone)]
pub struct LearnerRun {
    pub kind: LearnerKind,
    pub grid_search: GridSearchResult,
    /// Updated copies of the best estimator, indexed by held-out fold.
    pub estimators: Vec<BoxedLearner>,
    /// One record per held-out fold, in fold order.
    pub stats: Vec<StatsRecord>,
}

#[derive(Debug, Clone)]
pub struct CvResults {
    pub data: ExperimentalData,
    pub vectorizer: Vectorizer,
    /// In configuration order.
    pub learners: Vec<LearnerRun>,
    pub majority_baseline: Option<StatsRecord>,
}

impl CvResults {
    #[must_use]
    pub fn learner(&self, kind: LearnerKind) -> Option<&LearnerRun> {
        self.learners.iter().find(|run| run.kind == kind)
    }

    /// Cross-fold summaries of every learner that produced records.
    #[must_use]
    pub fn summaries(&self) -> Vec<LearnerSummary> {
        self.learners
            .iter()
            .filter_map(|run| summarize(&run.stats))
            .collect()
    }
}

/// Features and labels of one fold.
#[derive(Debug)]
struct FoldData {
    x: FeatureMatrix,
    y: Vec<f64>,
}

impl FoldData {
    fn new(vectorizer: &Vectorizer, points: Vec<DataPoint>) -> Self {
        let (dicts, y): (Vec<_>, Vec<_>) = points.into_iter().map(|p| (p.x, p.y)).unzip();
        Self {
            x: vectorizer.transform(&dicts),
            y,
        }
    }
}

/// Runs a complete experiment.
///
/// Only the sampler consumes `rng`; grid search splits use their own fixed
/// seed.
pub fn run_experiment<R>(
    config: &CvConfig,
    store: &dyn ReviewStore,
    rng: &mut R,
    ctx: &ExperimentContext,
) -> Result<CvResults, ExperimentError>
where
    R: Rng + ?Sized,
{
    let _span = ctx.span().clone().entered();
    info!(
        games = %games_label(config.games()),
        learners = ?config.learners().iter().map(|l| l.name()).collect::<Vec<_>>(),
        label = %config.prediction_label(),
        "starting experiment"
    );

    let settings = config.sample_settings();
    let data = ExperimentalData::new(store, &settings, &config.sampling_request(), rng, ctx)?;
    check_fold_counts(config, &data)?;

    let source = SampleSource::new(store, &settings, config.batch_size());
    let (vectorizer, grid_search_data, folds) = vectorize(config, &source, &data, ctx)?;

    let searches = grid_search_round(config, &data, &grid_search_data, ctx)?;
    let (estimators, stats) = cross_validate(config, &data, &searches, &folds, ctx)?;

    let majority_baseline = if config.majority_baseline() {
        let labels = grid_search_data
            .y
            .iter()
            .chain(folds.iter().flat_map(|f| &f.y))
            .copied()
            .collect::<Vec<_>>();
        Some(evaluate_majority_baseline(config, &data, &labels, ctx)?)
    } else {
        None
    };

    let learners = searches
        .into_iter()
        .zip(estimators)
        .zip(stats)
        .map(|(((kind, grid_search), estimators), stats)| LearnerRun {
            kind,
            grid_search,
            estimators,
            stats,
        })
        .collect();
    info!("experiment finished");
    Ok(CvResults {
        data,
        vectorizer,
        learners,
        majority_baseline,
    })
}

/// Aborts when the realized fold counts are too small to be meaningful.
fn check_fold_counts(config: &CvConfig, data: &ExperimentalData) -> Result<(), ExperimentError> {
    check_grid_search_folds(config.grid_search_folds(), data.grid_search_folds())?;
    if data.folds() < 2 {
        return Err(ExperimentError::InsufficientTrainingFolds {
            requested: config.training_rounds(),
            realized: data.folds(),
        });
    }
    Ok(())
}

/// Grid search needs two folds and at most a quarter of the requested folds
/// may be missing.
fn check_grid_search_folds(requested: usize, realized: usize) -> Result<(), ExperimentError> {
    if realized < 2 || 4 * requested.saturating_sub(realized) > requested {
        return Err(ExperimentError::InsufficientGridSearchFolds {
            requested,
            realized,
        });
    }
    Ok(())
}

/// Reads every sampled review once, fits the vectorizer over all of them and
/// returns the grid search data and the training folds.
fn vectorize(
    config: &CvConfig,
    source: &SampleSource<'_>,
    data: &ExperimentalData,
    ctx: &ExperimentContext,
) -> Result<(Vectorizer, FoldData, Vec<FoldData>), ExperimentError> {
    let _span = ctx.stage("vectorizing").entered();

    let all_ids = data.all_ids();
    let points = source
        .samples(&all_ids)
        .collect::<Result<Vec<_>, _>>()?;
    let mut vectorizer = Vectorizer::new(config.hashed_features());
    vectorizer.fit(points.iter().map(|p| &p.x));
    info!(
        samples = points.len(),
        features = vectorizer.n_features(),
        hashed = config.hashed_features().is_some(),
        "fitted vectorizer"
    );

    // `all_ids` lists the training folds first
    let mut points = points.into_iter();
    let folds = data
        .training_set()
        .iter()
        .map(|ids| FoldData::new(&vectorizer, points.by_ref().take(ids.len()).collect()))
        .collect();
    let grid_search_data = FoldData::new(&vectorizer, points.collect());
    Ok((vectorizer, grid_search_data, folds))
}

fn grid_search_round(
    config: &CvConfig,
    data: &ExperimentalData,
    grid_search_data: &FoldData,
    ctx: &ExperimentContext,
) -> Result<Vec<(LearnerKind, GridSearchResult)>, ExperimentError> {
    let _span = ctx.stage("grid_search").entered();
    let scorer = Scorer::new(config.objective());
    info!(
        samples = grid_search_data.y.len(),
        folds = data.grid_search_folds(),
        scorer = %scorer,
        "running grid search"
    );

    config
        .learners()
        .iter()
        .zip(config.param_grids())
        .map(|(&kind, grid)| {
            let search = GridSearch {
                kind,
                grid,
                scorer,
                classes: data.classes(),
                folds: data.grid_search_folds(),
            };
            let result = search
                .run(&grid_search_data.x, &grid_search_data.y)
                .map_err(|error| ExperimentError::GridSearch {
                    learner: kind,
                    error,
                })?;
            info!(
                learner = %kind,
                best_params = %result.best_params,
                candidates = result.candidates.len(),
                "selected hyperparameters"
            );
            Ok((kind, result))
        })
        .collect()
}

/// Per-learner estimator copies (indexed by held-out fold) and records.
type CrossValidation = (Vec<Vec<BoxedLearner>>, Vec<Vec<StatsRecord>>);

fn cross_validate(
    config: &CvConfig,
    data: &ExperimentalData,
    searches: &[(LearnerKind, GridSearchResult)],
    folds: &[FoldData],
    ctx: &ExperimentContext,
) -> Result<CrossValidation, ExperimentError> {
    let _span = ctx.stage("cross_validation").entered();
    let classes = data.classes();
    let base = base_record(config);

    let mut estimators = searches
        .iter()
        .map(|(_, search)| vec![search.best_estimator.clone(); folds.len()])
        .collect::<Vec<_>>();
    let mut stats = vec![Vec::with_capacity(folds.len()); searches.len()];
    let mut samples_seen = 0;

    for (held_out, test) in folds.iter().enumerate() {
        let mut train_labels = vec![];
        for train in folds
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != held_out)
            .map(|(_, f)| f)
        {
            for ((kind, _), copies) in searches.iter().zip(&mut estimators) {
                let learner = copies[held_out]
                    .incremental()
                    .ok_or(ExperimentError::NotIncremental { learner: *kind })?;
                learner
                    .partial_fit(&train.x, &train.y)
                    .map_err(|error| ExperimentError::Fit {
                        learner: *kind,
                        fold: held_out,
                        error,
                    })?;
            }
            train_labels.extend_from_slice(&train.y);
            samples_seen += train.y.len();
        }

        let (train_mean, train_std) = mean_std(&train_labels).unwrap_or((0.0, 0.0));
        debug!(
            fold = held_out,
            samples_seen, train_mean, train_std, "updated estimators"
        );

        for (((kind, search), copies), records) in
            searches.iter().zip(&estimators).zip(&mut stats)
        {
            let predictions =
                copies[held_out]
                    .predict(&test.x)
                    .map_err(|error| ExperimentError::Fit {
                        learner: *kind,
                        fold: held_out,
                        error,
                    })?;
            let y_pred = rescale_predictions(&predictions, classes, train_mean, train_std)
                .select(config.rescale());
            let metrics = compute_evaluation_metrics(&test.y, &y_pred, classes)?;
            info!(
                learner = %kind,
                fold = held_out,
                samples_seen,
                accuracy = metrics.get("accuracy"),
                "evaluated held-out fold"
            );
            records.push(StatsRecord {
                learner: kind.name().to_owned(),
                fold: Some(held_out),
                samples_seen,
                test_samples: test.y.len(),
                params: Some(search.best_params.to_string()),
                metrics,
                ..base.clone()
            });
        }
    }
    Ok((estimators, stats))
}

fn evaluate_majority_baseline(
    config: &CvConfig,
    data: &ExperimentalData,
    labels: &[f64],
    ctx: &ExperimentContext,
) -> Result<StatsRecord, ExperimentError> {
    let _span = ctx.stage("majority_baseline").entered();
    let counts = LabelCounts::new(labels.iter().copied());
    let Some(majority) = counts.most_frequent() else {
        return Err(MetricError::Empty.into());
    };
    let predictions = vec![majority; labels.len()];
    let metrics = compute_evaluation_metrics(labels, &predictions, data.classes())?;
    info!(
        majority_label = majority,
        samples = labels.len(),
        "evaluated majority baseline"
    );
    Ok(StatsRecord {
        learner: MAJORITY_BASELINE_LEARNER.to_owned(),
        fold: None,
        samples_seen: labels.len(),
        test_samples: labels.len(),
        majority_label: Some(majority),
        metrics,
        ..base_record(config)
    })
}

/// Record fields shared by every evaluation of a run.
fn base_record(config: &CvConfig) -> StatsRecord {
    let non_nlp_features = if config.non_nlp_features().is_empty() {
        "none".to_owned()
    } else {
        config
            .non_nlp_features()
            .iter()
            .map(|label| label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    StatsRecord {
        learner: String::new(),
        fold: None,
        samples_seen: 0,
        test_samples: 0,
        games: games_label(config.games()),
        prediction_label: config.prediction_label(),
        non_nlp_features,
        nlp_features: config.nlp_features(),
        transformation: config.transform().to_string(),
        rescale: config.rescale(),
        bin_ranges: config.bin_ranges().map(format_bin_ranges),
        params: None,
        majority_label: None,
        metrics: EvaluationMetrics::default(),
    }
}
